//! Cloudtrial Core - Domain types, session handling and response normalization.
//!
//! This crate contains the transport-agnostic parts of the trial acquisition
//! workflow. The HTTP client and the orchestrator that drive the workflow
//! live in the `connect` crate.

pub mod constants;
pub mod errors;
pub mod events;
pub mod extract;
pub mod gate;
pub mod session;
pub mod workflow;

pub use events::{AcquisitionEvent, AcquisitionEventSink, SkipReason};
pub use extract::{ConfigDescriptor, PaymentOutcome, PriceQuote, SubscriptionCandidate};
pub use gate::{DomainGate, GateDecision};
pub use session::{SessionCredentials, SessionStore};
pub use workflow::WorkflowState;

// Re-export error types
pub use errors::{AcquisitionError, Error, Result, WorkflowStep};
