//! Cloudtrial Connect - Trial purchase workflow against the cloud-phone API.
//!
//! This crate provides the HTTP transport for the purchase endpoints and the
//! orchestrator that drives a run from priming to the first successful
//! payment.

pub mod acquisition;
#[cfg(feature = "http")]
pub mod client;

// Re-export commonly used types
pub use acquisition::{
    Acquisition, AcquisitionApi, AcquisitionOrchestrator, PaymentRequest, QuoteRequest,
    QuoteTerms, RetryPolicy, RunOutcome, TransportError, DEFAULT_PACING_INTERVAL,
};

#[cfg(feature = "http")]
pub use client::{TrialApiClient, DEFAULT_TIMEOUT_SECS};
