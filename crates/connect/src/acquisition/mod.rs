#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub(crate) mod models;
mod orchestrator;
mod retry;
mod run_context;
mod traits;

pub use models::{Acquisition, PaymentRequest, QuoteRequest, QuoteTerms, RunOutcome};
pub use orchestrator::AcquisitionOrchestrator;
pub use retry::{RetryPolicy, DEFAULT_PACING_INTERVAL};
pub use traits::*;
