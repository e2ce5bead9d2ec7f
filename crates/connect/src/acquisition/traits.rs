//! Traits defining the contract for the trial purchase API.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use cloudtrial_core::{AcquisitionError, SessionCredentials, WorkflowStep};

use super::models::{PaymentRequest, QuoteRequest};

/// Failure of a single HTTP exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("Request failed: {0}")]
    Network(String),

    /// The per-call timeout elapsed.
    #[error("Request timed out")]
    Timeout,

    /// The body was not valid JSON.
    #[error("Failed to parse response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Attach the step the failure happened in, for errors that end the run.
    pub fn into_acquisition(self, step: WorkflowStep) -> AcquisitionError {
        let status = self.status();
        let message = match self {
            TransportError::Status { message, .. } => message,
            other => other.to_string(),
        };
        AcquisitionError::Transport {
            step,
            status,
            message,
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// The five remote operations of an acquisition run.
///
/// Every call carries the credentials snapshot taken when the run started.
/// Implementations return the raw JSON payload; normalization happens in
/// `cloudtrial_core::extract`.
#[async_trait]
pub trait AcquisitionApi: Send + Sync {
    /// Trigger the free-entitlement grant. The response body is ignored.
    async fn prime_entitlement(&self, credentials: &SessionCredentials)
        -> Result<(), TransportError>;

    /// Fetch the device configuration list.
    async fn fetch_config_list(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Value, TransportError>;

    /// Fetch the subscription candidates available for a configuration.
    async fn fetch_candidate_list(
        &self,
        credentials: &SessionCredentials,
        config_id: &str,
    ) -> Result<Value, TransportError>;

    /// Ask the server to price one candidate.
    async fn quote_price(
        &self,
        credentials: &SessionCredentials,
        request: &QuoteRequest,
    ) -> Result<Value, TransportError>;

    /// Submit the payment for a quoted amount.
    async fn submit_payment(
        &self,
        credentials: &SessionCredentials,
        request: &PaymentRequest,
    ) -> Result<Value, TransportError>;
}
