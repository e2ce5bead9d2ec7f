//! Core error types for cloud-phone trial acquisition.
//!
//! This module defines transport-agnostic error types. HTTP-specific failures
//! are converted into [`AcquisitionError::Transport`] by the connect crate.

use std::fmt;

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the non-workflow parts of the core crate
/// (session stores, bundle import, validation).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to encode or decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Validation errors for user input.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),
}

/// The network call a workflow step corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStep {
    Priming,
    FetchConfig,
    FetchCandidates,
    Quote,
    Payment,
    Pacing,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Priming => "priming",
            WorkflowStep::FetchConfig => "fetch_config",
            WorkflowStep::FetchCandidates => "fetch_candidates",
            WorkflowStep::Quote => "quote",
            WorkflowStep::Payment => "payment",
            WorkflowStep::Pacing => "pacing",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end an acquisition run.
///
/// Candidate-level failures (missing quote, rejected payment, a transport
/// error while quoting or paying) never surface here; the retry loop skips
/// the candidate and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// The execution context is not an allowed host. No network call was made.
    #[error("Domain rejected: {0}")]
    DomainRejected(String),

    /// HTTP or network failure on one of the setup calls.
    #[error("Transport error during {step}: {}", format_transport(.status, .message))]
    Transport {
        step: WorkflowStep,
        status: Option<u16>,
        message: String,
    },

    /// A response could not be normalized into the shape the next step needs.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The caller cancelled the run.
    #[error("Acquisition cancelled during {step}")]
    Cancelled { step: WorkflowStep },

    /// A pass cap was configured and every pass ended without a purchase.
    #[error("No candidate acquired after {passes} passes")]
    PassLimitReached { passes: u32 },
}

impl AcquisitionError {
    /// Returns true for errors raised before any network call was attempted.
    pub fn is_preflight(&self) -> bool {
        matches!(self, AcquisitionError::DomainRejected(_))
    }

    /// Returns true when the remote service refused the session credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AcquisitionError::Transport {
                status: Some(401) | Some(403),
                ..
            }
        )
    }
}

fn format_transport(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {} {}", code, message),
        None => message.to_string(),
    }
}
