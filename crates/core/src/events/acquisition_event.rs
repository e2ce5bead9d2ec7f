//! Acquisition event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowState;

/// Why a candidate was passed over during a pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The price quote carried no amount identifier.
    NoQuote,
    /// The quote call failed.
    QuoteFailed { message: String },
    /// The payment was answered with a non-success code.
    PaymentRejected { code: i64, message: Option<String> },
    /// The payment call failed.
    PaymentFailed { message: String },
}

/// Events emitted by the orchestrator during a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcquisitionEvent {
    /// The workflow moved to a new state.
    StateChanged { run_id: Uuid, state: WorkflowState },

    /// A candidate was skipped; the loop continues with the next one.
    CandidateSkipped {
        run_id: Uuid,
        pass: u32,
        network_id: String,
        reason: SkipReason,
    },

    /// A full pass over the candidate set ended without a purchase.
    PassCompleted { run_id: Uuid, pass: u32 },

    /// A trial resource was purchased. Emitted at most once per run.
    ResourceAcquired {
        run_id: Uuid,
        config_id: String,
        network_id: String,
        amount_id: String,
        pass: u32,
        acquired_at: DateTime<Utc>,
    },
}

impl AcquisitionEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            AcquisitionEvent::StateChanged { run_id, .. }
            | AcquisitionEvent::CandidateSkipped { run_id, .. }
            | AcquisitionEvent::PassCompleted { run_id, .. }
            | AcquisitionEvent::ResourceAcquired { run_id, .. } => *run_id,
        }
    }

    pub fn is_resource_acquired(&self) -> bool {
        matches!(self, AcquisitionEvent::ResourceAcquired { .. })
    }
}
