//! Acquisition workflow states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the acquisition state machine.
///
/// `Idle → Validating → Priming → FetchingConfig → FetchingCandidates →
/// (Quoting → Paying)* → Succeeded | Failed`. A rejected domain check goes
/// straight back to `Idle`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    Validating,
    Priming,
    FetchingConfig,
    FetchingCandidates,
    Quoting {
        network_id: String,
        pass: u32,
    },
    Paying {
        network_id: String,
        pass: u32,
    },
    Succeeded,
    Failed {
        reason: String,
    },
}

impl WorkflowState {
    /// True while a run owns the state machine.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            WorkflowState::Idle | WorkflowState::Succeeded | WorkflowState::Failed { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeeded | WorkflowState::Failed { .. })
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Idle => write!(f, "idle"),
            WorkflowState::Validating => write!(f, "validating"),
            WorkflowState::Priming => write!(f, "priming"),
            WorkflowState::FetchingConfig => write!(f, "fetching_config"),
            WorkflowState::FetchingCandidates => write!(f, "fetching_candidates"),
            WorkflowState::Quoting { network_id, pass } => {
                write!(f, "quoting({}, pass {})", network_id, pass)
            }
            WorkflowState::Paying { network_id, pass } => {
                write!(f, "paying({}, pass {})", network_id, pass)
            }
            WorkflowState::Succeeded => write!(f, "succeeded"),
            WorkflowState::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}
