//! Normalized values produced by the response extractor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::PAYMENT_SUCCESS_CODE;

/// Configuration the candidate list and price quotes are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDescriptor {
    pub config_id: String,
}

/// One network/subscription option eligible for purchase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCandidate {
    pub network_id: String,
}

impl SubscriptionCandidate {
    pub fn new(network_id: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
        }
    }
}

/// Server-computed amount for a candidate. `amount_id == None` means the
/// candidate cannot be bought right now and is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub amount_id: Option<String>,
}

/// Result of a payment submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// Application-level code; `0` when the payload carried none.
    pub code: i64,
    pub message: Option<String>,
    pub raw: Value,
}

impl PaymentOutcome {
    pub fn is_success(&self) -> bool {
        self.code == PAYMENT_SUCCESS_CODE
    }
}
