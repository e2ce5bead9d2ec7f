//! Request bodies and run results for the trial purchase API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cloudtrial_core::{ConfigDescriptor, PaymentOutcome, SubscriptionCandidate};

/// Fixed purchase terms sent with every price quote.
///
/// The defaults describe the free trial: a four hour cloud phone
/// subscription paid entirely with points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTerms {
    pub period_time: u32,
    pub unit: String,
    pub resource_type: String,
    pub pay_mode: String,
    pub count: u32,
    pub use_points: u32,
    pub points: u32,
}

impl Default for QuoteTerms {
    fn default() -> Self {
        Self {
            period_time: 4,
            unit: "hour".to_string(),
            resource_type: "cloudphone".to_string(),
            pay_mode: "subscription".to_string(),
            count: 1,
            use_points: 3,
            points: 250,
        }
    }
}

impl QuoteTerms {
    /// Build the quote request for one candidate under these terms.
    pub fn quote_for(&self, config_id: &str, network_id: &str) -> QuoteRequest {
        QuoteRequest {
            config_id: config_id.to_string(),
            network_id: network_id.to_string(),
            terms: self.clone(),
        }
    }
}

/// Body of `POST /fee/queryResourcePrice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub config_id: String,
    pub network_id: String,
    #[serde(flatten)]
    pub terms: QuoteTerms,
}

/// Body of `POST /fee/payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount_id: String,
    pub pay_channel: String,
}

impl PaymentRequest {
    /// Points-only payment; no card or wallet is involved.
    pub fn free(amount_id: impl Into<String>) -> Self {
        Self {
            amount_id: amount_id.into(),
            pay_channel: "free".to_string(),
        }
    }
}

/// Body of `POST /info/mealList`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CandidateListRequest<'a> {
    pub config_id: &'a str,
}

/// Details of a successful purchase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Acquisition {
    pub config: ConfigDescriptor,
    pub candidate: SubscriptionCandidate,
    pub amount_id: String,
    /// 1-based pass number the purchase happened on.
    pub pass: u32,
    pub payment: PaymentOutcome,
    pub acquired_at: DateTime<Utc>,
}

/// Result of calling `AcquisitionOrchestrator::run`.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A trial resource was purchased.
    Acquired(Acquisition),
    /// Another run was already in flight; nothing was done.
    AlreadyRunning,
}

impl RunOutcome {
    pub fn acquisition(&self) -> Option<&Acquisition> {
        match self {
            RunOutcome::Acquired(acquisition) => Some(acquisition),
            RunOutcome::AlreadyRunning => None,
        }
    }
}
