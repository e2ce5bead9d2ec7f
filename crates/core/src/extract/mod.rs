//! Response extractor.
//!
//! Pure normalization of the trial API's JSON payloads. The remote service
//! returns the same information in several shapes, so each extraction is an
//! ordered list of strategies where the first one that yields data wins.
//! Nothing here performs I/O or panics on unexpected input.

mod models;

pub use models::*;

use log::debug;
use serde_json::Value;

use crate::errors::AcquisitionError;

const MISSING_CONFIG: &str = "missing config";
const MISSING_SUBSCRIPTION: &str = "missing subscription";

const VERSION_OPTION_FIELDS: &[&str] = &["android_version", "versionOptions"];
const CONFIG_ID_FIELDS: &[&str] = &["config_id", "configId"];
const NETWORK_ID_FIELDS: &[&str] = &["network_id", "networkId"];
const AMOUNT_ID_FIELDS: &[&str] = &["amount_id", "amountId"];
const SUBSCRIPTION_FIELD: &str = "subscription";

/// Ways the configuration list may be laid out under `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigListStrategy {
    /// `data.list` is the sequence.
    NestedList,
    /// `data` is the sequence.
    DataArray,
    /// The first non-empty sequence among `data`'s members, in document order.
    FirstArrayMember,
}

impl ConfigListStrategy {
    pub const ORDERED: [ConfigListStrategy; 3] = [
        ConfigListStrategy::NestedList,
        ConfigListStrategy::DataArray,
        ConfigListStrategy::FirstArrayMember,
    ];

    fn apply<'a>(&self, data: &'a Value) -> Option<&'a [Value]> {
        match self {
            ConfigListStrategy::NestedList => non_empty_array(data.get("list")?),
            ConfigListStrategy::DataArray => non_empty_array(data),
            ConfigListStrategy::FirstArrayMember => data
                .as_object()?
                .values()
                .find_map(non_empty_array),
        }
    }
}

/// Ways the candidate list may be laid out under `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateListStrategy {
    /// `data.list[*].subscription[*]`, flattened in order.
    ListedSubscriptions,
    /// `data.subscription[*]`.
    DirectSubscription,
}

impl CandidateListStrategy {
    pub const ORDERED: [CandidateListStrategy; 2] = [
        CandidateListStrategy::ListedSubscriptions,
        CandidateListStrategy::DirectSubscription,
    ];

    fn apply(&self, data: &Value) -> Vec<SubscriptionCandidate> {
        match self {
            CandidateListStrategy::ListedSubscriptions => data
                .get("list")
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|entry| entry.get(SUBSCRIPTION_FIELD))
                        .flat_map(candidates_from)
                        .collect()
                })
                .unwrap_or_default(),
            CandidateListStrategy::DirectSubscription => data
                .get(SUBSCRIPTION_FIELD)
                .map(candidates_from)
                .unwrap_or_default(),
        }
    }
}

/// Extract the configuration identifier from a configuration-list payload.
///
/// The first element of the selected sequence must carry a non-empty
/// version-option sequence; its first option's config id is the result.
pub fn extract_config(payload: &Value) -> Result<ConfigDescriptor, AcquisitionError> {
    let data = payload.get("data").ok_or_else(missing_config)?;

    let (strategy, entries) = ConfigListStrategy::ORDERED
        .iter()
        .find_map(|strategy| strategy.apply(data).map(|entries| (strategy, entries)))
        .ok_or_else(missing_config)?;
    debug!("[Extract] Config list matched {:?}", strategy);

    let config_id = entries
        .first()
        .and_then(|entry| first_field(entry, VERSION_OPTION_FIELDS))
        .and_then(Value::as_array)
        .and_then(|options| options.first())
        .and_then(|option| first_field(option, CONFIG_ID_FIELDS))
        .and_then(opaque_id)
        .ok_or_else(missing_config)?;

    Ok(ConfigDescriptor { config_id })
}

/// Extract the ordered candidate set from a candidate-list payload.
///
/// Order is preserved exactly as received; entries without a network id are
/// dropped since they cannot be quoted.
pub fn extract_candidates(payload: &Value) -> Result<Vec<SubscriptionCandidate>, AcquisitionError> {
    let data = payload
        .get("data")
        .ok_or_else(|| AcquisitionError::Schema(MISSING_SUBSCRIPTION.to_string()))?;

    CandidateListStrategy::ORDERED
        .iter()
        .map(|strategy| strategy.apply(data))
        .find(|candidates| !candidates.is_empty())
        .ok_or_else(|| AcquisitionError::Schema(MISSING_SUBSCRIPTION.to_string()))
}

/// Extract the amount identifier from a price-quote payload.
pub fn extract_quote(payload: &Value) -> PriceQuote {
    PriceQuote {
        amount_id: payload
            .get("data")
            .and_then(|data| first_field(data, AMOUNT_ID_FIELDS))
            .and_then(opaque_id),
    }
}

/// Normalize a payment payload. Codes sent as numeric strings are accepted.
pub fn extract_payment(payload: &Value) -> PaymentOutcome {
    let code = match payload.get("code") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    };
    let message = ["msg", "message"]
        .iter()
        .find_map(|name| payload.get(*name).and_then(Value::as_str))
        .map(str::to_string);

    PaymentOutcome {
        code,
        message,
        raw: payload.clone(),
    }
}

fn missing_config() -> AcquisitionError {
    AcquisitionError::Schema(MISSING_CONFIG.to_string())
}

fn non_empty_array(value: &Value) -> Option<&[Value]> {
    value
        .as_array()
        .map(Vec::as_slice)
        .filter(|items| !items.is_empty())
}

fn first_field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| value.get(*name))
}

fn opaque_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn candidates_from(subscriptions: &Value) -> Vec<SubscriptionCandidate> {
    subscriptions
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| first_field(item, NETWORK_ID_FIELDS).and_then(opaque_id))
                .map(SubscriptionCandidate::new)
                .collect()
        })
        .unwrap_or_default()
}
