//! Scripted `AcquisitionApi` for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use cloudtrial_core::SessionCredentials;

use super::models::{PaymentRequest, QuoteRequest};
use super::traits::{AcquisitionApi, TransportError};

/// One recorded call to the mock API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Prime,
    FetchConfig,
    FetchCandidates { config_id: String },
    Quote { network_id: String },
    Payment { amount_id: String },
}

type CallHook = Box<dyn Fn(&ApiCall) + Send + Sync>;

/// Mock API with canned responses and a call log.
///
/// By default every call made without complete credentials fails with HTTP
/// 401, like the real service. Quotes and payments without a scripted
/// response answer HTTP 404.
pub struct MockAcquisitionApi {
    calls: Mutex<Vec<ApiCall>>,
    credentials_seen: Mutex<Vec<SessionCredentials>>,
    prime: Result<(), TransportError>,
    config: Result<Value, TransportError>,
    candidates: Result<Value, TransportError>,
    quotes: HashMap<String, Result<Value, TransportError>>,
    payments: HashMap<String, Result<Value, TransportError>>,
    require_auth: bool,
    prime_gate: Option<Arc<Notify>>,
    hook: Option<CallHook>,
}

impl Default for MockAcquisitionApi {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            credentials_seen: Mutex::new(Vec::new()),
            prime: Ok(()),
            config: Ok(json!({"code": 200, "data": {"list": [
                {"android_version": [{"config_id": "cfg-1"}]}
            ]}})),
            candidates: Ok(json!({"code": 200, "data": {"list": []}})),
            quotes: HashMap::new(),
            payments: HashMap::new(),
            require_auth: true,
            prime_gate: None,
            hook: None,
        }
    }
}

impl MockAcquisitionApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prime(mut self, result: Result<(), TransportError>) -> Self {
        self.prime = result;
        self
    }

    pub fn with_config(mut self, result: Result<Value, TransportError>) -> Self {
        self.config = result;
        self
    }

    pub fn with_candidates(mut self, result: Result<Value, TransportError>) -> Self {
        self.candidates = result;
        self
    }

    /// Candidate list in the `data.list[*].subscription[*]` shape.
    pub fn with_networks(self, network_ids: &[&str]) -> Self {
        let subscription: Vec<Value> = network_ids
            .iter()
            .map(|id| json!({"network_id": id}))
            .collect();
        self.with_candidates(Ok(
            json!({"code": 200, "data": {"list": [{"subscription": subscription}]}}),
        ))
    }

    pub fn with_quote(mut self, network_id: &str, result: Result<Value, TransportError>) -> Self {
        self.quotes.insert(network_id.to_string(), result);
        self
    }

    /// Quote answering with `amount_id`.
    pub fn with_amount(self, network_id: &str, amount_id: &str) -> Self {
        self.with_quote(
            network_id,
            Ok(json!({"code": 200, "data": {"amount_id": amount_id}})),
        )
    }

    pub fn with_payment(mut self, amount_id: &str, result: Result<Value, TransportError>) -> Self {
        self.payments.insert(amount_id.to_string(), result);
        self
    }

    /// Payment answering with application code `code`.
    pub fn with_payment_code(self, amount_id: &str, code: i64) -> Self {
        self.with_payment(amount_id, Ok(json!({"code": code, "msg": "ok"})))
    }

    /// Accept calls without credentials.
    pub fn without_auth(mut self) -> Self {
        self.require_auth = false;
        self
    }

    /// Block priming until `gate` is notified.
    pub fn hold_priming(mut self, gate: Arc<Notify>) -> Self {
        self.prime_gate = Some(gate);
        self
    }

    /// Run `hook` after each call is recorded.
    pub fn on_call(mut self, hook: impl Fn(&ApiCall) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Network ids quoted so far, in call order.
    pub fn quoted_networks(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Quote { network_id } => Some(network_id),
                _ => None,
            })
            .collect()
    }

    pub fn credentials_seen(&self) -> Vec<SessionCredentials> {
        self.credentials_seen
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn record(
        &self,
        call: ApiCall,
        credentials: &SessionCredentials,
    ) -> Result<(), TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        if let Ok(mut seen) = self.credentials_seen.lock() {
            seen.push(credentials.clone());
        }
        if let Some(hook) = &self.hook {
            hook(&call);
        }
        if self.require_auth && !credentials.is_complete() {
            return Err(TransportError::Status {
                status: 401,
                message: "login required".to_string(),
            });
        }
        Ok(())
    }
}

fn not_found() -> TransportError {
    TransportError::Status {
        status: 404,
        message: "not scripted".to_string(),
    }
}

#[async_trait]
impl AcquisitionApi for MockAcquisitionApi {
    async fn prime_entitlement(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<(), TransportError> {
        self.record(ApiCall::Prime, credentials)?;
        if let Some(gate) = &self.prime_gate {
            gate.notified().await;
        }
        self.prime.clone()
    }

    async fn fetch_config_list(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Value, TransportError> {
        self.record(ApiCall::FetchConfig, credentials)?;
        self.config.clone()
    }

    async fn fetch_candidate_list(
        &self,
        credentials: &SessionCredentials,
        config_id: &str,
    ) -> Result<Value, TransportError> {
        self.record(
            ApiCall::FetchCandidates {
                config_id: config_id.to_string(),
            },
            credentials,
        )?;
        self.candidates.clone()
    }

    async fn quote_price(
        &self,
        credentials: &SessionCredentials,
        request: &QuoteRequest,
    ) -> Result<Value, TransportError> {
        self.record(
            ApiCall::Quote {
                network_id: request.network_id.clone(),
            },
            credentials,
        )?;
        self.quotes
            .get(&request.network_id)
            .cloned()
            .unwrap_or_else(|| Err(not_found()))
    }

    async fn submit_payment(
        &self,
        credentials: &SessionCredentials,
        request: &PaymentRequest,
    ) -> Result<Value, TransportError> {
        self.record(
            ApiCall::Payment {
                amount_id: request.amount_id.clone(),
            },
            credentials,
        )?;
        self.payments
            .get(&request.amount_id)
            .cloned()
            .unwrap_or_else(|| Err(not_found()))
    }
}
