//! HTTP client for the cloud-phone trial purchase API.
//!
//! Every request carries the two session headers (`access-token` and
//! `login-id`) taken from the credentials snapshot passed in by the caller,
//! so a single client can serve runs for different sessions.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use cloudtrial_core::constants::DEFAULT_API_BASE_URL;
use cloudtrial_core::errors::{Error, Result};
use cloudtrial_core::SessionCredentials;

use crate::acquisition::models::CandidateListRequest;
use crate::acquisition::{AcquisitionApi, PaymentRequest, QuoteRequest, TransportError};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

type ApiResult<T> = std::result::Result<T, TransportError>;

const ACCESS_TOKEN_HEADER: &str = "access-token";
const LOGIN_ID_HEADER: &str = "login-id";

const PRIME_PATH: &str = "/fee/newPackage";
const CONFIG_LIST_PATH: &str = "/info/configList2";
const CANDIDATE_LIST_PATH: &str = "/info/mealList";
const QUOTE_PATH: &str = "/fee/queryResourcePrice";
const PAYMENT_PATH: &str = "/fee/payment";

#[derive(Debug, serde::Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Trial API Client
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for the trial purchase API.
///
/// # Example
///
/// ```ignore
/// let client = TrialApiClient::new(DEFAULT_API_BASE_URL, Duration::from_secs(30))?;
/// let configs = client.fetch_config_list(&credentials).await?;
/// ```
#[derive(Debug, Clone)]
pub struct TrialApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl TrialApiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute http(s) URL or the
    /// HTTP client cannot be initialized.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| Error::Unexpected(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Unexpected(format!(
                "Unsupported base URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Unexpected(format!("Failed to initialize HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Client for the production API with the default timeout.
    pub fn production() -> Result<Self> {
        Self::new(
            DEFAULT_API_BASE_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Host component of the base URL, used as the default execution context.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Headers for one request. Absent credentials are left out and the
    /// server answers with an authorization error.
    fn headers(&self, credentials: &SessionCredentials) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let session_headers = [
            (ACCESS_TOKEN_HEADER, credentials.access_token.as_deref()),
            (LOGIN_ID_HEADER, credentials.login_id.as_deref()),
        ];
        for (name, value) in session_headers {
            let Some(value) = value else {
                continue;
            };
            match HeaderValue::from_str(value) {
                Ok(mut header) => {
                    header.set_sensitive(true);
                    headers.insert(HeaderName::from_static(name), header);
                }
                Err(_) => warn!("[TrialApi] Dropping '{}' header with invalid characters", name),
            }
        }
        headers
    }

    async fn get(&self, credentials: &SessionCredentials, path: &str) -> ApiResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[TrialApi] GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(credentials))
            .send()
            .await?;

        self.parse_response(response).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        credentials: &SessionCredentials,
        path: &str,
        body: &B,
    ) -> ApiResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[TrialApi] POST {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(credentials))
            .json(body)
            .send()
            .await?;

        self.parse_response(response).await
    }

    /// Parse an HTTP response, handling errors appropriately.
    async fn parse_response(&self, response: reqwest::Response) -> ApiResult<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|err| err.msg.or(err.message))
                .unwrap_or_else(|| body.chars().take(200).collect::<String>());
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            TransportError::Decode(format!(
                "{} - {}",
                e,
                body.chars().take(200).collect::<String>()
            ))
        })
    }
}

#[async_trait]
impl AcquisitionApi for TrialApiClient {
    async fn prime_entitlement(&self, credentials: &SessionCredentials) -> ApiResult<()> {
        let url = format!("{}{}", self.base_url, PRIME_PATH);
        debug!("[TrialApi] POST {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(credentials))
            .send()
            .await?;

        // The grant response carries nothing the workflow needs.
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_config_list(&self, credentials: &SessionCredentials) -> ApiResult<Value> {
        self.get(credentials, CONFIG_LIST_PATH).await
    }

    async fn fetch_candidate_list(
        &self,
        credentials: &SessionCredentials,
        config_id: &str,
    ) -> ApiResult<Value> {
        self.post(
            credentials,
            CANDIDATE_LIST_PATH,
            &CandidateListRequest { config_id },
        )
        .await
    }

    async fn quote_price(
        &self,
        credentials: &SessionCredentials,
        request: &QuoteRequest,
    ) -> ApiResult<Value> {
        self.post(credentials, QUOTE_PATH, request).await
    }

    async fn submit_payment(
        &self,
        credentials: &SessionCredentials,
        request: &PaymentRequest,
    ) -> ApiResult<Value> {
        self.post(credentials, PAYMENT_PATH, request).await
    }
}
