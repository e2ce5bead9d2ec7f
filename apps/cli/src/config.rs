use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use cloudtrial_connect::{DEFAULT_PACING_INTERVAL, DEFAULT_TIMEOUT_SECS};
use cloudtrial_core::constants::DEFAULT_API_BASE_URL;

pub struct Config {
    pub session_file: PathBuf,
    pub session_key: Option<String>,
    pub base_url: String,
    /// Host the run is attributed to. Falls back to the base URL's host.
    pub context_host: Option<String>,
    pub pacing: Duration,
    pub request_timeout: Duration,
    pub max_passes: Option<u32>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let session_file = var("CT_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("session.json"));
        let base_url = var("CT_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let pacing_ms: u64 = match var("CT_PACING_MS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid CT_PACING_MS '{}'", raw))?,
            None => DEFAULT_PACING_INTERVAL.as_millis() as u64,
        };
        let timeout_secs: u64 = match var("CT_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid CT_REQUEST_TIMEOUT_SECS '{}'", raw))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(anyhow!("CT_REQUEST_TIMEOUT_SECS must be greater than zero"));
        }
        let max_passes = match var("CT_MAX_PASSES") {
            Some(raw) => {
                let passes: u32 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid CT_MAX_PASSES '{}'", raw))?;
                if passes == 0 {
                    return Err(anyhow!("CT_MAX_PASSES must be greater than zero"));
                }
                Some(passes)
            }
            None => None,
        };

        Ok(Self {
            session_file,
            session_key: var("CT_SESSION_KEY"),
            base_url,
            context_host: var("CT_CONTEXT_HOST"),
            pacing: Duration::from_millis(pacing_ms),
            request_timeout: Duration::from_secs(timeout_secs),
            max_passes,
        })
    }
}
