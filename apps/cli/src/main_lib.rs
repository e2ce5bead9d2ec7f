use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use cloudtrial_connect::{AcquisitionOrchestrator, RetryPolicy, TrialApiClient};
use cloudtrial_core::events::LoggingAcquisitionEventSink;
use cloudtrial_core::session::SessionStore;

use crate::config::Config;
use crate::session_store::FileSessionStore;

pub fn init_tracing() {
    let log_format = std::env::var("CT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_session_store(config: &Config) -> anyhow::Result<Arc<dyn SessionStore>> {
    let store = FileSessionStore::new(config.session_file.clone(), config.session_key.as_deref())
        .with_context(|| {
            format!(
                "Failed to open session file {}",
                config.session_file.display()
            )
        })?;
    if !store.is_encrypted() {
        tracing::debug!("Session file is stored unencrypted; set CT_SESSION_KEY to seal it");
    }
    Ok(Arc::new(store))
}

/// Host the domain gate checks: `CT_CONTEXT_HOST`, else the API host.
pub fn resolve_context_host(config: &Config, client: &TrialApiClient) -> String {
    config
        .context_host
        .clone()
        .or_else(|| client.host())
        .unwrap_or_default()
}

pub fn build_orchestrator(
    config: &Config,
    store: Arc<dyn SessionStore>,
) -> anyhow::Result<AcquisitionOrchestrator> {
    let client = TrialApiClient::new(&config.base_url, config.request_timeout)
        .map_err(anyhow::Error::new)?;
    let context_host = resolve_context_host(config, &client);
    tracing::info!(
        "Using API {} (context host '{}')",
        client.base_url(),
        context_host
    );

    let policy = RetryPolicy::default()
        .with_pacing(config.pacing)
        .with_max_passes(config.max_passes);

    Ok(
        AcquisitionOrchestrator::new(Arc::new(client), store, context_host)
            .with_event_sink(Arc::new(LoggingAcquisitionEventSink))
            .with_policy(policy),
    )
}
