use std::io::Read;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use cloudtrial_connect::RunOutcome;
use cloudtrial_core::session::{clear_bundle, export_bundle, import_bundle, SessionStore};
use cloudtrial_core::{DomainGate, GateDecision, SessionCredentials};

use crate::config::Config;
use crate::main_lib::{build_orchestrator, build_session_store};

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Acquire a trial device; runs until a purchase succeeds or Ctrl-C
    Run {
        /// Stop after this many passes over the candidates (overrides CT_MAX_PASSES)
        #[arg(long)]
        max_passes: Option<u32>,

        /// Milliseconds between quote and payment (overrides CT_PACING_MS)
        #[arg(long)]
        pacing_ms: Option<u64>,
    },

    /// Import a session bundle (JSON object) from a file, or `-` for stdin
    Login {
        source: String,
    },

    /// Print the stored session bundle as JSON
    Export,

    /// Remove every stored session key
    Logout,

    /// Check whether a host is an allowed execution context
    CheckHost {
        host: String,
    },
}

pub async fn dispatch(cmd: Commands, mut config: Config) -> Result<()> {
    match cmd {
        Commands::Run {
            max_passes,
            pacing_ms,
        } => {
            if let Some(passes) = max_passes {
                if passes == 0 {
                    bail!("--max-passes must be greater than zero");
                }
                config.max_passes = Some(passes);
            }
            if let Some(ms) = pacing_ms {
                config.pacing = std::time::Duration::from_millis(ms);
            }
            run(&config).await
        }
        Commands::Login { source } => {
            let raw = read_source(&source)?;
            let store = build_session_store(&config)?;
            login(store.as_ref(), &raw)
        }
        Commands::Export => {
            let store = build_session_store(&config)?;
            println!("{}", export_bundle(store.as_ref())?);
            Ok(())
        }
        Commands::Logout => {
            let store = build_session_store(&config)?;
            clear_bundle(store.as_ref())?;
            println!("Session cleared.");
            Ok(())
        }
        Commands::CheckHost { host } => check_host(&host),
    }
}

async fn run(config: &Config) -> Result<()> {
    let store = build_session_store(config)?;
    let orchestrator = build_orchestrator(config, store)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling run");
            trigger.cancel();
        }
    });

    match orchestrator.run(&cancel).await {
        Ok(RunOutcome::Acquired(acquisition)) => {
            println!("{}", serde_json::to_string_pretty(&acquisition)?);
            Ok(())
        }
        Ok(RunOutcome::AlreadyRunning) => {
            tracing::warn!("A run is already in progress");
            Ok(())
        }
        Err(e) if e.is_unauthorized() => Err(anyhow::Error::new(e)
            .context("Session rejected; import a fresh session with `cloudtrial login`")),
        Err(e) => Err(anyhow::Error::new(e).context("Acquisition failed")),
    }
}

fn login(store: &dyn SessionStore, raw: &str) -> Result<()> {
    let count = import_bundle(store, raw).context("Failed to import session bundle")?;
    let credentials = SessionCredentials::read(store);
    if !credentials.is_complete() {
        tracing::warn!("Imported bundle has no usable access token and login id");
    }
    println!("Imported {} session keys.", count);
    Ok(())
}

fn check_host(host: &str) -> Result<()> {
    match DomainGate::production().validate(host) {
        GateDecision::Allow => {
            println!("{} is allowed.", host);
            Ok(())
        }
        GateDecision::Reject(reason) => bail!(reason),
    }
}

fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read session bundle from stdin")?;
        Ok(raw)
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read session bundle from {}", source))
    }
}
