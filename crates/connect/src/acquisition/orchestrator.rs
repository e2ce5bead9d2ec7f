//! Acquisition orchestrator.
//!
//! Drives one trial purchase end to end: domain check, credential snapshot,
//! entitlement priming, configuration and candidate discovery, then the
//! candidate retry loop. One orchestrator owns one state machine; a second
//! `run()` while the first is in flight is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use cloudtrial_core::events::NoOpAcquisitionEventSink;
use cloudtrial_core::extract::{extract_candidates, extract_config};
use cloudtrial_core::{
    AcquisitionError, AcquisitionEvent, AcquisitionEventSink, DomainGate, GateDecision,
    SessionCredentials, SessionStore, WorkflowState, WorkflowStep,
};

use super::models::{Acquisition, RunOutcome};
use super::retry::{CandidateRetryLoop, RetryPolicy};
use super::run_context::RunContext;
use super::traits::AcquisitionApi;

/// Holds the busy flag for the lifetime of a run.
///
/// Dropping the guard clears the flag and, when the run future was dropped
/// mid-flight, parks the state machine back at `Idle`.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
    state: &'a RwLock<WorkflowState>,
}

impl<'a> BusyGuard<'a> {
    fn acquire(busy: &'a AtomicBool, state: &'a RwLock<WorkflowState>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { busy, state })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.write() {
            if state.is_active() {
                *state = WorkflowState::Idle;
            }
        }
        self.busy.store(false, Ordering::Release);
    }
}

/// Orchestrates trial acquisition runs.
pub struct AcquisitionOrchestrator {
    api: Arc<dyn AcquisitionApi>,
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn AcquisitionEventSink>,
    gate: DomainGate,
    context_host: String,
    policy: RetryPolicy,
    busy: AtomicBool,
    state: RwLock<WorkflowState>,
}

impl AcquisitionOrchestrator {
    /// Create an orchestrator for the given execution context host.
    ///
    /// Uses the production domain gate, the default retry policy and no
    /// event sink.
    pub fn new(
        api: Arc<dyn AcquisitionApi>,
        store: Arc<dyn SessionStore>,
        context_host: impl Into<String>,
    ) -> Self {
        Self {
            api,
            store,
            sink: Arc::new(NoOpAcquisitionEventSink),
            gate: DomainGate::production(),
            context_host: context_host.into(),
            policy: RetryPolicy::default(),
            busy: AtomicBool::new(false),
            state: RwLock::new(WorkflowState::Idle),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn AcquisitionEventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_gate(mut self, gate: DomainGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Current state of the state machine.
    pub fn state(&self) -> WorkflowState {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Check the execution context without starting a run.
    pub fn check_context(&self) -> GateDecision {
        self.gate.validate(&self.context_host)
    }

    /// Run one acquisition.
    ///
    /// Returns `RunOutcome::AlreadyRunning` without side effects when another
    /// run on this orchestrator is in flight. Otherwise runs until a purchase
    /// succeeds, a setup step fails, or `cancel` fires.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunOutcome, AcquisitionError> {
        let Some(_guard) = BusyGuard::acquire(&self.busy, &self.state) else {
            debug!("[Acquisition] Run already in progress, ignoring request");
            return Ok(RunOutcome::AlreadyRunning);
        };

        let ctx = RunContext::new(&self.state, self.sink.as_ref(), cancel);
        info!("[Acquisition] Starting run {}", ctx.run_id);

        let result = self.execute(&ctx).await;
        match &result {
            Ok(acquisition) => {
                ctx.transition(WorkflowState::Succeeded);
                ctx.emit(AcquisitionEvent::ResourceAcquired {
                    run_id: ctx.run_id,
                    config_id: acquisition.config.config_id.clone(),
                    network_id: acquisition.candidate.network_id.clone(),
                    amount_id: acquisition.amount_id.clone(),
                    pass: acquisition.pass,
                    acquired_at: acquisition.acquired_at,
                });
                info!(
                    "[Acquisition] Run {} acquired network {}",
                    ctx.run_id, acquisition.candidate.network_id
                );
            }
            Err(e) if e.is_preflight() => {
                warn!("[Acquisition] Run {} rejected: {}", ctx.run_id, e);
                ctx.transition(WorkflowState::Idle);
            }
            Err(AcquisitionError::Cancelled { step }) => {
                info!("[Acquisition] Run {} cancelled during {}", ctx.run_id, step);
                ctx.transition(WorkflowState::Failed {
                    reason: format!("cancelled during {}", step),
                });
            }
            Err(e) => {
                error!("[Acquisition] Run {} failed: {}", ctx.run_id, e);
                ctx.transition(WorkflowState::Failed {
                    reason: e.to_string(),
                });
            }
        }

        result.map(RunOutcome::Acquired)
    }

    async fn execute(&self, ctx: &RunContext<'_>) -> Result<Acquisition, AcquisitionError> {
        ctx.transition(WorkflowState::Validating);
        if let GateDecision::Reject(reason) = self.gate.validate(&self.context_host) {
            return Err(AcquisitionError::DomainRejected(reason));
        }

        // Read once; every call of this run uses the same snapshot.
        let credentials = SessionCredentials::read(self.store.as_ref());
        if !credentials.is_complete() {
            warn!("[Acquisition] Session credentials incomplete, the service will likely reject the run");
        }

        ctx.check(WorkflowStep::Priming)?;
        ctx.transition(WorkflowState::Priming);
        ctx.guard(
            WorkflowStep::Priming,
            self.api.prime_entitlement(&credentials),
        )
        .await?
        .map_err(|e| e.into_acquisition(WorkflowStep::Priming))?;

        ctx.check(WorkflowStep::FetchConfig)?;
        ctx.transition(WorkflowState::FetchingConfig);
        let config_payload = ctx
            .guard(
                WorkflowStep::FetchConfig,
                self.api.fetch_config_list(&credentials),
            )
            .await?
            .map_err(|e| e.into_acquisition(WorkflowStep::FetchConfig))?;
        let config = extract_config(&config_payload)?;
        debug!("[Acquisition] Using config {}", config.config_id);

        ctx.check(WorkflowStep::FetchCandidates)?;
        ctx.transition(WorkflowState::FetchingCandidates);
        let candidate_payload = ctx
            .guard(
                WorkflowStep::FetchCandidates,
                self.api
                    .fetch_candidate_list(&credentials, &config.config_id),
            )
            .await?
            .map_err(|e| e.into_acquisition(WorkflowStep::FetchCandidates))?;
        let candidates = extract_candidates(&candidate_payload)?;
        info!(
            "[Acquisition] {} candidates for config {}",
            candidates.len(),
            config.config_id
        );

        CandidateRetryLoop::new(
            self.api.as_ref(),
            &credentials,
            &self.policy,
            config,
            candidates,
        )
        .run(ctx)
        .await
    }
}
