//! Per-run plumbing shared by the orchestrator and the retry loop.

use std::future::Future;
use std::sync::RwLock;

use log::warn;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use cloudtrial_core::{
    AcquisitionError, AcquisitionEvent, AcquisitionEventSink, WorkflowState, WorkflowStep,
};

/// Identity, state handle, event sink and cancellation token of one run.
pub(crate) struct RunContext<'a> {
    pub run_id: Uuid,
    state: &'a RwLock<WorkflowState>,
    sink: &'a dyn AcquisitionEventSink,
    cancel: &'a CancellationToken,
}

impl<'a> RunContext<'a> {
    pub fn new(
        state: &'a RwLock<WorkflowState>,
        sink: &'a dyn AcquisitionEventSink,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state,
            sink,
            cancel,
        }
    }

    /// Move the state machine and publish the new state.
    pub fn transition(&self, next: WorkflowState) {
        match self.state.write() {
            Ok(mut state) => *state = next.clone(),
            Err(_) => warn!("[Acquisition] State lock poisoned; state not updated"),
        }
        self.emit(AcquisitionEvent::StateChanged {
            run_id: self.run_id,
            state: next,
        });
    }

    pub fn emit(&self, event: AcquisitionEvent) {
        self.sink.emit(event);
    }

    /// Fail fast when cancellation was requested before `step` starts.
    pub fn check(&self, step: WorkflowStep) -> Result<(), AcquisitionError> {
        if self.cancel.is_cancelled() {
            return Err(AcquisitionError::Cancelled { step });
        }
        Ok(())
    }

    /// Await `fut` unless the run is cancelled first.
    ///
    /// A pending request is dropped on cancellation, which aborts it.
    pub async fn guard<F, T>(&self, step: WorkflowStep, fut: F) -> Result<T, AcquisitionError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AcquisitionError::Cancelled { step }),
            value = fut => Ok(value),
        }
    }
}
