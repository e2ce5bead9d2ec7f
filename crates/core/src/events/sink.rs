//! Acquisition event sink trait and implementations.

use std::sync::{Arc, Mutex};

use log::{info, warn};

use super::AcquisitionEvent;

/// Trait for receiving acquisition events.
///
/// # Design Rules
///
/// - `emit()` must be fast and non-blocking (no network calls)
/// - Failure to emit must not affect the run (best-effort)
pub trait AcquisitionEventSink: Send + Sync {
    fn emit(&self, event: AcquisitionEvent);
}

/// No-op implementation for contexts that don't need events.
#[derive(Clone, Default)]
pub struct NoOpAcquisitionEventSink;

impl AcquisitionEventSink for NoOpAcquisitionEventSink {
    fn emit(&self, _event: AcquisitionEvent) {}
}

/// Writes events to the `log` facade.
#[derive(Clone, Default)]
pub struct LoggingAcquisitionEventSink;

impl AcquisitionEventSink for LoggingAcquisitionEventSink {
    fn emit(&self, event: AcquisitionEvent) {
        match &event {
            AcquisitionEvent::StateChanged { run_id, state } => {
                info!("[Acquisition] run={} state={}", run_id, state);
            }
            AcquisitionEvent::CandidateSkipped {
                run_id,
                pass,
                network_id,
                reason,
            } => {
                info!(
                    "[Acquisition] run={} pass={} skipped network={} reason={:?}",
                    run_id, pass, network_id, reason
                );
            }
            AcquisitionEvent::PassCompleted { run_id, pass } => {
                warn!(
                    "[Acquisition] run={} pass {} ended without a purchase, starting over",
                    run_id, pass
                );
            }
            AcquisitionEvent::ResourceAcquired {
                run_id,
                network_id,
                pass,
                ..
            } => {
                info!(
                    "[Acquisition] run={} acquired trial on network {} (pass {})",
                    run_id, network_id, pass
                );
            }
        }
    }
}

/// Mock sink for testing - collects emitted events.
#[derive(Clone, Default)]
pub struct MockAcquisitionEventSink {
    events: Arc<Mutex<Vec<AcquisitionEvent>>>,
}

impl MockAcquisitionEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    pub fn events(&self) -> Vec<AcquisitionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Returns the collected `ResourceAcquired` events.
    pub fn acquired(&self) -> Vec<AcquisitionEvent> {
        self.events()
            .into_iter()
            .filter(AcquisitionEvent::is_resource_acquired)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AcquisitionEventSink for MockAcquisitionEventSink {
    fn emit(&self, event: AcquisitionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
