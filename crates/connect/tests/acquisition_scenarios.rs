//! End-to-end runs of the orchestrator against the scripted mock API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use cloudtrial_connect::acquisition::mock::{ApiCall, MockAcquisitionApi};
use cloudtrial_connect::{AcquisitionOrchestrator, RetryPolicy, RunOutcome, TransportError};
use cloudtrial_core::constants::SESSION_RECORD_KEY;
use cloudtrial_core::events::MockAcquisitionEventSink;
use cloudtrial_core::session::MemorySessionStore;
use cloudtrial_core::{
    AcquisitionError, AcquisitionEvent, SessionCredentials, SessionStore, SkipReason,
    WorkflowState, WorkflowStep,
};

const SESSION: &str = r#"{"access_token":"tok-1","login_id":"42"}"#;

fn session_store() -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::with_entries([(SESSION_RECORD_KEY, SESSION)]))
}

fn orchestrator(
    api: &Arc<MockAcquisitionApi>,
    store: Arc<MemorySessionStore>,
    sink: &MockAcquisitionEventSink,
) -> AcquisitionOrchestrator {
    AcquisitionOrchestrator::new(api.clone(), store, "www.ugphone.com")
        .with_event_sink(Arc::new(sink.clone()))
        .with_policy(RetryPolicy::default().with_pacing(Duration::ZERO))
}

fn skipped_reasons(sink: &MockAcquisitionEventSink) -> Vec<(String, SkipReason)> {
    sink.events()
        .into_iter()
        .filter_map(|event| match event {
            AcquisitionEvent::CandidateSkipped {
                network_id, reason, ..
            } => Some((network_id, reason)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_first_successful_candidate_ends_the_run() {
    let api = Arc::new(
        MockAcquisitionApi::new()
            .with_networks(&["n1", "n2", "n3"])
            .with_quote("n1", Ok(json!({"code": 200, "data": {}})))
            .with_amount("n2", "a2")
            .with_payment_code("a2", 4001)
            .with_amount("n3", "a3")
            .with_payment_code("a3", 200),
    );
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink);

    let outcome = orch.run(&CancellationToken::new()).await.unwrap();

    let acquisition = outcome.acquisition().expect("acquired");
    assert_eq!(acquisition.candidate.network_id, "n3");
    assert_eq!(acquisition.config.config_id, "cfg-1");
    assert_eq!(acquisition.amount_id, "a3");
    assert_eq!(acquisition.pass, 1);

    assert_eq!(
        api.calls(),
        vec![
            ApiCall::Prime,
            ApiCall::FetchConfig,
            ApiCall::FetchCandidates {
                config_id: "cfg-1".to_string()
            },
            ApiCall::Quote {
                network_id: "n1".to_string()
            },
            ApiCall::Quote {
                network_id: "n2".to_string()
            },
            ApiCall::Payment {
                amount_id: "a2".to_string()
            },
            ApiCall::Quote {
                network_id: "n3".to_string()
            },
            ApiCall::Payment {
                amount_id: "a3".to_string()
            },
        ]
    );

    assert_eq!(
        skipped_reasons(&sink),
        vec![
            ("n1".to_string(), SkipReason::NoQuote),
            (
                "n2".to_string(),
                SkipReason::PaymentRejected {
                    code: 4001,
                    message: Some("ok".to_string())
                }
            ),
        ]
    );
    assert_eq!(sink.acquired().len(), 1);
    assert_eq!(orch.state(), WorkflowState::Succeeded);
    assert!(!orch.is_running());
}

#[tokio::test]
async fn test_failed_passes_repeat_the_full_candidate_order_until_cancelled() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let quotes = AtomicUsize::new(0);

    // The sixth quote is the last candidate of pass 2; the run stops at the
    // start of pass 3.
    let api = Arc::new(
        MockAcquisitionApi::new()
            .with_networks(&["n1", "n2", "n3"])
            .with_amount("n2", "a2")
            .with_payment_code("a2", 500)
            .on_call(move |call| {
                if matches!(call, ApiCall::Quote { .. })
                    && quotes.fetch_add(1, Ordering::SeqCst) + 1 == 6
                {
                    trigger.cancel();
                }
            }),
    );
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink);

    let result = orch.run(&cancel).await;

    assert_eq!(
        result,
        Err(AcquisitionError::Cancelled {
            step: WorkflowStep::Quote
        })
    );
    assert_eq!(
        api.quoted_networks(),
        vec!["n1", "n2", "n3", "n1", "n2", "n3"]
    );
    let payments = api
        .calls()
        .into_iter()
        .filter(|call| matches!(call, ApiCall::Payment { .. }))
        .count();
    assert_eq!(payments, 2);

    let events = sink.events();
    let run_id = events[0].run_id();
    let passes: Vec<u32> = events
        .iter()
        .filter_map(|event| match event {
            AcquisitionEvent::PassCompleted { pass, .. } => Some(*pass),
            _ => None,
        })
        .collect();
    assert_eq!(passes, vec![1, 2]);
    assert!(events.contains(&AcquisitionEvent::PassCompleted { run_id, pass: 2 }));

    let skipped: Vec<String> = skipped_reasons(&sink)
        .into_iter()
        .map(|(network, _)| network)
        .collect();
    assert_eq!(skipped, vec!["n1", "n2", "n3", "n1", "n2", "n3"]);

    assert!(sink.acquired().is_empty());
    assert!(matches!(orch.state(), WorkflowState::Failed { .. }));
    assert!(!orch.is_running());
}

#[tokio::test]
async fn test_pass_cap_stops_the_loop() {
    let api = Arc::new(MockAcquisitionApi::new().with_networks(&["n1", "n2", "n3"]));
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink).with_policy(
        RetryPolicy::default()
            .with_pacing(Duration::ZERO)
            .with_max_passes(Some(2)),
    );

    let result = orch.run(&CancellationToken::new()).await;

    assert_eq!(result, Err(AcquisitionError::PassLimitReached { passes: 2 }));
    assert_eq!(api.quoted_networks().len(), 6);
}

#[tokio::test]
async fn test_foreign_host_is_rejected_without_network_calls() {
    let api = Arc::new(MockAcquisitionApi::new());
    let sink = MockAcquisitionEventSink::new();
    let orch = AcquisitionOrchestrator::new(api.clone(), session_store(), "evil.example.com")
        .with_event_sink(Arc::new(sink.clone()));

    assert!(!orch.check_context().is_allowed());
    let result = orch.run(&CancellationToken::new()).await;

    assert!(matches!(result, Err(AcquisitionError::DomainRejected(_))));
    assert_eq!(api.call_count(), 0);
    assert_eq!(orch.state(), WorkflowState::Idle);
    assert!(!orch.is_running());
}

#[tokio::test]
async fn test_malformed_session_fails_at_the_transport_boundary() {
    let api = Arc::new(MockAcquisitionApi::new().with_networks(&["n1"]));
    let sink = MockAcquisitionEventSink::new();
    let store = Arc::new(MemorySessionStore::with_entries([(
        SESSION_RECORD_KEY,
        "{not json",
    )]));
    let orch = orchestrator(&api, store, &sink);

    let err = orch.run(&CancellationToken::new()).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(matches!(
        err,
        AcquisitionError::Transport {
            step: WorkflowStep::Priming,
            ..
        }
    ));
    assert_eq!(api.calls(), vec![ApiCall::Prime]);
    assert_eq!(api.credentials_seen(), vec![SessionCredentials::default()]);
}

#[tokio::test]
async fn test_missing_session_record_fails_at_the_transport_boundary() {
    let api = Arc::new(MockAcquisitionApi::new());
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, Arc::new(MemorySessionStore::new()), &sink);

    let err = orch.run(&CancellationToken::new()).await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_second_run_while_busy_is_a_no_op() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(
        MockAcquisitionApi::new()
            .hold_priming(gate.clone())
            .with_networks(&["n1"])
            .with_amount("n1", "a1")
            .with_payment_code("a1", 200),
    );
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink);
    let cancel = CancellationToken::new();

    let first = orch.run(&cancel);
    let second = async {
        let outcome = orch.run(&cancel).await;
        gate.notify_one();
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert!(matches!(first, Ok(RunOutcome::Acquired(_))));
    assert_eq!(second, Ok(RunOutcome::AlreadyRunning));
    let primes = api
        .calls()
        .into_iter()
        .filter(|c| *c == ApiCall::Prime)
        .count();
    assert_eq!(primes, 1);
    assert_eq!(sink.acquired().len(), 1);
}

#[tokio::test]
async fn test_orchestrator_can_run_again_after_completion() {
    let api = Arc::new(
        MockAcquisitionApi::new()
            .with_networks(&["n1"])
            .with_amount("n1", "a1")
            .with_payment_code("a1", 200),
    );
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink);

    assert!(orch.run(&CancellationToken::new()).await.is_ok());
    assert!(matches!(
        orch.run(&CancellationToken::new()).await,
        Ok(RunOutcome::Acquired(_))
    ));

    let acquired = sink.acquired();
    assert_eq!(acquired.len(), 2);
    assert_ne!(acquired[0].run_id(), acquired[1].run_id());
}

#[tokio::test]
async fn test_credentials_are_read_once_per_run() {
    let store = session_store();
    let writer = store.clone();
    let api = Arc::new(
        MockAcquisitionApi::new()
            .with_networks(&["n1"])
            .with_amount("n1", "a1")
            .with_payment_code("a1", 200)
            .on_call(move |call| {
                if *call == ApiCall::FetchConfig {
                    writer
                        .set(
                            SESSION_RECORD_KEY,
                            r#"{"access_token":"rotated","login_id":"99"}"#,
                        )
                        .unwrap();
                }
            }),
    );
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, store, &sink);

    orch.run(&CancellationToken::new()).await.unwrap();

    let seen = api.credentials_seen();
    assert_eq!(seen.len(), 5);
    assert!(seen
        .iter()
        .all(|c| *c == SessionCredentials::new("tok-1", "42")));
}

#[tokio::test]
async fn test_config_fetch_failure_aborts_the_run() {
    let api = Arc::new(
        MockAcquisitionApi::new().with_config(Err(TransportError::Network(
            "connection reset".to_string(),
        ))),
    );
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink);

    let result = orch.run(&CancellationToken::new()).await;

    assert_eq!(
        result,
        Err(AcquisitionError::Transport {
            step: WorkflowStep::FetchConfig,
            status: None,
            message: "Request failed: connection reset".to_string(),
        })
    );
    assert_eq!(api.calls(), vec![ApiCall::Prime, ApiCall::FetchConfig]);
}

#[tokio::test]
async fn test_empty_config_list_is_a_schema_error() {
    let api = Arc::new(MockAcquisitionApi::new().with_config(Ok(json!({"data": {"list": []}}))));
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink);

    let result = orch.run(&CancellationToken::new()).await;

    assert_eq!(
        result,
        Err(AcquisitionError::Schema("missing config".to_string()))
    );
    assert_eq!(api.calls(), vec![ApiCall::Prime, ApiCall::FetchConfig]);
}

#[tokio::test]
async fn test_empty_candidate_list_is_a_schema_error() {
    let api = Arc::new(MockAcquisitionApi::new().with_networks(&[]));
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink);

    let result = orch.run(&CancellationToken::new()).await;

    assert_eq!(
        result,
        Err(AcquisitionError::Schema("missing subscription".to_string()))
    );
    assert!(api.quoted_networks().is_empty());
    assert!(matches!(orch.state(), WorkflowState::Failed { .. }));
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_calls() {
    let api = Arc::new(MockAcquisitionApi::new());
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = orch.run(&cancel).await;

    assert_eq!(
        result,
        Err(AcquisitionError::Cancelled {
            step: WorkflowStep::Priming
        })
    );
    assert_eq!(api.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_payment_waits_for_the_pacing_interval() {
    let stamps: Arc<Mutex<Vec<(ApiCall, tokio::time::Instant)>>> = Arc::default();
    let recorder = stamps.clone();
    let api = Arc::new(
        MockAcquisitionApi::new()
            .with_networks(&["n1"])
            .with_amount("n1", "a1")
            .with_payment_code("a1", 200)
            .on_call(move |call| {
                recorder
                    .lock()
                    .unwrap()
                    .push((call.clone(), tokio::time::Instant::now()));
            }),
    );
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink)
        .with_policy(RetryPolicy::default().with_pacing(Duration::from_secs(1)));

    orch.run(&CancellationToken::new()).await.unwrap();

    let stamps = stamps.lock().unwrap();
    let quoted = stamps
        .iter()
        .find(|(c, _)| matches!(c, ApiCall::Quote { .. }))
        .map(|(_, t)| *t)
        .unwrap();
    let paid = stamps
        .iter()
        .find(|(c, _)| matches!(c, ApiCall::Payment { .. }))
        .map(|(_, t)| *t)
        .unwrap();
    assert!(paid - quoted >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_state_changes_follow_the_workflow() {
    let api = Arc::new(
        MockAcquisitionApi::new()
            .with_networks(&["n1"])
            .with_amount("n1", "a1")
            .with_payment_code("a1", 200),
    );
    let sink = MockAcquisitionEventSink::new();
    let orch = orchestrator(&api, session_store(), &sink);

    orch.run(&CancellationToken::new()).await.unwrap();

    let states: Vec<WorkflowState> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            AcquisitionEvent::StateChanged { state, .. } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            WorkflowState::Validating,
            WorkflowState::Priming,
            WorkflowState::FetchingConfig,
            WorkflowState::FetchingCandidates,
            WorkflowState::Quoting {
                network_id: "n1".to_string(),
                pass: 1
            },
            WorkflowState::Paying {
                network_id: "n1".to_string(),
                pass: 1
            },
            WorkflowState::Succeeded,
        ]
    );
}
