//! Tracker over the real HTTP client against a wiremock backend.

use std::sync::Arc;
use std::time::Duration;

use atelier_client::{GenerateRequest, HttpJobApi};
use atelier_core::{ApiConfig, AtelierConfig, JobId, JobStatus};
use atelier_jobs::{AlertKind, JobTracker, ManualScheduler, SubmitOutcome, TickOutcome};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tracker_for(server: &MockServer) -> (JobTracker, Arc<ManualScheduler>) {
    let mut config = AtelierConfig::default();
    config.api = ApiConfig::new(server.uri());
    config.actions.max_retries = 0;
    tracker_with_config(&config)
}

fn tracker_with_config(config: &AtelierConfig) -> (JobTracker, Arc<ManualScheduler>) {
    let api = HttpJobApi::with_token(&config.api, None).unwrap();
    let scheduler = Arc::new(ManualScheduler::new());
    (
        JobTracker::new(Arc::new(api), config, scheduler.clone()),
        scheduler,
    )
}

fn envelope(list: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": 0, "data": {"list": list}}))
}

#[tokio::test]
async fn test_submission_polled_to_completion_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(envelope(json!([{"id": 101, "status": "Queued"}])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/generate/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"list": [{"id": 101, "status": "Queued"}], "total": 1}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/generate/status"))
        .and(query_param("ids", "101"))
        .respond_with(envelope(json!([{"id": 101, "status": "Processing"}])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/generate/status"))
        .and(query_param("ids", "101"))
        .respond_with(envelope(json!([
            {"id": 101, "status": "Succeeded", "resultUrl": "https://x/y.jpg"}
        ])))
        .mount(&server)
        .await;

    let (tracker, scheduler) = tracker_for(&server);

    let outcome = tracker.submit(&GenerateRequest::new("cashmere sweater")).await;
    assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));
    assert!(tracker.gate().is_active());

    scheduler.fire().await;
    assert_eq!(
        tracker.list().get(&JobId::Int(101)).unwrap().status,
        JobStatus::Processing
    );

    scheduler.fire().await;
    let item = tracker.list().get(&JobId::Int(101)).unwrap();
    assert_eq!(item.status, JobStatus::Succeeded);
    assert_eq!(item.result_url.as_deref(), Some("https://x/y.jpg"));
    assert!(!tracker.gate().is_active());
    assert_eq!(scheduler.active_count(), 0);
}

#[tokio::test]
async fn test_server_error_during_poll_raises_alert() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/generate/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"list": [{"id": 5, "status": "Processing"}], "total": 1}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/generate/status"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let (tracker, _scheduler) = tracker_for(&server);
    tracker.reload().await;

    assert_eq!(tracker.poller().tick().await, TickOutcome::Failed);
    assert!(tracker.registry().contains(&JobId::Int(5)));
    let alert = tracker.alerts().active_of(AlertKind::StatusCheckFailed).unwrap();
    assert!(alert.message.contains("temporarily unavailable"));
}

#[tokio::test]
async fn test_rejected_collect_rolls_back_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/generate/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"list": [{"id": 12, "status": "Succeeded", "collected": false}], "total": 1}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/collect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1002,
            "message": "Album limit reached"
        })))
        .mount(&server)
        .await;

    let (tracker, _scheduler) = tracker_for(&server);
    tracker.reload().await;

    let outcome = tracker.set_collected(&JobId::Int(12), true).await;
    assert_eq!(outcome.message(), Some("Album limit reached"));
    assert!(!tracker.list().get(&JobId::Int(12)).unwrap().collected);
}

#[tokio::test]
async fn test_timed_out_submission_is_not_repeated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(
            envelope(json!([{"id": 301, "status": "Queued"}])).set_delay(Duration::from_millis(1500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = AtelierConfig::default();
    config.api = ApiConfig::new(server.uri());
    config.api.timeout_secs = 1;
    config.actions.retry_delay_ms = 1;
    let (tracker, _scheduler) = tracker_with_config(&config);

    let outcome = tracker.submit(&GenerateRequest::new("wool coat")).await;
    assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
    assert!(!tracker.gate().is_active());
    assert!(tracker.alerts().active_of(AlertKind::SubmissionRejected).is_some());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
