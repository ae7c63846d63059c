use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use taskvault_core::config::StoreOptions;
use taskvault_core::daemon::DaemonClient;
use taskvault_core::error::StoreError;
use taskvault_core::store::{TaskFilter, TaskStore};
use taskvault_core::task::{Status, TaskDraft};

fn client(server: &MockServer) -> DaemonClient {
    DaemonClient::new(server.uri(), Duration::from_millis(500)).expect("client")
}

fn wire_task(id: &str, title: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "status": status,
        "due": "2026-08-14",
        "waiting_on": "vendor",
        "assigned_to": "me",
        "time_estimate": "2h",
        "tags": ["work"],
        "created": "2026-08-01T09:00:00",
        "updated": "2026-08-05T09:00:00",
        "content": "Notes.",
        "is_overdue": false,
        "is_due_today": false
    })
}

fn health_payload() -> serde_json::Value {
    json!({
        "ok": true,
        "data": {
            "status": "ok",
            "version": "1.4.0",
            "uptime": 321.5,
            "cache": { "task_count": 42, "last_refresh": "2026-08-05T09:00:00" }
        }
    })
}

#[tokio::test]
async fn health_probe_caches_the_parsed_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_payload()))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(client.last_health().is_none());
    assert!(client.test_connection().await);

    let health = client.last_health().expect("cached health");
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, "1.4.0");
    assert_eq!(health.cache.task_count, 42);
}

#[tokio::test]
async fn failed_probe_returns_false_and_keeps_the_stale_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_payload()))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(client.test_connection().await);

    // The daemon stops answering the protocol; the cached value survives.
    server.reset().await;
    assert!(!client.test_connection().await);
    let health = client.last_health().expect("stale health retained");
    assert_eq!(health.version, "1.4.0");
}

#[tokio::test]
async fn probe_against_a_dead_daemon_is_false_not_an_error() {
    let client =
        DaemonClient::new("http://127.0.0.1:9", Duration::from_millis(300)).expect("client");
    assert!(!client.test_connection().await);
    assert!(client.last_health().is_none());
}

#[tokio::test]
async fn list_sends_the_status_query_and_maps_the_wire_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .and(query_param("status", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": [wire_task("7KQM", "Call vendor", "next")]
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let tasks = client.list(Some(Status::Next)).await.expect("list");
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.id, "7KQM");
    assert_eq!(task.status, Status::Next);
    assert_eq!(task.waiting_on.as_deref(), Some("vendor"));
    assert_eq!(task.time_estimate.as_deref(), Some("2h"));
    assert_eq!(task.due.map(taskvault_core::dates::format_iso).as_deref(), Some("2026-08-14"));
    assert_eq!(task.body, "Notes.");
}

#[tokio::test]
async fn not_found_envelope_becomes_none_for_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/ZZZZ"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "ok": false,
            "error": { "code": "not_found", "message": "ZZZZ" }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let found = client.get("ZZZZ").await.expect("get");
    assert!(found.is_none());
}

#[tokio::test]
async fn error_envelopes_surface_as_typed_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks/ZZZZ/status"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "ok": false,
            "error": { "code": "not_found", "message": "ZZZZ" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/tasks/7KQM"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "ok": false,
            "error": { "code": "locked", "message": "task is leased" }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.update_status("ZZZZ", Status::Next).await;
    assert!(matches!(err, Err(StoreError::NotFound(_))));

    let err = client.delete("7KQM").await;
    match err {
        Err(StoreError::Daemon { code, .. }) => assert_eq!(code, "locked"),
        other => panic!("expected daemon error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_envelope_responses_are_transport_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>boom</html>"))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.list(None).await;
    assert!(matches!(err, Err(StoreError::Transport(_))));
}

#[tokio::test]
async fn create_posts_and_returns_the_daemon_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": wire_task("A2B3", "From daemon", "inbox")
        })))
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("tempdir");
    let mut options = StoreOptions::file_only(temp.path());
    options.daemon_enabled = true;
    options.daemon_url = server.uri();
    let store = TaskStore::new(options).expect("store");

    let task = store
        .create(TaskDraft {
            title: "From daemon".to_string(),
            ..TaskDraft::default()
        })
        .await
        .expect("create");
    assert_eq!(task.id, "A2B3");
    assert!(!store.fell_back(), "daemon served the call");

    // The daemon answered, so nothing was written to the local vault.
    let local = store
        .vault()
        .task_path(Status::Inbox, "A2B3");
    assert!(!local.exists());
}

#[tokio::test]
async fn transport_failure_falls_back_to_the_vault_for_that_call() {
    let temp = TempDir::new().expect("tempdir");
    let mut options = StoreOptions::file_only(temp.path());
    options.daemon_enabled = true;
    options.daemon_url = "http://127.0.0.1:9".to_string();
    options.request_timeout_ms = 300;
    let store = TaskStore::new(options).expect("store");

    let task = store
        .create(TaskDraft {
            title: "Written locally".to_string(),
            ..TaskDraft::default()
        })
        .await
        .expect("create still succeeds");
    assert!(store.fell_back(), "fallback should be flagged");

    // The task is retrievable through file-backed listing.
    let listed = store.list(TaskFilter::All).await.expect("list");
    assert!(listed.iter().any(|t| t.id == task.id));
    assert!(store
        .vault()
        .task_path(Status::Inbox, &task.id)
        .is_file());
}

#[tokio::test]
async fn daemon_application_errors_do_not_fall_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks/ZZZZ/status"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "ok": false,
            "error": { "code": "not_found", "message": "ZZZZ" }
        })))
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("tempdir");
    let mut options = StoreOptions::file_only(temp.path());
    options.daemon_enabled = true;
    options.daemon_url = server.uri();
    let store = TaskStore::new(options).expect("store");

    let err = store.update_status("ZZZZ", Status::Next).await;
    assert!(matches!(err, Err(StoreError::NotFound(_))));
    assert!(!store.fell_back(), "authoritative answers are not fallbacks");
}
