//! Clockify client integration tests
//!
//! Exercises `ClockifyClient` against a `wiremock` server standing in for
//! the Clockify REST API.

mod common;

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autoclock::commands::watch::resolve_scope_until_ready;
use autoclock::config::RemoteConfig;
use autoclock::error::AutoclockError;
use autoclock::remote::{ClockifyClient, TimerClient};

const ENTRIES_PATH: &str = "/workspaces/ws-1/user/user-1/time-entries";

fn client(server: &MockServer) -> ClockifyClient {
    ClockifyClient::new(&server.uri(), "test-key", Duration::from_secs(5)).expect("client")
}

fn entry_json(end: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "id": "te-1",
        "description": "Review",
        "projectId": "proj-1",
        "timeInterval": {"start": "2026-03-02T09:00:00Z", "end": end}
    })
}

fn is_transport(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<AutoclockError>(),
        Some(AutoclockError::Transport(_))
    )
}

#[tokio::test]
async fn test_active_timer_reads_in_progress_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENTRIES_PATH))
        .and(query_param("in-progress", "true"))
        .and(header("X-Api-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([entry_json(None)])))
        .expect(1)
        .mount(&server)
        .await;

    let timer = client(&server)
        .active_timer(&common::scope())
        .await
        .expect("active timer")
        .expect("a running timer");
    assert_eq!(timer.id, "te-1");
    assert_eq!(timer.project_id.as_deref(), Some("proj-1"));
    assert!(timer.stopped_at.is_none());
}

#[tokio::test]
async fn test_active_timer_empty_list_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENTRIES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    assert!(client(&server)
        .active_timer(&common::scope())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_start_timer_posts_project_and_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/workspaces/ws-1/time-entries"))
        .and(body_partial_json(serde_json::json!({
            "description": "Review",
            "projectId": "proj-1"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(entry_json(None)))
        .expect(1)
        .mount(&server)
        .await;

    let timer = client(&server)
        .start_timer(&common::scope(), Some("proj-1"), "Review")
        .await
        .expect("started");
    assert_eq!(timer.description, "Review");
}

#[tokio::test]
async fn test_stop_timer_patches_end() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(ENTRIES_PATH))
        .and(body_partial_json(serde_json::json!({"end": "2026-03-02T10:00:00Z"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(entry_json(Some("2026-03-02T10:00:00Z"))))
        .expect(1)
        .mount(&server)
        .await;

    let at = chrono::DateTime::parse_from_rfc3339("2026-03-02T10:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let stopped = client(&server)
        .stop_timer(&common::scope(), at)
        .await
        .unwrap()
        .expect("stopped timer");
    assert_eq!(stopped.stopped_at, Some(at));
}

#[tokio::test]
async fn test_stop_timer_not_found_means_nothing_running() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(ENTRIES_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client(&server)
        .stop_timer(&common::scope(), chrono::Utc::now())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_server_error_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENTRIES_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client(&server).active_timer(&common::scope()).await.unwrap_err();
    assert!(is_transport(&err));
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_unauthorized_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server)
        .start_timer(&common::scope(), None, "x")
        .await
        .unwrap_err();
    assert!(is_transport(&err));
}

#[tokio::test]
async fn test_resolve_scope_reads_user_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("X-Api-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "user-9",
            "activeWorkspace": "ws-9",
            "defaultWorkspace": "ws-default"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = RemoteConfig {
        api_base: server.uri(),
        ..RemoteConfig::default()
    };
    let scope = client(&server).resolve_scope(&config).await.unwrap();
    assert_eq!(scope.workspace_id, "ws-9");
    assert_eq!(scope.user_id, "user-9");
}

#[tokio::test]
async fn test_resolve_scope_prefers_configured_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = RemoteConfig {
        api_base: server.uri(),
        workspace_id: Some("ws-1".to_string()),
        user_id: Some("user-1".to_string()),
        ..RemoteConfig::default()
    };
    assert_eq!(client(&server).resolve_scope(&config).await.unwrap(), common::scope());
}

#[tokio::test]
async fn test_from_storage_requires_saved_key() {
    let (storage, _tmp) = common::create_temp_storage();
    let config = RemoteConfig::default();

    let err = ClockifyClient::from_storage(&config, &storage).err().expect("missing key");
    assert!(matches!(
        err.downcast_ref::<AutoclockError>(),
        Some(AutoclockError::MissingCredentials(_))
    ));

    storage.append_token("k", chrono::Utc::now()).unwrap();
    assert!(ClockifyClient::from_storage(&config, &storage).is_ok());
}

#[tokio::test]
async fn test_watch_scope_resolution_retries_until_reachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "user-1",
            "activeWorkspace": "ws-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = RemoteConfig {
        api_base: server.uri(),
        ..RemoteConfig::default()
    };
    let token = CancellationToken::new();
    let scope = resolve_scope_until_ready(&client(&server), &config, Duration::from_millis(10), &token)
        .await
        .unwrap();
    assert_eq!(scope, Some(common::scope()));
}

#[tokio::test]
async fn test_watch_scope_resolution_stops_on_cancel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = RemoteConfig {
        api_base: server.uri(),
        ..RemoteConfig::default()
    };
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let scope = tokio::time::timeout(
        Duration::from_secs(5),
        resolve_scope_until_ready(&client(&server), &config, Duration::from_millis(10), &token),
    )
    .await
    .expect("cancel ends the retries")
    .unwrap();
    assert!(scope.is_none());
}

#[tokio::test]
async fn test_watch_scope_resolution_fails_fast_without_workspace() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "user-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = RemoteConfig {
        api_base: server.uri(),
        ..RemoteConfig::default()
    };
    let err = resolve_scope_until_ready(&client(&server), &config, Duration::from_millis(10), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(!is_transport(&err));
}
