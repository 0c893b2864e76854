//! Integration tests for the HTTP session client driving the sync engine.
//!
//! A mockito server stands in for the remote persistence service.

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use pomosync_core::error::ApiError;
use pomosync_core::sync::{RetryPolicy, SessionApi};
use pomosync_core::{AuthSession, NewSession, ReqwestSessionApi, SessionId, SyncEngine, SyncSettings};
use serde_json::json;

fn engine(base_url: &str) -> SyncEngine<ReqwestSessionApi> {
    let api = ReqwestSessionApi::new(base_url, Duration::from_secs(5)).unwrap();
    let settings = SyncSettings {
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
        },
        ..SyncSettings::default()
    };
    SyncEngine::new(Arc::new(api), AuthSession::signed_in("token-1"), settings)
}

#[tokio::test]
async fn add_session_round_trip_replaces_pending_entry() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/api/sessions")
        .match_header("authorization", "Bearer token-1")
        .match_body(Matcher::PartialJson(json!({
            "duration": 25,
            "task": "Write spec",
            "completed": true
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"session": {"id": 42, "duration": 25, "task": "Write spec", "completed": true, "created_at": "2026-03-02T09:25:00Z"}}"#)
        .expect(1)
        .create_async()
        .await;
    let list = server
        .mock("GET", "/api/sessions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 42, "durationMinutes": 25, "taskName": "Write spec", "completed": true, "createdAt": "2026-03-02T09:25:00Z"}]"#)
        .expect(1)
        .create_async()
        .await;
    let stats = server
        .mock("GET", "/api/stats")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"totalSessions": 1, "completedSessions": 1, "totalFocusMinutes": 25, "avgSessionLength": 25}"#)
        .expect(1)
        .create_async()
        .await;

    let engine = engine(&format!("{}/api", server.url()));
    engine
        .add_session(NewSession::new(25, "Write spec", true))
        .await
        .unwrap();

    create.assert_async().await;
    list.assert_async().await;
    stats.assert_async().await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.sessions.len(), 1);
    assert_eq!(snapshot.sessions[0].id, SessionId::Confirmed(42));
    assert_eq!(snapshot.sessions[0].task, "Write spec");
    let stats = snapshot.stats.expect("stats loaded");
    assert_eq!(stats.total_minutes, 25);
    assert_eq!(stats.average_session_minutes, 25.0);
    assert_eq!(snapshot.error, None);
}

#[tokio::test]
async fn stats_outage_is_retried_once_and_named() {
    let mut server = Server::new_async().await;
    let _list = server
        .mock("GET", "/sessions")
        .with_status(200)
        .with_body(r#"{"sessions": [{"id": 1, "duration": 25, "task": "Deep work"}]}"#)
        .create_async()
        .await;
    let stats = server
        .mock("GET", "/stats")
        .with_status(503)
        .with_body("maintenance")
        .expect(2)
        .create_async()
        .await;

    let engine = engine(&server.url());
    engine.refresh_stats().await;

    stats.assert_async().await;
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.sessions.len(), 1);
    assert_eq!(snapshot.sessions[0].id, SessionId::Confirmed(1));
    let error = snapshot.error.expect("error surfaced");
    assert!(error.starts_with("Failed to load stats:"), "{error}");
    assert!(error.contains("503"), "{error}");
}

#[tokio::test]
async fn unauthorized_responses_stay_silent() {
    let mut server = Server::new_async().await;
    let list = server
        .mock("GET", "/sessions")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let stats = server
        .mock("GET", "/stats")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let engine = engine(&server.url());
    engine.refresh_stats().await;

    list.assert_async().await;
    stats.assert_async().await;
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.error, None);
    assert!(snapshot.sessions.is_empty());
    assert!(snapshot.stats.is_none());
}

#[tokio::test]
async fn failed_create_leaves_unsaved_entry() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/sessions")
        .with_status(500)
        .with_body("boom")
        .expect(1)
        .create_async()
        .await;

    let engine = engine(&server.url());
    engine
        .add_session(NewSession::new(25, "Write spec", true))
        .await
        .unwrap();

    create.assert_async().await;
    let snapshot = engine.snapshot();
    let pending = snapshot.pending().expect("entry retained");
    assert!(pending.unsaved);
    assert!(snapshot
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("Session saved locally but failed to sync:")));
}

#[tokio::test]
async fn client_maps_statuses_and_bodies() {
    let mut server = Server::new_async().await;
    let _missing = server
        .mock("GET", "/sessions")
        .with_status(404)
        .with_body("no such route")
        .create_async()
        .await;
    let _garbage = server
        .mock("GET", "/stats")
        .with_status(200)
        .with_body("<html>")
        .create_async()
        .await;

    let api = ReqwestSessionApi::new(&server.url(), Duration::from_secs(5)).unwrap();
    assert_eq!(
        api.fetch_sessions("token-1").await.unwrap_err(),
        ApiError::Client {
            status: 404,
            message: "no such route".into()
        }
    );
    assert!(matches!(
        api.fetch_stats("token-1").await.unwrap_err(),
        ApiError::Decode(_)
    ));
    assert_eq!(
        api.fetch_sessions("  ").await.unwrap_err(),
        ApiError::Unauthorized
    );
}
