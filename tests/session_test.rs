mod common;

use chrono::Duration;
use std::sync::Arc;

use common::{ASSISTANT_ID, FakeAssistant, ManualClock};
use watson_middleware::error::{MiddlewareError, RemoteError};
use watson_middleware::session::{Clock, SessionManager};

fn manager(assistant: Arc<FakeAssistant>, clock: Arc<ManualClock>, minutes: u32) -> SessionManager {
    SessionManager::new(assistant, ASSISTANT_ID, minutes, clock)
}

#[tokio::test]
async fn first_use_creates_a_session() {
    let assistant = Arc::new(FakeAssistant::new());
    let clock = Arc::new(ManualClock::new());
    let sessions = manager(assistant.clone(), clock.clone(), 5);

    assert!(sessions.current().await.is_none());
    let id = sessions.ensure_live_session().await.expect("session");

    assert_eq!(id, "session-1");
    let session = sessions.current().await.expect("tracked");
    assert_eq!(session.expires_at, clock.now() + Duration::minutes(5));
}

#[tokio::test]
async fn session_expires_exactly_at_timeout() {
    let assistant = Arc::new(FakeAssistant::new());
    let clock = Arc::new(ManualClock::new());
    let sessions = manager(assistant.clone(), clock.clone(), 2);

    sessions.ensure_live_session().await.expect("session");
    clock.advance(Duration::minutes(2) - Duration::milliseconds(1));
    assert_eq!(
        sessions.ensure_live_session().await.expect("session"),
        "session-1"
    );

    clock.advance(Duration::milliseconds(1));
    assert_eq!(
        sessions.ensure_live_session().await.expect("session"),
        "session-2"
    );
    assert_eq!(assistant.create_count(), 2);
}

#[tokio::test]
async fn explicit_create_replaces_tracked_session() {
    let assistant = Arc::new(FakeAssistant::new());
    let clock = Arc::new(ManualClock::new());
    let sessions = manager(assistant.clone(), clock.clone(), 5);

    sessions.ensure_live_session().await.expect("session");
    clock.advance(Duration::minutes(1));
    let expires = sessions.create_session().await.expect("session");

    assert_eq!(expires, clock.now() + Duration::minutes(5));
    assert_eq!(
        sessions.current().await.expect("tracked").session_id,
        "session-2"
    );
}

#[tokio::test]
async fn creation_failure_keeps_previous_state() {
    let assistant = Arc::new(FakeAssistant {
        fail_create: Some(RemoteError::new(None, "connection refused")),
        ..Default::default()
    });
    let sessions = manager(assistant, Arc::new(ManualClock::new()), 5);

    let err = sessions
        .ensure_live_session()
        .await
        .expect_err("create must fail");
    assert!(matches!(err, MiddlewareError::SessionCreation(_)));
    assert!(err.to_string().contains("connection refused"));
    assert!(sessions.current().await.is_none());
}

#[tokio::test]
async fn delete_requires_a_live_session_first() {
    let assistant = Arc::new(FakeAssistant {
        fail_create: Some(RemoteError::new(Some(503), "Service Unavailable")),
        ..Default::default()
    });
    let sessions = manager(assistant.clone(), Arc::new(ManualClock::new()), 5);

    let err = sessions
        .delete_session("abc")
        .await
        .expect_err("no session can be created");
    assert!(matches!(err, MiddlewareError::SessionCreation(_)));
    assert!(assistant.deletes.lock().unwrap().is_empty());
}
