//! Realtime channel lifecycle and session re-bootstrap
//!
//! Runs the supervisor against a wiremock REST backend and a local
//! WebSocket server.
//!
//! Run with: cargo test --test supervisor_test

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use common::fixtures::ME;
use common::{identity_json, message_json, SequenceInitData, TestBackend, WsServer};
use twachat::core::error::AppError;
use twachat::realtime::{ChannelManager, ClientCommand, ServerEvent};
use twachat::session::{AppContext, Bootstrapper, SessionState, Supervisor, SupervisorHandle};
use twachat::telegram::IdentityProvider;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    backend: TestBackend,
    ws: WsServer,
}

impl Harness {
    async fn start() -> Self {
        let ws = WsServer::start().await;
        let backend = TestBackend::start_with_ws(&ws.url).await;
        Self { backend, ws }
    }

    async fn mount_me(&self, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(identity_json(ME, "Me")))
            .expect(expected_calls)
            .mount(&self.backend.server)
            .await;
    }

    async fn launch(&self, blobs: &[&str]) -> (AppContext, SupervisorHandle) {
        let provider = Arc::new(IdentityProvider::new(SequenceInitData::new(blobs.iter().copied())));
        let bootstrapper = Bootstrapper::new(provider, Arc::clone(&self.backend.api));
        let channels = ChannelManager::new(&self.backend.config).unwrap();
        Supervisor::launch(bootstrapper, channels).await.unwrap()
    }
}

/// Waits until the context publishes an active session for `credential`.
async fn wait_for_credential(ctx: &AppContext, credential: &str) {
    let mut state = ctx.watch();
    tokio::time::timeout(
        WAIT,
        state.wait_for(|state| matches!(state, SessionState::Active(s) if s.credential().expose() == credential)),
    )
    .await
    .expect("session was not re-established")
    .unwrap();
}

#[tokio::test]
async fn test_launch_opens_channel_with_credential() {
    let mut harness = Harness::start().await;
    harness.mount_me(1).await;

    let (ctx, handle) = harness.launch(&["user=%7B%22id%22%3A1%7D&hash=ab"]).await;
    let conn = harness.ws.accept().await;

    assert_eq!(conn.init_data().as_deref(), Some("user=%7B%22id%22%3A1%7D&hash=ab"));
    assert!(conn.uri.starts_with("/ws?initData="));
    assert_eq!(ctx.generation(), 1);
    assert!(ctx.state().is_active());
    assert_eq!(ctx.session().unwrap().user_id(), ME);

    handle.stop().await;
    assert!(!ctx.state().is_active());
    assert!(matches!(ctx.state(), SessionState::Stopped));
}

#[tokio::test]
async fn test_server_close_rebootstraps_once() {
    let mut harness = Harness::start().await;
    harness.mount_me(2).await;

    let (ctx, handle) = harness.launch(&["cred-1", "cred-2"]).await;
    let first = harness.ws.accept().await;
    assert_eq!(first.init_data().as_deref(), Some("cred-1"));

    first.close().await;

    let second = harness.ws.accept().await;
    assert_eq!(second.init_data().as_deref(), Some("cred-2"));
    wait_for_credential(&ctx, "cred-2").await;
    assert_eq!(ctx.generation(), 2);

    // The retired channel's own close signal must not start another round.
    harness.ws.assert_no_connection(Duration::from_millis(300)).await;

    handle.stop().await;
}

#[tokio::test]
async fn test_manual_rebootstrap_ignores_stale_close() {
    let mut harness = Harness::start().await;
    harness.mount_me(2).await;

    let (ctx, handle) = harness.launch(&["cred-1", "cred-2"]).await;
    let mut first = harness.ws.accept().await;

    handle.rebootstrap().unwrap();

    first.expect_closed().await;
    let second = harness.ws.accept().await;
    assert_eq!(second.init_data().as_deref(), Some("cred-2"));
    wait_for_credential(&ctx, "cred-2").await;
    harness.ws.assert_no_connection(Duration::from_millis(300)).await;
    assert_eq!(ctx.generation(), 2);

    handle.stop().await;
}

#[tokio::test]
async fn test_failed_rebootstrap_is_published() {
    let mut harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(identity_json(ME, "Me")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&harness.backend.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&harness.backend.server)
        .await;

    let (ctx, handle) = harness.launch(&["cred-1", "cred-2"]).await;
    harness.ws.accept().await.close().await;

    let mut state = ctx.watch();
    let failed = tokio::time::timeout(WAIT, state.wait_for(|s| matches!(s, SessionState::Failed(_))))
        .await
        .expect("failure was not published")
        .unwrap()
        .clone();
    match failed {
        SessionState::Failed(reason) => assert!(reason.contains("401"), "reason: {reason}"),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(matches!(ctx.session(), Err(AppError::SessionInvalid)));
    assert!(matches!(ctx.wait_session().await, Err(AppError::SessionInvalid)));

    handle.stop().await;
}

#[tokio::test]
async fn test_events_survive_channel_replacement() {
    let mut harness = Harness::start().await;
    harness.mount_me(2).await;

    let (ctx, handle) = harness.launch(&["cred-1", "cred-2"]).await;
    let mut events = handle.subscribe();

    let mut first = harness.ws.accept().await;
    first
        .push(json!({ "type": "new_message", "payload": message_json(1, 5, ME, "before") }))
        .await;
    match tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap() {
        ServerEvent::NewMessage(message) => assert_eq!(message.text, "before"),
        other => panic!("unexpected event {other:?}"),
    }

    first.close().await;
    let mut second = harness.ws.accept().await;
    wait_for_credential(&ctx, "cred-2").await;

    second
        .push(json!({ "type": "new_chat", "payload": { "id": 8 } }))
        .await;
    match tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap() {
        ServerEvent::NewChat(chat) => assert_eq!(chat.id, 8),
        other => panic!("unexpected event {other:?}"),
    }

    handle.stop().await;
}

#[tokio::test]
async fn test_send_goes_through_current_channel() {
    let mut harness = Harness::start().await;
    harness.mount_me(1).await;

    let (_ctx, handle) = harness.launch(&["cred-1"]).await;
    let mut conn = harness.ws.accept().await;

    handle
        .send(ClientCommand::NewMessage {
            chat_id: 5,
            text: "hey".to_string(),
        })
        .await
        .unwrap();

    let frame = conn.next_json().await;
    assert_eq!(frame, json!({ "type": "new_message", "payload": { "chat_id": 5, "text": "hey" } }));

    handle.stop().await;
}
