//! Backend fixtures for integration tests
//!
//! Provides [`TestBackend`], a wiremock server plus a configured resource
//! client, and JSON builders shaped like the backend's responses.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use wiremock::MockServer;

use twachat::api::{ApiClient, Identity, ResourceApi};
use twachat::core::error::AuthError;
use twachat::core::ClientConfig;
use twachat::session::{AppContext, Session};
use twachat::telegram::{Credential, InitDataBridge};

pub const ME: &str = "7d0c6a2e-1f5b-4c8e-9b9a-2f1d3c4b5a60";
pub const MATCH: &str = "b2f4e6a8-3c5d-4e7f-8a9b-0c1d2e3f4a5b";
pub const STRANGER: &str = "e1d2c3b4-a596-4878-9a0b-1c2d3e4f5a6b";

/// A profile as `GET /users/{id}` returns it.
pub fn identity_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "telegram_id": 100500,
        "name": name,
        "birth_date": "1998-03-14T00:00:00",
        "rating": 1200,
        "is_active": true,
        "bio": null,
        "gender": "female",
        "latitude": 41.3111,
        "longitude": 69.2797,
        "place_id": "ChIJ-tashkent",
        "is_location_precise": false,
        "ui_language": "ru",
        "created_at": "2024-05-01T10:00:00.123456",
        "updated_at": "2024-05-02T11:30:00"
    })
}

pub fn member_json(chat_id: i64, user_id: &str) -> Value {
    json!({
        "chat_id": chat_id,
        "user_id": user_id,
        "created_at": "2024-05-03T09:00:00",
        "updated_at": "2024-05-03T09:00:00"
    })
}

pub fn chat_json(id: i64) -> Value {
    json!({
        "id": id,
        "created_at": "2024-05-03T09:00:00",
        "updated_at": "2024-05-03T09:00:00"
    })
}

/// Realtime payloads use a space between date and time.
pub fn message_json(id: i64, chat_id: i64, user_id: &str, text: &str) -> Value {
    json!({
        "id": id,
        "chat_id": chat_id,
        "user_id": user_id,
        "text": text,
        "created_at": "2024-05-03 09:15:00.000001",
        "updated_at": "2024-05-03 09:15:00.000001"
    })
}

/// Wiremock backend with a client pointed at it
pub struct TestBackend {
    pub server: MockServer,
    pub config: ClientConfig,
    pub api: Arc<dyn ResourceApi>,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self::start_with_ws("ws://127.0.0.1:9").await
    }

    pub async fn start_with_ws(websocket_url: &str) -> Self {
        let server = MockServer::start().await;
        let mut config = ClientConfig::for_base(server.uri(), websocket_url);
        config.request_timeout_secs = 5;
        config.connect_timeout_secs = 5;
        let api: Arc<dyn ResourceApi> = Arc::new(ApiClient::new(&config).unwrap());
        Self { server, config, api }
    }

    /// Context with an already installed session for `ME`.
    pub fn context(&self, credential: &str) -> AppContext {
        let ctx = AppContext::new(Arc::clone(&self.api));
        ctx.init(session_for(credential, ME));
        ctx
    }
}

pub fn session_for(credential: &str, user_id: &str) -> Session {
    let identity: Identity = serde_json::from_value(identity_json(user_id, "Me")).unwrap();
    Session::new(Credential::new(credential).unwrap(), identity)
}

/// Bridge that hands out a new blob on every `raw()` call, the way the host
/// refreshes init data after a relaunch. The last blob repeats.
#[derive(Debug, Clone)]
pub struct SequenceInitData {
    blobs: Arc<Mutex<VecDeque<String>>>,
}

impl SequenceInitData {
    pub fn new<I, S>(blobs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blobs: Arc::new(Mutex::new(blobs.into_iter().map(Into::into).collect())),
        }
    }
}

impl InitDataBridge for SequenceInitData {
    fn init(&self) -> Result<(), AuthError> {
        Ok(())
    }

    fn restore(&self) -> Result<(), AuthError> {
        Ok(())
    }

    fn raw(&self) -> Option<String> {
        let mut blobs = self.blobs.lock().unwrap();
        if blobs.len() > 1 {
            blobs.pop_front()
        } else {
            blobs.front().cloned()
        }
    }
}
