//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod fixtures;
pub mod ws_server;

#[allow(unused_imports)]
pub use fixtures::{chat_json, identity_json, member_json, message_json, session_for, SequenceInitData, TestBackend};
#[allow(unused_imports)]
pub use ws_server::{Connection, WsServer};
