//! twachat - client-side session and data layer for a Telegram Mini App chat
//!
//! Authenticates against the backend with Telegram init data, fetches
//! user/chat/message resources over HTTP and keeps a realtime WebSocket
//! channel whose closure triggers a full session re-bootstrap.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors and logging
//! - `telegram`: init data and the host identity bridge
//! - `api`: resource client and backend types
//! - `realtime`: WebSocket channel and its frames
//! - `session`: bootstrap, `AppContext` and the supervising task
//! - `loaders`: page view-model loaders

pub mod api;
pub mod cli;
pub mod core;
pub mod loaders;
pub mod realtime;
pub mod session;
pub mod telegram;

// Re-export commonly used types for convenience
pub use api::{ApiClient, ResourceApi};
pub use core::{AppError, AppResult, ClientConfig};
pub use session::{AppContext, Bootstrapper, Session, Supervisor};
pub use telegram::{Credential, IdentityProvider};
