//! Session bootstrap and lifecycle supervision

pub mod bootstrap;
pub mod context;
pub mod supervisor;

pub use bootstrap::{Bootstrapper, Session};
pub use context::{AppContext, SessionState};
pub use supervisor::{Supervisor, SupervisorHandle};
