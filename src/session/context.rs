use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::api::ResourceApi;
use crate::core::error::{AppError, AppResult};
use crate::session::bootstrap::Session;

/// Published session state.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// No bootstrap has completed yet
    Starting,
    /// A valid session is installed
    Active(Arc<Session>),
    /// The channel closed; a new session is being derived
    Rebootstrapping,
    /// Re-bootstrap failed; the reason is user-visible
    Failed(String),
    /// The supervisor shut down
    Stopped,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }
}

/// Explicit application context handed to page loaders.
///
/// Holds the resource client and the current [`SessionState`]. The session is
/// swapped whole (`init` on app start, `replace` on re-bootstrap), so readers
/// always see either the old or the new session, never a mix. Only the
/// supervisor should call the mutating methods.
#[derive(Clone)]
pub struct AppContext {
    api: Arc<dyn ResourceApi>,
    state: Arc<watch::Sender<SessionState>>,
    generation: Arc<AtomicU64>,
}

impl AppContext {
    pub fn new(api: Arc<dyn ResourceApi>) -> Self {
        let (state, _) = watch::channel(SessionState::Starting);
        Self {
            api,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn api(&self) -> &dyn ResourceApi {
        self.api.as_ref()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state transition.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Number of sessions installed so far (1 after start, +1 per re-bootstrap).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The current session, or [`AppError::SessionInvalid`] while none is valid.
    pub fn session(&self) -> AppResult<Arc<Session>> {
        match &*self.state.borrow() {
            SessionState::Active(session) => Ok(Arc::clone(session)),
            _ => Err(AppError::SessionInvalid),
        }
    }

    /// Waits until a session is active. Fails if bootstrap failed or the
    /// supervisor stopped.
    pub async fn wait_session(&self) -> AppResult<Arc<Session>> {
        let mut rx = self.watch();
        let state = rx
            .wait_for(|state| !matches!(state, SessionState::Starting | SessionState::Rebootstrapping))
            .await
            .map_err(|_| AppError::SessionInvalid)?;
        match &*state {
            SessionState::Active(session) => Ok(Arc::clone(session)),
            _ => Err(AppError::SessionInvalid),
        }
    }

    /// Installs the first session.
    pub fn init(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SessionState::Active(Arc::clone(&session)));
        session
    }

    /// Swaps in a freshly bootstrapped session, returning the previous one.
    pub fn replace(&self, session: Session) -> Option<Arc<Session>> {
        let session = Arc::new(session);
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.state.send_replace(SessionState::Active(session)) {
            SessionState::Active(previous) => Some(previous),
            _ => None,
        }
    }

    /// Marks the session invalid; loaders get `SessionInvalid` until `replace`.
    pub fn invalidate(&self) {
        self.state.send_replace(SessionState::Rebootstrapping);
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.state.send_replace(SessionState::Failed(reason.into()));
    }

    pub fn stop(&self) {
        self.state.send_replace(SessionState::Stopped);
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
