//! Identity provider: the host bridge that hands out the init-data blob.
//!
//! The bridge exposes an `init()` / `restore()` / `raw()` triple which must be
//! called in that order once per process lifetime. [`IdentityProvider`] wraps
//! any bridge and enforces the ordering so callers only ask for a
//! [`Credential`].

use std::sync::Mutex;

use crate::core::config::INIT_DATA_ENV;
use crate::core::error::AuthError;
use crate::telegram::init_data::Credential;

/// Host-side source of init data.
///
/// All methods are synchronous and must not touch the network.
pub trait InitDataBridge: Send + Sync {
    /// Prepare the bridge (native SDK handshake).
    fn init(&self) -> Result<(), AuthError>;

    /// Load the launch parameters.
    fn restore(&self) -> Result<(), AuthError>;

    /// The raw blob, or `None` when the app was not launched by Telegram.
    fn raw(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Initialized,
    Restored,
}

/// Order-enforcing wrapper around an [`InitDataBridge`].
pub struct IdentityProvider {
    bridge: Box<dyn InitDataBridge>,
    phase: Mutex<Phase>,
}

impl IdentityProvider {
    pub fn new(bridge: impl InitDataBridge + 'static) -> Self {
        Self {
            bridge: Box::new(bridge),
            phase: Mutex::new(Phase::Fresh),
        }
    }

    fn phase(&self) -> Phase {
        match self.phase.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_phase(&self, phase: Phase) {
        match self.phase.lock() {
            Ok(mut guard) => *guard = phase,
            Err(poisoned) => *poisoned.into_inner() = phase,
        }
    }

    /// First step of the triple. Calling it again is a no-op.
    pub fn init(&self) -> Result<(), AuthError> {
        if self.phase() != Phase::Fresh {
            return Ok(());
        }
        self.bridge.init()?;
        self.set_phase(Phase::Initialized);
        Ok(())
    }

    /// Second step. Fails when `init()` has not run.
    pub fn restore(&self) -> Result<(), AuthError> {
        match self.phase() {
            Phase::Fresh => Err(AuthError::BridgeNotReady("restore() before init()")),
            Phase::Restored => Ok(()),
            Phase::Initialized => {
                self.bridge.restore()?;
                self.set_phase(Phase::Restored);
                Ok(())
            }
        }
    }

    /// Third step. Fails when `restore()` has not run.
    pub fn raw(&self) -> Result<Option<String>, AuthError> {
        if self.phase() != Phase::Restored {
            return Err(AuthError::BridgeNotReady("raw() before restore()"));
        }
        Ok(self.bridge.raw())
    }

    /// Runs the triple as needed and returns a usable credential.
    pub fn credential(&self) -> Result<Credential, AuthError> {
        self.init()?;
        self.restore()?;
        let raw = self.raw()?.ok_or(AuthError::MissingInitData)?;
        Credential::new(raw)
    }
}

impl std::fmt::Debug for IdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityProvider").field("phase", &self.phase()).finish()
    }
}

/// Bridge over a blob known up front (CLI flag, tests).
#[derive(Debug, Clone, Default)]
pub struct StaticInitData {
    raw: Option<String>,
}

impl StaticInitData {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: Some(raw.into()) }
    }

    /// A bridge that never yields init data.
    pub fn absent() -> Self {
        Self { raw: None }
    }
}

impl InitDataBridge for StaticInitData {
    fn init(&self) -> Result<(), AuthError> {
        Ok(())
    }

    fn restore(&self) -> Result<(), AuthError> {
        Ok(())
    }

    fn raw(&self) -> Option<String> {
        self.raw.clone()
    }
}

/// Bridge reading `TWA_INIT_DATA` on `restore()`.
#[derive(Debug, Default)]
pub struct EnvInitData {
    restored: Mutex<Option<String>>,
}

impl EnvInitData {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InitDataBridge for EnvInitData {
    fn init(&self) -> Result<(), AuthError> {
        Ok(())
    }

    fn restore(&self) -> Result<(), AuthError> {
        let value = std::env::var(INIT_DATA_ENV).ok().filter(|v| !v.trim().is_empty());
        match self.restored.lock() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
        Ok(())
    }

    fn raw(&self) -> Option<String> {
        match self.restored.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
