use std::sync::Arc;

use crate::api::{Identity, ResourceApi};
use crate::core::error::{AppError, AppResult};
use crate::telegram::{Credential, IdentityProvider};

/// A credential paired with the identity the backend resolved for it.
///
/// Created once per bootstrap and never mutated; re-bootstrap builds a new one.
#[derive(Debug, Clone)]
pub struct Session {
    credential: Credential,
    identity: Identity,
}

impl Session {
    pub fn new(credential: Credential, identity: Identity) -> Self {
        Self { credential, identity }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The current user's backend id.
    pub fn user_id(&self) -> &str {
        &self.identity.id
    }
}

/// Turns init data into a [`Session`].
///
/// 1. Ask the identity provider for the credential (no network).
/// 2. Absent credential → [`AppError::Auth`], nothing is sent.
/// 3. One `GET /users/me`; any failure → [`AppError::IdentityFetch`].
///
/// There is no retry here. Callers re-run the whole bootstrap if they want one.
#[derive(Clone)]
pub struct Bootstrapper {
    provider: Arc<IdentityProvider>,
    api: Arc<dyn ResourceApi>,
}

impl Bootstrapper {
    pub fn new(provider: Arc<IdentityProvider>, api: Arc<dyn ResourceApi>) -> Self {
        Self { provider, api }
    }

    pub fn api(&self) -> &Arc<dyn ResourceApi> {
        &self.api
    }

    pub async fn bootstrap(&self) -> AppResult<Session> {
        let credential = self.provider.credential().map_err(|err| {
            tracing::error!("Cannot bootstrap session: {}", err);
            AppError::Auth(err)
        })?;

        let identity = self
            .api
            .get_me(&credential)
            .await
            .map_err(identity_fetch_error)?;

        tracing::info!(user_id = %identity.id, "Session established");
        Ok(Session::new(credential, identity))
    }
}

impl std::fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper").field("provider", &self.provider).finish_non_exhaustive()
    }
}

fn identity_fetch_error(err: AppError) -> AppError {
    tracing::warn!("Identity exchange failed: {}", err);
    let status = match &err {
        AppError::Http(http) => Some(http.status),
        AppError::Transport(transport) => transport.status(),
        _ => None,
    };
    AppError::IdentityFetch { status }
}
