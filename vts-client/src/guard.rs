// vts-client/src/guard.rs
use std::sync::Arc;

use common::models::identity::StoredIdentity;

use crate::auth::{IdentityStore, PendingLogin, SessionBootstrap};
use crate::error::AuthError;

/// Authentication state of a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unauthenticated,
    Resolving,
    Authenticated,
}

impl GuardState {
    /// Next state if `to` is reachable from `self`. There is no logout, so
    /// nothing leaves `Authenticated`.
    pub fn advance(self, to: GuardState) -> Option<GuardState> {
        use GuardState::*;
        match (self, to) {
            (Unauthenticated, Resolving) | (Unauthenticated, Authenticated) | (Resolving, Authenticated) => Some(to),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum GuardOutcome {
    /// Render the route for this identity
    Proceed(StoredIdentity),
    /// Nothing renders; the user agent goes to the identity provider
    Redirect(PendingLogin),
}

impl GuardOutcome {
    pub fn state(&self) -> GuardState {
        match self {
            GuardOutcome::Proceed(_) => GuardState::Authenticated,
            GuardOutcome::Redirect(_) => GuardState::Resolving,
        }
    }
}

/// Global guard run before any route resolves
pub struct RouteGuard<S> {
    bootstrap: Arc<SessionBootstrap<S>>,
}

impl<S> Clone for RouteGuard<S> {
    fn clone(&self) -> Self {
        Self {
            bootstrap: Arc::clone(&self.bootstrap),
        }
    }
}

impl<S: IdentityStore> RouteGuard<S> {
    pub fn new(bootstrap: Arc<SessionBootstrap<S>>) -> Self {
        Self { bootstrap }
    }

    pub fn bootstrap(&self) -> &Arc<SessionBootstrap<S>> {
        &self.bootstrap
    }

    pub async fn before_each(&self, key: &str, requested_path: &str) -> Result<GuardOutcome, AuthError> {
        if let Some(identity) = self.bootstrap.current(key).await? {
            tracing::debug!("Navigation to {} allowed for {}", requested_path, identity.principal);
            return Ok(GuardOutcome::Proceed(identity));
        }

        let login = self.bootstrap.begin_login(key, requested_path)?;
        tracing::info!("Navigation to {} held until login completes", requested_path);
        Ok(GuardOutcome::Redirect(login))
    }
}
