//! Identity provider abstraction.
//!
//! The provider owns credentials and reports the signed-in identity through
//! a callback. [`SessionStateMachine`](crate::SessionStateMachine) is the only
//! component that registers with it directly.

mod mock;

pub use mock::MockIdentityProvider;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tienda_types::{AuthErrorCode, Credentials, Session};

use crate::handle::CancelHandle;

/// Authentication failure reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("authentication failed: {code}")]
pub struct AuthError {
    /// Provider error code.
    pub code: AuthErrorCode,
}

impl AuthError {
    /// Wrap a provider error code.
    pub fn new(code: AuthErrorCode) -> Self {
        Self { code }
    }
}

impl From<AuthErrorCode> for AuthError {
    fn from(code: AuthErrorCode) -> Self {
        Self::new(code)
    }
}

/// Callback invoked with every session the provider reports.
pub type SessionCallback = Arc<dyn Fn(Session) + Send + Sync>;

/// Authentication backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in with email and password.
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Create an account and sign it in.
    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Register for session reports.
    ///
    /// Once the provider has resolved the initial session it reports it to
    /// the new listener, then reports every change after that.
    fn on_session_change(&self, callback: SessionCallback) -> CancelHandle;
}
