//! Authentication session snapshots.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// An authenticated identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-issued user id.
    pub user_id: UserId,
    /// Email address the account was registered with.
    pub email: String,
}

impl Identity {
    /// Create a new identity.
    pub fn new(user_id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// Immutable snapshot of the current identity.
///
/// A new `Session` replaces the old one wholesale on every identity change;
/// sessions are never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    identity: Option<Identity>,
}

impl Session {
    /// A session with no signed-in user.
    pub fn unauthenticated() -> Self {
        Self { identity: None }
    }

    /// A session for the given identity.
    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// The signed-in identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The signed-in user id, if any.
    pub fn user_id(&self) -> Option<&UserId> {
        self.identity.as_ref().map(|i| &i.user_id)
    }

    /// The signed-in email, if any.
    pub fn email(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.email.as_str())
    }

    /// Whether a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// What the client knows about the session.
///
/// `Unknown` is held only until the identity provider reports for the first
/// time; afterwards the state is always `Resolved`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// The identity provider has not reported yet.
    #[default]
    Unknown,
    /// The provider has reported at least once.
    Resolved(Session),
}

impl SessionState {
    /// The resolved session, or `None` while still unknown.
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Unknown => None,
            Self::Resolved(session) => Some(session),
        }
    }

    /// Whether the provider has reported yet.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Whether a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.session().is_some_and(Session::is_authenticated)
    }
}
