//! Session resolution tracking.
//!
//! Pure bookkeeping behind the `SessionStateMachine`: it decides whether a
//! report from the identity provider is a real identity transition and
//! numbers transitions with a monotonically increasing epoch.

use tienda_types::{Session, SessionState};

/// A change of identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTransition {
    /// Epoch of the new session (1 for the first resolution).
    pub epoch: u64,
    /// State before the transition.
    pub previous: SessionState,
    /// The new session.
    pub current: Session,
}

impl SessionTransition {
    /// Whether this transition is the first resolution out of `Unknown`.
    pub fn is_initial(&self) -> bool {
        !self.previous.is_resolved()
    }

    /// Whether a signed-in user signed out.
    pub fn is_sign_out(&self) -> bool {
        self.previous.is_authenticated() && !self.current.is_authenticated()
    }
}

/// Tracks the latest resolved session and its epoch.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    state: SessionState,
    epoch: u64,
}

impl SessionTracker {
    /// Start in `Unknown` at epoch 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Epoch of the current session (0 while unknown).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Feed a provider report.
    ///
    /// Returns the transition if the identity actually changed; re-reports of
    /// the same session produce nothing.
    pub fn observe(&mut self, session: Session) -> Option<SessionTransition> {
        if let SessionState::Resolved(current) = &self.state {
            if *current == session {
                return None;
            }
        }
        self.epoch += 1;
        let previous = std::mem::replace(&mut self.state, SessionState::Resolved(session.clone()));
        Some(SessionTransition {
            epoch: self.epoch,
            previous,
            current: session,
        })
    }
}
