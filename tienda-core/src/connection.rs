//! Connection health state machine.
//!
//! A pure, side-effect-free state machine for the store connection. It takes
//! events as input and produces a new state plus a list of actions. The
//! probing, network toggling and timers are performed by the
//! `ConnectionSupervisor` in tienda-client, not by this module.
//!
//! ```text
//! Checking ──establish──▶ Connecting ──probe ok──▶ Connected
//!                             │                       │
//!                        probe failed          probe failed
//!                             ▼                       ▼
//!                           Failed ◀──reconnect── Degraded
//!                             │       failed          │
//!                             └──────reconnect────────┘
//!                                  ▼ Connecting
//! ```
//!
//! No state is terminal.

use std::fmt;

/// Health of the store connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Initial state; nothing has been probed yet.
    #[default]
    Checking,
    /// An establishment or recovery attempt is in flight.
    Connecting,
    /// The last probe or recovery succeeded.
    Connected,
    /// Was connected, but a later probe failed.
    Degraded,
    /// The last establishment attempt failed.
    Failed,
}

impl ConnectionState {
    /// Create a new state machine in the `Checking` state.
    pub fn new() -> Self {
        Self::Checking
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function. The caller is responsible for executing the
    /// returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Establishment
            (Self::Checking | Self::Failed | Self::Degraded, Event::EstablishRequested) => {
                (Self::Connecting, vec![Action::ClearError])
            }
            (state @ (Self::Connecting | Self::Connected), Event::EstablishRequested) => {
                (state, vec![])
            }

            // Probe results
            (Self::Connected, Event::ProbeSucceeded) => (Self::Connected, vec![]),
            (_, Event::ProbeSucceeded) => (
                Self::Connected,
                vec![
                    Action::ClearError,
                    Action::EmitEvent(ConnectionEvent::Connected),
                ],
            ),
            (Self::Connected, Event::ProbeFailed { error })
            | (Self::Connected, Event::HealthCheckFailed { error }) => (
                Self::Degraded,
                vec![
                    Action::RecordError(error.clone()),
                    Action::EmitEvent(ConnectionEvent::ConnectionLost { error }),
                ],
            ),
            (_, Event::ProbeFailed { error }) => (
                Self::Failed,
                vec![
                    Action::RecordError(error.clone()),
                    Action::EmitEvent(ConnectionEvent::ConnectionFailed { error }),
                ],
            ),

            // Recovery protocol
            (_, Event::ReconnectStarted) => (
                Self::Connecting,
                vec![Action::EmitEvent(ConnectionEvent::Reconnecting)],
            ),
            (_, Event::ReconnectSucceeded) => (
                Self::Connected,
                vec![
                    Action::ClearError,
                    Action::EmitEvent(ConnectionEvent::Reconnected),
                ],
            ),
            (_, Event::ReconnectFailed { error }) => (
                Self::Failed,
                vec![
                    Action::RecordError(error.clone()),
                    Action::EmitEvent(ConnectionEvent::ConnectionFailed { error }),
                ],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if an attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Whether the UI should offer a retry action.
    pub fn needs_retry(&self) -> bool {
        matches!(self, Self::Failed | Self::Degraded)
    }

    /// Lowercase label used in logs and by the presentation layer.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A dependent asked for a usable connection.
    EstablishRequested,
    /// The health probe settled before its deadline.
    ProbeSucceeded,
    /// The health probe rejected or missed its deadline.
    ProbeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// A background health check failed.
    HealthCheckFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The disable/quiesce/enable protocol started.
    ReconnectStarted,
    /// The recovery protocol completed every step.
    ReconnectSucceeded,
    /// A recovery step rejected.
    ReconnectFailed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Actions to be executed by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Forget the last surfaced error.
    ClearError,
    /// Remember an error for UI display.
    RecordError(String),
    /// Emit an event to observers.
    EmitEvent(ConnectionEvent),
}

/// Events emitted to observers of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection became usable.
    Connected,
    /// A previously healthy connection stopped answering probes.
    ConnectionLost {
        /// Error message describing the failure.
        error: String,
    },
    /// An establishment or recovery attempt failed.
    ConnectionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The recovery protocol started.
    Reconnecting,
    /// The recovery protocol completed.
    Reconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(error: &str) -> Event {
        Event::ProbeFailed {
            error: error.into(),
        }
    }

    #[test]
    fn starts_checking() {
        assert_eq!(ConnectionState::new(), ConnectionState::Checking);
        assert_eq!(ConnectionState::default(), ConnectionState::Checking);
    }

    #[test]
    fn establish_moves_checking_to_connecting() {
        let (state, actions) = ConnectionState::Checking.on_event(Event::EstablishRequested);
        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!(actions, vec![Action::ClearError]);
    }

    #[test]
    fn establish_keeps_connected() {
        let (state, actions) = ConnectionState::Connected.on_event(Event::EstablishRequested);
        assert_eq!(state, ConnectionState::Connected);
        assert!(actions.is_empty());
    }

    #[test]
    fn probe_success_connects_and_emits() {
        let (state, actions) = ConnectionState::Connecting.on_event(Event::ProbeSucceeded);
        assert_eq!(state, ConnectionState::Connected);
        assert!(actions.contains(&Action::EmitEvent(ConnectionEvent::Connected)));
    }

    #[test]
    fn probe_success_while_connected_is_quiet() {
        let (state, actions) = ConnectionState::Connected.on_event(Event::ProbeSucceeded);
        assert_eq!(state, ConnectionState::Connected);
        assert!(actions.is_empty());
    }

    #[test]
    fn probe_failure_from_connecting_fails() {
        let (state, actions) = ConnectionState::Connecting.on_event(failed("timeout"));
        assert_eq!(state, ConnectionState::Failed);
        assert!(actions.contains(&Action::RecordError("timeout".into())));
    }

    #[test]
    fn probe_failure_from_checking_fails() {
        let (state, _) = ConnectionState::Checking.on_event(failed("down"));
        assert_eq!(state, ConnectionState::Failed);
    }

    #[test]
    fn probe_failure_from_connected_degrades() {
        let (state, actions) = ConnectionState::Connected.on_event(failed("down"));
        assert_eq!(state, ConnectionState::Degraded);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::EmitEvent(ConnectionEvent::ConnectionLost { .. })
        )));
    }

    #[test]
    fn health_check_failure_only_affects_connected() {
        let event = Event::HealthCheckFailed {
            error: "down".into(),
        };
        let (state, _) = ConnectionState::Connected.on_event(event.clone());
        assert_eq!(state, ConnectionState::Degraded);

        let (state, actions) = ConnectionState::Failed.on_event(event);
        assert_eq!(state, ConnectionState::Failed);
        assert!(actions.is_empty());
    }

    #[test]
    fn degraded_recovers_through_connecting() {
        let state = ConnectionState::Degraded;

        let (state, _) = state.on_event(Event::ReconnectStarted);
        assert_eq!(state, ConnectionState::Connecting);

        let (state, actions) = state.on_event(Event::ReconnectSucceeded);
        assert_eq!(state, ConnectionState::Connected);
        assert!(actions.contains(&Action::EmitEvent(ConnectionEvent::Reconnected)));
    }

    #[test]
    fn failed_retry_flow() {
        // Failed -> establish -> probe fails -> reconnect fails -> Failed
        let (state, _) = ConnectionState::Failed.on_event(Event::EstablishRequested);
        assert_eq!(state, ConnectionState::Connecting);

        let (state, _) = state.on_event(failed("timeout"));
        assert_eq!(state, ConnectionState::Failed);

        let (state, _) = state.on_event(Event::ReconnectStarted);
        assert_eq!(state, ConnectionState::Connecting);

        let (state, actions) = state.on_event(Event::ReconnectFailed {
            error: "enable rejected".into(),
        });
        assert_eq!(state, ConnectionState::Failed);
        assert!(actions.contains(&Action::RecordError("enable rejected".into())));
    }

    #[test]
    fn helpers() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Degraded.is_connected());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(ConnectionState::Failed.needs_retry());
        assert!(ConnectionState::Degraded.needs_retry());
        assert!(!ConnectionState::Checking.needs_retry());
        assert_eq!(ConnectionState::Degraded.to_string(), "degraded");
    }
}
