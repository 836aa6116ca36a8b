//! Connection supervisor.
//!
//! Drives the pure [`ConnectionState`] machine from tienda-core and performs
//! the I/O it implies: bounded health probes and the recovery protocol
//! (disable network, wait for quiescence, enable network).
//!
//! ```text
//! establish ─▶ probe (≤ probe_timeout) ─ok─▶ Connected
//!                     │
//!                   failed / timed out
//!                     ▼
//!              recovery gate ─▶ disable ─▶ sleep(quiescence) ─▶ enable
//!                                   │                              │
//!                                 error ─────────▶ Failed ◀─── error
//! ```
//!
//! State is published on a `watch` channel; transitions of interest are
//! also broadcast as [`ConnectionEvent`]s. Recovery runs are serialized, so
//! two callers never interleave network toggles. Every completed recovery
//! runs the registered [`RecoveryHook`]s, whichever caller started it.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tienda_core::{Action, ConnectionEvent, ConnectionState, Event, RetryDecision, RetryPolicy};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::lock;
use crate::store::NetworkControl;

const EVENT_CAPACITY: usize = 64;

/// Which step of the recovery protocol failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStep {
    /// Taking the network offline.
    Disable,
    /// Bringing the network back.
    Enable,
}

impl fmt::Display for ReconnectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disable => f.write_str("disabling network"),
            Self::Enable => f.write_str("enabling network"),
        }
    }
}

/// Connectivity failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectivityError {
    /// The health probe did not settle before its deadline.
    #[error("health probe timed out after {0:?}")]
    Timeout(Duration),

    /// The health probe was rejected.
    #[error("health probe failed: {0}")]
    Failure(String),

    /// A recovery step was rejected.
    #[error("reconnect failed while {step}: {reason}")]
    ReconnectFailed {
        /// The failing step.
        step: ReconnectStep,
        /// Backend error message.
        reason: String,
    },

    /// The retry policy allows no further attempts.
    #[error("retry limit reached after {failures} consecutive failures")]
    RetriesExhausted {
        /// Consecutive failures so far.
        failures: u32,
    },
}

/// Work that must follow a completed recovery, such as re-registering
/// live queries with the freshly enabled network layer.
#[async_trait]
pub trait RecoveryHook: Send + Sync {
    /// Called after disable, quiescence and enable all succeeded.
    async fn on_recovered(&self);
}

/// Supervisor timing and retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Upper bound on one health probe.
    pub probe_timeout: Duration,
    /// Pause between disabling and re-enabling the network.
    pub quiescence: Duration,
    /// Policy for [`ConnectionSupervisor::retry`].
    pub retry: RetryPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
            quiescence: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of an establishment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstablishOutcome {
    /// The probe succeeded.
    Connected,
    /// The probe failed but the recovery protocol completed.
    Recovered,
    /// Neither the probe nor recovery worked.
    Failed(ConnectivityError),
}

impl EstablishOutcome {
    /// Whether the connection is usable afterwards.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&ConnectivityError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Owns connection health for one store.
pub struct ConnectionSupervisor<N: NetworkControl + ?Sized> {
    network: Arc<N>,
    config: SupervisorConfig,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    last_error: Mutex<Option<String>>,
    recovery: tokio::sync::Mutex<()>,
    hooks: Mutex<Vec<Arc<dyn RecoveryHook>>>,
    failures: AtomicU32,
}

impl<N: NetworkControl + ?Sized> ConnectionSupervisor<N> {
    /// Create a supervisor in the `Checking` state.
    pub fn new(network: Arc<N>, config: SupervisorConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::new());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            network,
            config,
            state,
            events,
            last_error: Mutex::new(None),
            recovery: tokio::sync::Mutex::new(()),
            hooks: Mutex::new(Vec::new()),
            failures: AtomicU32::new(0),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch the connection state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Receive connection events from now on.
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// The most recent human-readable failure, cleared on success.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Consecutive failed establishment attempts.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// The settings in use.
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run `hook` after every completed recovery, in registration order.
    pub fn add_recovery_hook(&self, hook: Arc<dyn RecoveryHook>) {
        lock(&self.hooks).push(hook);
    }

    /// Probe once, bounded by the probe timeout.
    ///
    /// Returns `true` iff the probe settled successfully before the deadline.
    /// A failure while connected marks the connection degraded.
    pub async fn check_connection(&self) -> bool {
        match self.probe().await {
            Ok(()) => {
                self.apply(Event::ProbeSucceeded);
                true
            }
            Err(error) => {
                self.apply(Event::ProbeFailed {
                    error: error.to_string(),
                });
                false
            }
        }
    }

    /// Run the recovery protocol once.
    ///
    /// Returns `true` iff disable, the quiescence delay and enable all
    /// completed.
    pub async fn reinitialize_connection(&self) -> bool {
        self.reinitialize().await.is_ok()
    }

    /// Probe, and fall back to the recovery protocol if the probe fails.
    pub async fn establish(&self) -> EstablishOutcome {
        self.apply(Event::EstablishRequested);

        let outcome = match self.probe().await {
            Ok(()) => {
                self.apply(Event::ProbeSucceeded);
                EstablishOutcome::Connected
            }
            Err(probe_error) => {
                info!(error = %probe_error, "probe failed, reinitializing connection");
                if self.state().is_connected() {
                    self.apply(Event::ProbeFailed {
                        error: probe_error.to_string(),
                    });
                }
                match self.reinitialize().await {
                    Ok(()) => EstablishOutcome::Recovered,
                    Err(error) => EstablishOutcome::Failed(error),
                }
            }
        };

        match &outcome {
            EstablishOutcome::Failed(error) => {
                let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(error = %error, failures, "could not establish connection");
            }
            _ => {
                self.failures.store(0, Ordering::SeqCst);
                debug!(state = %self.state(), "connection established");
            }
        }
        outcome
    }

    /// [`establish`](Self::establish), reduced to whether it worked.
    pub async fn establish_connection(&self) -> bool {
        self.establish().await.is_connected()
    }

    /// A user-initiated retry, subject to the retry policy.
    ///
    /// When the policy gives up, nothing touches the network and the state
    /// is left as is.
    pub async fn retry(&self) -> EstablishOutcome {
        let failures = self.consecutive_failures();
        match self.config.retry.decide(failures) {
            RetryDecision::GiveUp { failures } => {
                let error = ConnectivityError::RetriesExhausted { failures };
                warn!(failures, "retry limit reached");
                *lock(&self.last_error) = Some(error.to_string());
                EstablishOutcome::Failed(error)
            }
            RetryDecision::Proceed { delay } => {
                if !delay.is_zero() {
                    debug!(delay_ms = delay.as_millis() as u64, "backing off before retry");
                    tokio::time::sleep(delay).await;
                }
                self.establish().await
            }
        }
    }

    /// [`retry`](Self::retry), reduced to whether it worked.
    pub async fn retry_connection(&self) -> bool {
        self.retry().await.is_connected()
    }

    /// Probe only if currently connected; a failure marks the connection
    /// degraded. Returns whether the connection is still healthy.
    pub async fn health_check(&self) -> bool {
        if !self.state().is_connected() {
            return false;
        }
        match self.probe().await {
            Ok(()) => true,
            Err(error) => {
                warn!(error = %error, "health check failed");
                self.apply(Event::HealthCheckFailed {
                    error: error.to_string(),
                });
                false
            }
        }
    }

    async fn probe(&self) -> Result<(), ConnectivityError> {
        let timeout = self.config.probe_timeout;
        debug!(timeout_ms = timeout.as_millis() as u64, "probing connection");
        match tokio::time::timeout(timeout, self.network.probe()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(ConnectivityError::Failure(error.to_string())),
            Err(_) => Err(ConnectivityError::Timeout(timeout)),
        }
    }

    async fn reinitialize(&self) -> Result<(), ConnectivityError> {
        {
            let _gate = self.recovery.lock().await;
            self.apply(Event::ReconnectStarted);

            if let Err(error) = self.run_recovery().await {
                warn!(error = %error, "connection reinitialization failed");
                self.apply(Event::ReconnectFailed {
                    error: error.to_string(),
                });
                return Err(error);
            }
            info!("connection reinitialized");
            self.apply(Event::ReconnectSucceeded);
        }

        let hooks = lock(&self.hooks).clone();
        for hook in hooks {
            hook.on_recovered().await;
        }
        Ok(())
    }

    async fn run_recovery(&self) -> Result<(), ConnectivityError> {
        debug!("disabling network");
        self.network
            .disable_network()
            .await
            .map_err(|e| ConnectivityError::ReconnectFailed {
                step: ReconnectStep::Disable,
                reason: e.to_string(),
            })?;

        tokio::time::sleep(self.config.quiescence).await;

        debug!("enabling network");
        self.network
            .enable_network()
            .await
            .map_err(|e| ConnectivityError::ReconnectFailed {
                step: ReconnectStep::Enable,
                reason: e.to_string(),
            })
    }

    fn apply(&self, event: Event) {
        let mut actions = Vec::new();
        let mut transition = None;
        self.state.send_if_modified(|state| {
            let (next, emitted) = state.on_event(event);
            actions = emitted;
            let changed = next != *state;
            if changed {
                transition = Some((*state, next));
                *state = next;
            }
            changed
        });

        if let Some((from, to)) = transition {
            debug!(from = %from, to = %to, "connection state changed");
        }

        for action in actions {
            match action {
                Action::ClearError => *lock(&self.last_error) = None,
                Action::RecordError(error) => *lock(&self.last_error) = Some(error),
                Action::EmitEvent(event) => {
                    // No receivers is fine.
                    let _ = self.events.send(event);
                }
            }
        }
    }
}

impl<N: NetworkControl + ?Sized + 'static> ConnectionSupervisor<N> {
    /// Probe every `interval` while connected, marking the connection
    /// degraded when a probe fails.
    ///
    /// The task ends once the supervisor is dropped.
    pub fn spawn_health_monitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let supervisor = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(supervisor) = supervisor.upgrade() else {
                    debug!("supervisor dropped, stopping health monitor");
                    break;
                };
                supervisor.health_check().await;
            }
        })
    }
}

impl<N: NetworkControl + ?Sized> fmt::Debug for ConnectionSupervisor<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("failures", &self.consecutive_failures())
            .field("hooks", &lock(&self.hooks).len())
            .finish()
    }
}
