//! Session state machine.
//!
//! Turns identity provider reports into identity transitions and fans them
//! out to dependents. Dispatch is synchronous and follows registration
//! order, so by the time the provider callback returns every dependent has
//! seen the new identity. Anything that registered first (the live query
//! manager does) finishes its teardown before later listeners run.
//!
//! Listeners must not feed reports back into the machine from inside a
//! callback.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tienda_core::{SessionTracker, SessionTransition};
use tienda_types::{Identity, Session, SessionState};
use tracing::{debug, info};

use crate::handle::CancelHandle;
use crate::identity::IdentityProvider;
use crate::lock;

type TransitionListener = Arc<dyn Fn(&SessionTransition) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    active: Arc<AtomicBool>,
    callback: TransitionListener,
}

#[derive(Default)]
struct SessionInner {
    tracker: Mutex<SessionTracker>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_listener: AtomicU64,
    dispatch: Mutex<()>,
    provider: Mutex<Option<CancelHandle>>,
}

/// Current identity plus ordered change notification.
///
/// Cloning yields another handle to the same machine.
#[derive(Clone, Default)]
pub struct SessionStateMachine {
    inner: Arc<SessionInner>,
}

impl SessionStateMachine {
    /// A machine in the `Unknown` state with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start observing `provider`, replacing any previous attachment.
    ///
    /// Providers that have already resolved report synchronously, so the
    /// machine may leave `Unknown` before this returns.
    pub fn attach<P>(&self, provider: &P)
    where
        P: IdentityProvider + ?Sized,
    {
        let machine = Arc::downgrade(&self.inner);
        let handle = provider.on_session_change(Arc::new(move |session| {
            if let Some(inner) = machine.upgrade() {
                SessionStateMachine { inner }.apply(session);
            }
        }));
        if let Some(previous) = lock(&self.inner.provider).replace(handle) {
            previous.cancel();
        }
    }

    /// Stop observing the attached provider.
    pub fn detach(&self) {
        if let Some(handle) = lock(&self.inner.provider).take() {
            handle.cancel();
        }
    }

    /// Feed one provider report.
    ///
    /// Returns the transition when the identity changed; identical re-reports
    /// are swallowed and notify nobody.
    pub fn apply(&self, session: Session) -> Option<SessionTransition> {
        let _dispatch = lock(&self.inner.dispatch);

        let transition = lock(&self.inner.tracker).observe(session)?;
        info!(
            epoch = transition.epoch,
            authenticated = transition.current.is_authenticated(),
            "session changed"
        );

        let listeners: Vec<(Arc<AtomicBool>, TransitionListener)> = lock(&self.inner.listeners)
            .iter()
            .map(|entry| (Arc::clone(&entry.active), Arc::clone(&entry.callback)))
            .collect();
        for (active, callback) in listeners {
            if active.load(Ordering::SeqCst) {
                callback(&transition);
            }
        }
        debug!(epoch = transition.epoch, "session listeners notified");

        Some(transition)
    }

    /// Register for the new session on every transition.
    ///
    /// Nothing is replayed on registration; read [`current`](Self::current)
    /// for the state as of now.
    pub fn subscribe<F>(&self, listener: F) -> CancelHandle
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.subscribe_transitions(move |transition| listener(&transition.current))
    }

    /// Register for full transition records (epoch and previous state).
    pub fn subscribe_transitions<F>(&self, listener: F) -> CancelHandle
    where
        F: Fn(&SessionTransition) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        let active = Arc::new(AtomicBool::new(true));
        lock(&self.inner.listeners).push(ListenerEntry {
            id,
            active: Arc::clone(&active),
            callback: Arc::new(listener),
        });

        let inner = Arc::downgrade(&self.inner);
        CancelHandle::new(move || {
            active.store(false, Ordering::SeqCst);
            if let Some(inner) = inner.upgrade() {
                lock(&inner.listeners).retain(|entry| entry.id != id);
            }
        })
    }

    /// The current session state.
    pub fn current(&self) -> SessionState {
        lock(&self.inner.tracker).state().clone()
    }

    /// The signed-in identity, if any.
    pub fn identity(&self) -> Option<Identity> {
        lock(&self.inner.tracker)
            .state()
            .session()
            .and_then(Session::identity)
            .cloned()
    }

    /// Number of identity transitions observed so far.
    pub fn epoch(&self) -> u64 {
        lock(&self.inner.tracker).epoch()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }
}

impl std::fmt::Debug for SessionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStateMachine")
            .field("state", &self.current())
            .field("epoch", &self.epoch())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MockIdentityProvider;
    use tienda_types::Credentials;

    fn ana() -> Session {
        Session::authenticated(Identity::new("uid-ana", "ana@tienda.mx"))
    }

    fn luis() -> Session {
        Session::authenticated(Identity::new("uid-luis", "luis@tienda.mx"))
    }

    fn recorder(machine: &SessionStateMachine) -> (CancelHandle, Arc<Mutex<Vec<Session>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let handle = machine.subscribe(move |session| s.lock().unwrap().push(session.clone()));
        (handle, seen)
    }

    // ===========================================
    // Resolution
    // ===========================================

    #[test]
    fn starts_unknown() {
        let machine = SessionStateMachine::new();
        assert_eq!(machine.current(), SessionState::Unknown);
        assert_eq!(machine.epoch(), 0);
        assert!(machine.identity().is_none());
    }

    #[test]
    fn apply_resolves_and_notifies() {
        let machine = SessionStateMachine::new();
        let (_handle, seen) = recorder(&machine);

        let transition = machine.apply(ana()).unwrap();

        assert!(transition.is_initial());
        assert_eq!(machine.current(), SessionState::Resolved(ana()));
        assert_eq!(machine.identity().unwrap().email, "ana@tienda.mx");
        assert_eq!(*seen.lock().unwrap(), vec![ana()]);
    }

    #[test]
    fn identical_reports_do_not_notify() {
        let machine = SessionStateMachine::new();
        let (_handle, seen) = recorder(&machine);

        machine.apply(ana());
        assert!(machine.apply(ana()).is_none());

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(machine.epoch(), 1);
    }

    #[test]
    fn subscribe_does_not_replay() {
        let machine = SessionStateMachine::new();
        machine.apply(ana());
        let (_handle, seen) = recorder(&machine);
        assert!(seen.lock().unwrap().is_empty());
    }

    // ===========================================
    // Ordering and Cancellation
    // ===========================================

    #[test]
    fn listeners_run_in_registration_order() {
        let machine = SessionStateMachine::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                machine.subscribe(move |_| order.lock().unwrap().push(i))
            })
            .collect();

        machine.apply(ana());
        machine.apply(luis());

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 0, 1, 2]);
        drop(handles);
    }

    #[test]
    fn cancelled_listener_is_not_invoked() {
        let machine = SessionStateMachine::new();
        let (handle, seen) = recorder(&machine);
        machine.apply(ana());

        handle.cancel();
        machine.apply(luis());

        assert_eq!(*seen.lock().unwrap(), vec![ana()]);
        assert_eq!(machine.listener_count(), 0);
    }

    #[test]
    fn listener_cancelled_mid_dispatch_is_skipped() {
        let machine = SessionStateMachine::new();
        let late: Arc<Mutex<Option<CancelHandle>>> = Arc::new(Mutex::new(None));
        let late_calls = Arc::new(AtomicU64::new(0));

        let slot = Arc::clone(&late);
        let _first = machine.subscribe(move |_| {
            if let Some(handle) = slot.lock().unwrap().take() {
                handle.cancel();
            }
        });
        let calls = Arc::clone(&late_calls);
        *late.lock().unwrap() = Some(machine.subscribe(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        }));

        machine.apply(ana());

        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn transition_listeners_see_epochs() {
        let machine = SessionStateMachine::new();
        let epochs = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&epochs);
        let _handle = machine.subscribe_transitions(move |t| e.lock().unwrap().push(t.epoch));

        machine.apply(Session::unauthenticated());
        machine.apply(ana());
        machine.apply(Session::unauthenticated());

        assert_eq!(*epochs.lock().unwrap(), vec![1, 2, 3]);
    }

    // ===========================================
    // Provider Attachment
    // ===========================================

    #[tokio::test]
    async fn attach_follows_provider() {
        let provider = MockIdentityProvider::new().with_account("ana@tienda.mx", "secreto1");
        let machine = SessionStateMachine::new();
        machine.attach(&provider);
        assert_eq!(
            machine.current(),
            SessionState::Resolved(Session::unauthenticated())
        );

        provider
            .sign_in(&Credentials::new("ana@tienda.mx", "secreto1"))
            .await
            .unwrap();
        assert!(machine.current().is_authenticated());

        provider.sign_out().await.unwrap();
        assert!(!machine.current().is_authenticated());
        assert_eq!(machine.epoch(), 3);
    }

    #[test]
    fn attach_to_unresolved_provider_stays_unknown() {
        let provider = MockIdentityProvider::unresolved();
        let machine = SessionStateMachine::new();
        machine.attach(&provider);
        assert_eq!(machine.current(), SessionState::Unknown);

        provider.resolve(ana());
        assert_eq!(machine.current(), SessionState::Resolved(ana()));
    }

    #[test]
    fn detach_stops_following() {
        let provider = MockIdentityProvider::new();
        let machine = SessionStateMachine::new();
        machine.attach(&provider);
        machine.detach();

        provider.set_session(ana());

        assert!(!machine.current().is_authenticated());
        assert_eq!(provider.listener_count(), 0);
    }
}
