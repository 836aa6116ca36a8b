//! Live query subscriptions.
//!
//! A [`Subscription`] wraps one store registration and guarantees:
//!
//! - every delivery is a full, ordered result set;
//! - a snapshot older than one already delivered is dropped;
//! - nothing is delivered once the subscription is cancelled, even if the
//!   store still has callbacks in flight;
//! - at most one subscription per collection is active; a new one cancels
//!   its predecessor before registering;
//! - every session change cancels every subscription, before any later
//!   session listener runs;
//! - after the network layer is reinitialized, active queries are
//!   re-registered; a query keeps its old registration until the new one
//!   is in place.
//!
//! [`SnapshotStream`] exposes the same deliveries as a `futures` stream that
//! ends when the subscription is cancelled.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;
use tienda_core::SnapshotSequencer;
use tienda_types::{Document, QuerySpec, Snapshot, SubscriptionToken};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::handle::CancelHandle;
use crate::lock;
use crate::session::SessionStateMachine;
use crate::store::{DocumentStore, SnapshotSink, StoreError};
use crate::supervisor::RecoveryHook;

/// Live query errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveQueryError {
    /// The store refused the registration.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The session changed while the query was being registered.
    #[error("session changed while subscribing")]
    SessionChanged,
}

type Deliver = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

struct SubscriptionCell {
    token: SubscriptionToken,
    query: QuerySpec,
    epoch: u64,
    active: AtomicBool,
    deliver: Mutex<Option<Deliver>>,
    sequencer: Mutex<SnapshotSequencer>,
    registration: Mutex<Option<CancelHandle>>,
}

impl SubscriptionCell {
    fn on_snapshot(&self, snapshot: Snapshot) {
        if !self.active.load(Ordering::SeqCst) {
            trace!(token = %self.token, commit = snapshot.commit, "dropping delivery after cancel");
            return;
        }
        let Some(deliver) = lock(&self.deliver).clone() else {
            return;
        };

        // Held across the callback so concurrent deliveries stay in commit order.
        let mut sequencer = lock(&self.sequencer);
        if !sequencer.admit(snapshot.commit) {
            debug!(
                token = %self.token,
                commit = snapshot.commit,
                last = ?sequencer.last_commit(),
                "dropping stale snapshot"
            );
            return;
        }
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        deliver(snapshot.documents);
    }

    /// Returns `false` if it was already cancelled.
    fn cancel(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        lock(&self.deliver).take();
        if let Some(registration) = lock(&self.registration).take() {
            registration.cancel();
        }
        true
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn sink(self: &Arc<Self>) -> SnapshotSink {
        let cell = Arc::downgrade(self);
        Arc::new(move |snapshot| {
            if let Some(cell) = cell.upgrade() {
                cell.on_snapshot(snapshot);
            }
        })
    }
}

/// Active subscriptions, keyed by collection.
#[derive(Default)]
struct Registry {
    active: Mutex<HashMap<String, Arc<SubscriptionCell>>>,
}

impl Registry {
    fn replace(&self, cell: Arc<SubscriptionCell>) {
        let mut active = lock(&self.active);
        if let Some(prior) = active.remove(&cell.query.collection) {
            if prior.cancel() {
                debug!(token = %prior.token, query = %prior.query, "cancelled superseded subscription");
            }
        }
        active.insert(cell.query.collection.clone(), cell);
    }

    fn forget(&self, cell: &SubscriptionCell) {
        let mut active = lock(&self.active);
        if active
            .get(&cell.query.collection)
            .is_some_and(|current| current.token == cell.token)
        {
            active.remove(&cell.query.collection);
        }
    }

    fn cancel_all(&self) -> usize {
        let drained: Vec<_> = lock(&self.active).drain().map(|(_, cell)| cell).collect();
        drained.iter().filter(|cell| cell.cancel()).count()
    }

    fn cells(&self) -> Vec<Arc<SubscriptionCell>> {
        lock(&self.active).values().cloned().collect()
    }
}

/// Handle to one live query.
///
/// Dropping the handle cancels the query.
pub struct Subscription {
    cell: Arc<SubscriptionCell>,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Token identifying this registration.
    pub fn token(&self) -> SubscriptionToken {
        self.cell.token
    }

    /// The query being observed.
    pub fn query(&self) -> &QuerySpec {
        &self.cell.query
    }

    /// Session epoch the subscription was opened under.
    pub fn epoch(&self) -> u64 {
        self.cell.epoch
    }

    /// Whether deliveries can still happen.
    pub fn is_active(&self) -> bool {
        self.cell.is_active()
    }

    /// Stop deliveries and release the store registration. Idempotent.
    pub fn cancel(&self) {
        if self.cell.cancel() {
            debug!(token = %self.cell.token, query = %self.cell.query, "subscription cancelled");
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.forget(&self.cell);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("token", &self.cell.token)
            .field("query", &self.cell.query)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Snapshot deliveries as a stream; ends when the subscription is cancelled.
pub struct SnapshotStream {
    receiver: mpsc::UnboundedReceiver<Vec<Document>>,
    subscription: Subscription,
}

impl SnapshotStream {
    /// The underlying subscription.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Stream for SnapshotStream {
    type Item = Vec<Document>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("subscription", &self.subscription)
            .finish()
    }
}

/// Opens live queries and tears them down on session changes.
pub struct LiveQueryManager<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    session: SessionStateMachine,
    registry: Arc<Registry>,
    _session_listener: CancelHandle,
}

impl<S: DocumentStore + ?Sized> LiveQueryManager<S> {
    /// Create a manager and register its session listener.
    ///
    /// Build it before other session dependents so its teardown runs first.
    pub fn new(store: Arc<S>, session: SessionStateMachine) -> Self {
        let registry = Arc::new(Registry::default());
        let weak = Arc::downgrade(&registry);
        let listener = session.subscribe_transitions(move |transition| {
            if let Some(registry) = weak.upgrade() {
                let cancelled = registry.cancel_all();
                if cancelled > 0 {
                    debug!(
                        epoch = transition.epoch,
                        cancelled, "session changed, cancelled live queries"
                    );
                }
            }
        });
        Self {
            store,
            session,
            registry,
            _session_listener: listener,
        }
    }

    /// Open a live query.
    ///
    /// `deliver` receives the full ordered result set, first with the
    /// current contents and then after every change.
    pub async fn subscribe<F>(
        &self,
        query: QuerySpec,
        deliver: F,
    ) -> Result<Subscription, LiveQueryError>
    where
        F: Fn(Vec<Document>) + Send + Sync + 'static,
    {
        let epoch = self.session.epoch();
        let cell = Arc::new(SubscriptionCell {
            token: SubscriptionToken::new(),
            query,
            epoch,
            active: AtomicBool::new(true),
            deliver: Mutex::new(Some(Arc::new(deliver))),
            sequencer: Mutex::new(SnapshotSequencer::new()),
            registration: Mutex::new(None),
        });
        self.registry.replace(Arc::clone(&cell));

        let subscription = Subscription {
            cell: Arc::clone(&cell),
            registry: Arc::downgrade(&self.registry),
        };

        let registration = self.store.subscribe_query(&cell.query, cell.sink()).await?;
        {
            let mut slot = lock(&cell.registration);
            if cell.is_active() {
                *slot = Some(registration);
            } else {
                drop(slot);
                registration.cancel();
            }
        }

        if !cell.is_active() || self.session.epoch() != epoch {
            debug!(token = %cell.token, "session changed during subscribe");
            return Err(LiveQueryError::SessionChanged);
        }

        debug!(token = %cell.token, query = %cell.query, epoch, "subscription opened");
        Ok(subscription)
    }

    /// Open a live query as a stream of result sets.
    pub async fn subscribe_stream(&self, query: QuerySpec) -> Result<SnapshotStream, LiveQueryError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = self
            .subscribe(query, move |documents| {
                // The stream was dropped; the subscription goes with it.
                let _ = sender.send(documents);
            })
            .await?;
        Ok(SnapshotStream {
            receiver,
            subscription,
        })
    }

    /// Re-register every active query with the store.
    ///
    /// Used after the network layer was reinitialized. Snapshots that do not
    /// move past the last delivered commit are suppressed, so subscribers
    /// only hear about real changes. A query the store refuses keeps its
    /// previous registration; the first such error is returned once every
    /// query has been tried.
    pub async fn refresh(&self) -> Result<usize, LiveQueryError> {
        refresh_registry(self.store.as_ref(), &self.registry).await
    }

    /// Cancel every active subscription. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        self.registry.cancel_all()
    }

    /// Number of active subscriptions.
    pub fn active_count(&self) -> usize {
        self.registry
            .cells()
            .iter()
            .filter(|cell| cell.is_active())
            .count()
    }
}

impl<S: DocumentStore + ?Sized + 'static> LiveQueryManager<S> {
    /// A hook that refreshes this manager's queries after each recovery.
    ///
    /// The hook does not keep the manager's subscriptions alive.
    pub fn recovery_hook(&self) -> Arc<dyn RecoveryHook> {
        Arc::new(Refresher {
            store: Arc::clone(&self.store),
            registry: Arc::downgrade(&self.registry),
        })
    }
}

struct Refresher<S: ?Sized> {
    store: Arc<S>,
    registry: Weak<Registry>,
}

#[async_trait]
impl<S: DocumentStore + ?Sized + 'static> RecoveryHook for Refresher<S> {
    async fn on_recovered(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        match refresh_registry(self.store.as_ref(), &registry).await {
            Ok(count) => debug!(count, "live queries re-registered after recovery"),
            Err(error) => warn!(error = %error, "could not re-register every live query"),
        }
    }
}

async fn refresh_registry<S: DocumentStore + ?Sized>(
    store: &S,
    registry: &Registry,
) -> Result<usize, LiveQueryError> {
    let mut refreshed = 0;
    let mut first_error = None;
    for cell in registry.cells() {
        if !cell.is_active() {
            continue;
        }
        let registration = match store.subscribe_query(&cell.query, cell.sink()).await {
            Ok(registration) => registration,
            Err(error) => {
                warn!(
                    token = %cell.token,
                    query = %cell.query,
                    error = %error,
                    "re-registration refused, keeping previous registration"
                );
                first_error.get_or_insert(error);
                continue;
            }
        };

        let mut slot = lock(&cell.registration);
        if !cell.is_active() {
            drop(slot);
            registration.cancel();
            continue;
        }
        let previous = slot.replace(registration);
        drop(slot);
        if let Some(previous) = previous {
            previous.cancel();
        }
        refreshed += 1;
    }
    debug!(refreshed, "live queries refreshed");
    match first_error {
        Some(error) => Err(error.into()),
        None => Ok(refreshed),
    }
}

impl<S: DocumentStore + ?Sized> fmt::Debug for LiveQueryManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveQueryManager")
            .field("active", &self.active_count())
            .finish()
    }
}
