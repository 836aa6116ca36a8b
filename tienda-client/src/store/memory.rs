//! In-memory document store for tests and demos.
//!
//! Every write bumps a global commit counter and re-evaluates the live
//! queries on the written collection. Deliveries happen outside the store
//! lock, either immediately or, in manual dispatch mode, when the test calls
//! [`MemoryStore::dispatch_pending`]. Queued deliveries are still handed to
//! their sink after the query is cancelled, the way an in-flight callback
//! from a real backend would be.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tienda_core::order_documents;
use tienda_types::{Document, DocumentId, Fields, QuerySpec, Snapshot};
use tokio::time::Instant;
use tracing::trace;

use super::{CreateOutcome, DocumentStore, NetworkControl, SnapshotSink, StoreError};
use crate::handle::CancelHandle;
use crate::lock;

/// A network-level call recorded by [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCall {
    /// `probe()`
    Probe,
    /// `disable_network()`
    Disable,
    /// `enable_network()`
    Enable,
}

/// In-memory [`DocumentStore`] + [`NetworkControl`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

struct QueryEntry {
    query: QuerySpec,
    sink: SnapshotSink,
}

#[derive(Default)]
struct MemoryStoreInner {
    collections: HashMap<String, BTreeMap<DocumentId, Fields>>,
    commit: u64,
    queries: HashMap<u64, QueryEntry>,
    next_query_id: u64,
    network_disabled: bool,
    network_log: Vec<(NetworkCall, Instant)>,
    probe_error: Option<String>,
    fail_next_probe: Option<String>,
    hang_probes: bool,
    probe_delay: Option<Duration>,
    fail_next_disable: Option<String>,
    fail_next_enable: Option<String>,
    fail_next_write: Option<String>,
    fail_next_subscribe: Option<String>,
    subscribe_calls: usize,
    atomic_create: bool,
    manual_dispatch: bool,
    pending: VecDeque<(SnapshotSink, Snapshot)>,
    writes: HashMap<String, usize>,
}

impl MemoryStore {
    /// Create an empty store with atomic creates enabled.
    pub fn new() -> Self {
        let store = Self::default();
        lock(&store.inner).atomic_create = true;
        store
    }

    /// A store whose backend lacks `create_if_absent`.
    pub fn without_atomic_create() -> Self {
        Self::default()
    }

    /// Hold snapshot deliveries until [`dispatch_pending`](Self::dispatch_pending).
    pub fn set_manual_dispatch(&self, manual: bool) {
        lock(&self.inner).manual_dispatch = manual;
    }

    /// Deliver every queued snapshot, oldest first. Returns how many were sent.
    pub fn dispatch_pending(&self) -> usize {
        let pending: Vec<_> = lock(&self.inner).pending.drain(..).collect();
        let count = pending.len();
        for (sink, snapshot) in pending {
            sink(snapshot);
        }
        count
    }

    /// Deliver queued snapshots newest first.
    pub fn dispatch_pending_reversed(&self) -> usize {
        let pending: Vec<_> = lock(&self.inner).pending.drain(..).rev().collect();
        let count = pending.len();
        for (sink, snapshot) in pending {
            sink(snapshot);
        }
        count
    }

    /// Number of deliveries waiting in manual dispatch mode.
    pub fn pending_count(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    /// Cause the next probe to fail with the given error.
    pub fn fail_next_probe(&self, error: &str) {
        lock(&self.inner).fail_next_probe = Some(error.to_string());
    }

    /// Make every probe fail until cleared with `None`.
    pub fn set_probe_error(&self, error: Option<&str>) {
        lock(&self.inner).probe_error = error.map(str::to_string);
    }

    /// Make probes never resolve.
    pub fn hang_probes(&self, hang: bool) {
        lock(&self.inner).hang_probes = hang;
    }

    /// Delay every probe by `delay` before answering.
    pub fn set_probe_delay(&self, delay: Option<Duration>) {
        lock(&self.inner).probe_delay = delay;
    }

    /// Cause the next `disable_network()` to fail.
    pub fn fail_next_disable(&self, error: &str) {
        lock(&self.inner).fail_next_disable = Some(error.to_string());
    }

    /// Cause the next `enable_network()` to fail.
    pub fn fail_next_enable(&self, error: &str) {
        lock(&self.inner).fail_next_enable = Some(error.to_string());
    }

    /// Cause the next document write to be rejected.
    pub fn fail_next_write(&self, error: &str) {
        lock(&self.inner).fail_next_write = Some(error.to_string());
    }

    /// Cause the next `subscribe_query()` to be rejected.
    pub fn fail_next_subscribe(&self, error: &str) {
        lock(&self.inner).fail_next_subscribe = Some(error.to_string());
    }

    /// Total `subscribe_query()` calls, failed ones included.
    pub fn subscribe_count(&self) -> usize {
        lock(&self.inner).subscribe_calls
    }

    /// Network calls in the order they happened, with the (tokio) time of each.
    pub fn network_log(&self) -> Vec<(NetworkCall, Instant)> {
        lock(&self.inner).network_log.clone()
    }

    /// Network calls in order, without timestamps.
    pub fn network_calls(&self) -> Vec<NetworkCall> {
        lock(&self.inner)
            .network_log
            .iter()
            .map(|(call, _)| *call)
            .collect()
    }

    /// Whether the network layer is currently enabled.
    pub fn is_network_enabled(&self) -> bool {
        !lock(&self.inner).network_disabled
    }

    /// Successful writes (set, update, add, delete, create) to a collection.
    pub fn write_count(&self, collection: &str) -> usize {
        lock(&self.inner)
            .writes
            .get(collection)
            .copied()
            .unwrap_or_default()
    }

    /// Number of registered live queries.
    pub fn active_queries(&self) -> usize {
        lock(&self.inner).queries.len()
    }

    /// Latest commit version.
    pub fn commit(&self) -> u64 {
        lock(&self.inner).commit
    }

    /// Documents currently stored in a collection, by id.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        lock(&self.inner)
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Store a document directly, bypassing failure injection.
    pub fn insert(&self, collection: &str, id: impl Into<DocumentId>, fields: Fields) {
        let deliveries = {
            let mut inner = lock(&self.inner);
            inner
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.into(), fields);
            inner.committed(collection)
        };
        self.deliver(deliveries);
    }

    fn write<T>(
        &self,
        collection: &str,
        apply: impl FnOnce(&mut BTreeMap<DocumentId, Fields>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let (value, deliveries) = {
            let mut inner = lock(&self.inner);
            inner.check_online()?;
            if let Some(error) = inner.fail_next_write.take() {
                return Err(StoreError::Rejected(error));
            }
            let docs = inner.collections.entry(collection.to_string()).or_default();
            let value = apply(docs)?;
            *inner.writes.entry(collection.to_string()).or_default() += 1;
            (value, inner.committed(collection))
        };
        self.deliver(deliveries);
        Ok(value)
    }

    fn deliver(&self, deliveries: Vec<(SnapshotSink, Snapshot)>) {
        for (sink, snapshot) in deliveries {
            sink(snapshot);
        }
    }
}

impl MemoryStoreInner {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.network_disabled {
            return Err(StoreError::Unavailable("network disabled".into()));
        }
        Ok(())
    }

    fn snapshot(&self, query: &QuerySpec) -> Snapshot {
        let documents = self
            .collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Snapshot {
            commit: self.commit,
            documents: order_documents(documents, query),
        }
    }

    /// Bump the commit version and return the deliveries due now.
    fn committed(&mut self, collection: &str) -> Vec<(SnapshotSink, Snapshot)> {
        self.commit += 1;
        let due: Vec<_> = self
            .queries
            .values()
            .filter(|entry| entry.query.collection == collection)
            .map(|entry| (Arc::clone(&entry.sink), self.snapshot(&entry.query)))
            .collect();
        trace!(collection, commit = self.commit, queries = due.len(), "commit");
        if self.manual_dispatch {
            self.pending.extend(due);
            Vec::new()
        } else {
            due
        }
    }

    fn record(&mut self, call: NetworkCall) {
        self.network_log.push((call, Instant::now()));
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("MemoryStore")
            .field("collections", &inner.collections.len())
            .field("commit", &inner.commit)
            .field("queries", &inner.queries.len())
            .field("network_disabled", &inner.network_disabled)
            .finish()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let inner = lock(&self.inner);
        inner.check_online()?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id.clone(), fields.clone())))
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.write(collection, |docs| {
            docs.insert(id.clone(), fields);
            Ok(())
        })
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.write(collection, |docs| {
            let existing = docs.get_mut(id).ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.clone(),
            })?;
            existing.extend(fields);
            Ok(())
        })
    }

    async fn add_document(
        &self,
        collection: &str,
        fields: Fields,
    ) -> Result<DocumentId, StoreError> {
        self.write(collection, |docs| {
            let mut id = DocumentId::generate();
            while docs.contains_key(&id) {
                id = DocumentId::generate();
            }
            docs.insert(id.clone(), fields);
            Ok(id)
        })
    }

    async fn delete_document(&self, collection: &str, id: &DocumentId) -> Result<(), StoreError> {
        self.write(collection, |docs| {
            docs.remove(id);
            Ok(())
        })
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<CreateOutcome, StoreError> {
        if !lock(&self.inner).atomic_create {
            return Err(StoreError::Unsupported("create_if_absent"));
        }
        // An existing document short-circuits before any write is counted.
        {
            let inner = lock(&self.inner);
            inner.check_online()?;
            if let Some(existing) = inner.collections.get(collection).and_then(|d| d.get(id)) {
                return Ok(CreateOutcome::AlreadyExists(Document::new(
                    id.clone(),
                    existing.clone(),
                )));
            }
        }
        self.write(collection, |docs| match docs.get(id) {
            Some(existing) => Err(StoreError::Rejected(format!(
                "{collection}/{id} created concurrently ({} fields)",
                existing.len()
            ))),
            None => {
                docs.insert(id.clone(), fields);
                Ok(CreateOutcome::Created)
            }
        })
    }

    async fn subscribe_query(
        &self,
        query: &QuerySpec,
        sink: SnapshotSink,
    ) -> Result<CancelHandle, StoreError> {
        let (query_id, initial) = {
            let mut inner = lock(&self.inner);
            inner.subscribe_calls += 1;
            if let Some(error) = inner.fail_next_subscribe.take() {
                return Err(StoreError::Unavailable(error));
            }
            let query_id = inner.next_query_id;
            inner.next_query_id += 1;
            inner.queries.insert(
                query_id,
                QueryEntry {
                    query: query.clone(),
                    sink: Arc::clone(&sink),
                },
            );
            (query_id, inner.snapshot(query))
        };
        trace!(query = %query, query_id, "live query registered");

        sink(initial);

        let inner = Arc::clone(&self.inner);
        Ok(CancelHandle::new(move || {
            lock(&inner).queries.remove(&query_id);
            trace!(query_id, "live query unregistered");
        }))
    }
}

#[async_trait]
impl NetworkControl for MemoryStore {
    async fn probe(&self) -> Result<(), StoreError> {
        let (hang, delay) = {
            let mut inner = lock(&self.inner);
            inner.record(NetworkCall::Probe);
            (inner.hang_probes, inner.probe_delay)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = lock(&self.inner);
        if let Some(error) = inner.fail_next_probe.take() {
            return Err(StoreError::Unavailable(error));
        }
        if let Some(error) = &inner.probe_error {
            return Err(StoreError::Unavailable(error.clone()));
        }
        inner.check_online()
    }

    async fn disable_network(&self) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner);
        inner.record(NetworkCall::Disable);
        if let Some(error) = inner.fail_next_disable.take() {
            return Err(StoreError::Unavailable(error));
        }
        inner.network_disabled = true;
        Ok(())
    }

    async fn enable_network(&self) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner);
        inner.record(NetworkCall::Enable);
        if let Some(error) = inner.fail_next_enable.take() {
            return Err(StoreError::Unavailable(error));
        }
        inner.network_disabled = false;
        Ok(())
    }
}
