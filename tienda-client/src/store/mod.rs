//! Document store abstraction.
//!
//! The sync engine talks to its backend through two traits:
//!
//! - [`DocumentStore`]: document CRUD plus live query registration.
//! - [`NetworkControl`]: the health probe and the network toggles used by the
//!   recovery protocol. Only the connection supervisor holds this one.
//!
//! A real backend usually implements both on the same type. [`MemoryStore`]
//! is the in-memory implementation used by tests and the CLI demo.

mod memory;

pub use memory::{MemoryStore, NetworkCall};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tienda_types::{Document, DocumentId, Fields, QuerySpec, Snapshot};

use crate::handle::CancelHandle;

/// Document store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The document does not exist.
    #[error("document {collection}/{id} not found")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Document id.
        id: DocumentId,
    },

    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the operation.
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// The backend does not implement this operation.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Result of an atomic create-if-absent.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// The document was written by this call.
    Created,
    /// Someone else got there first; this is what is stored.
    AlreadyExists(Document),
}

/// Receives every snapshot a live query produces.
///
/// May be called from any thread, including synchronously from inside
/// [`DocumentStore::subscribe_query`] for the initial result set.
pub type SnapshotSink = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Persistent document storage with live queries.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document. `Ok(None)` when it does not exist.
    async fn get_document(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError>;

    /// Create or overwrite a document.
    async fn set_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Merge fields into an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] when the document is missing.
    async fn update_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Insert a document under a store-generated id.
    async fn add_document(&self, collection: &str, fields: Fields)
        -> Result<DocumentId, StoreError>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, id: &DocumentId) -> Result<(), StoreError>;

    /// Write the document only if nothing is stored under `id`, atomically.
    ///
    /// Backends without transactional creates keep the default, which
    /// reports [`StoreError::Unsupported`].
    async fn create_if_absent(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<CreateOutcome, StoreError> {
        let _ = (collection, id, fields);
        Err(StoreError::Unsupported("create_if_absent"))
    }

    /// Register a live query.
    ///
    /// The sink receives the full ordered result set on registration and
    /// after every change. Snapshots carry a commit version that increases
    /// with every write. Dropping or cancelling the returned handle
    /// unregisters the query; deliveries already in flight may still arrive.
    async fn subscribe_query(
        &self,
        query: &QuerySpec,
        sink: SnapshotSink,
    ) -> Result<CancelHandle, StoreError>;
}

/// Connection health and network toggles.
#[async_trait]
pub trait NetworkControl: Send + Sync {
    /// One lightweight read against the backend.
    ///
    /// May never resolve when the transport is wedged; callers bound it with
    /// a timeout.
    async fn probe(&self) -> Result<(), StoreError>;

    /// Take the store's network layer offline.
    async fn disable_network(&self) -> Result<(), StoreError>;

    /// Bring the store's network layer back online.
    async fn enable_network(&self) -> Result<(), StoreError>;
}
