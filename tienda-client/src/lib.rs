//! # tienda-client
//!
//! Session-gated real-time sync engine for the tienda inventory app.
//!
//! ## Components
//!
//! - [`SessionStateMachine`]: observes the identity provider and notifies
//!   dependents synchronously, in registration order, on every identity
//!   transition.
//! - [`ConnectionSupervisor`]: owns connection health, the probe timeout and
//!   the disable/quiesce/enable recovery protocol.
//! - [`ProfileDocumentGuard`]: makes sure a user's profile document exists
//!   before it is read or updated.
//! - [`LiveQueryManager`]: ordered, cancellable live queries that are torn
//!   down on every session change.
//! - [`TiendaClient`]: the facade the presentation layer talks to.
//!
//! Backends plug in through the [`IdentityProvider`], [`DocumentStore`] and
//! [`NetworkControl`] traits; [`MemoryStore`] and [`MockIdentityProvider`] are
//! in-memory implementations for tests and demos.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tienda_client::{ClientConfig, MemoryStore, MockIdentityProvider, TiendaClient};
//!
//! let client = TiendaClient::new(
//!     ClientConfig::default(),
//!     Arc::new(MockIdentityProvider::new()),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! if client.establish_connection().await {
//!     let subscription = client
//!         .subscribe_inventory(|products| println!("{} products", products.len()))
//!         .await?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod guard;
pub mod handle;
pub mod identity;
pub mod live_query;
pub mod session;
pub mod store;
pub mod supervisor;

pub use client::{ClientError, TiendaClient};
pub use config::{ClientConfig, ConfigError};
pub use guard::{GuardError, ProfileDocumentGuard};
pub use handle::CancelHandle;
pub use identity::{AuthError, IdentityProvider, MockIdentityProvider, SessionCallback};
pub use live_query::{LiveQueryError, LiveQueryManager, SnapshotStream, Subscription};
pub use session::SessionStateMachine;
pub use store::{
    CreateOutcome, DocumentStore, MemoryStore, NetworkCall, NetworkControl, SnapshotSink,
    StoreError,
};
pub use supervisor::{
    ConnectionSupervisor, ConnectivityError, EstablishOutcome, ReconnectStep, SupervisorConfig,
};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
