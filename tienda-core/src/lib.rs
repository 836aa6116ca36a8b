//! # tienda-core
//!
//! Pure logic for tienda-sync (no I/O, instant tests).
//!
//! This crate holds the state machines and algorithms behind the sync engine
//! without any network access, so every transition is unit-testable
//! without mocks or an async runtime.
//!
//! - [`connection`]: connection health state machine
//! - [`session`]: session resolution and epoch tracking
//! - [`retry`]: manual-retry policy with jittered exponential backoff
//! - [`order`]: query ordering of documents
//! - [`sequencer`]: stale-snapshot suppression
//!
//! The async engine in `tienda-client` drives these machines and performs
//! the actual I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod order;
pub mod retry;
pub mod sequencer;
pub mod session;

pub use connection::{Action, ConnectionEvent, ConnectionState, Event};
pub use order::{compare_values, order_documents};
pub use retry::{Backoff, RetryDecision, RetryPolicy};
pub use sequencer::SnapshotSequencer;
pub use session::{SessionTracker, SessionTransition};
