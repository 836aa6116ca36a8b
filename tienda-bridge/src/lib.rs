//! # tienda-bridge
//!
//! Presentation-facing bridge for the tienda sync engine.
//!
//! This crate pins `TiendaClient` to trait-object backends in
//! [`TiendaHandle`] and exposes flat, owned types that a UI binding can wrap
//! directly.
//!
//! ## Design
//!
//! - No generics or lifetimes on the public surface
//! - `String` in, view structs out
//! - Errors flatten to strings, each with a user-facing Spanish message
//! - Thin wrappers; all real logic lives in tienda-client and tienda-core

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod handle;
pub mod types;

pub use error::BridgeError;
pub use handle::{Backend, InventorySubscription, TiendaHandle};
pub use types::{ConnectionStatusView, ProductView, ProfileView, SessionView};
