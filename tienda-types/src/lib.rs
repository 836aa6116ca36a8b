//! # tienda-types
//!
//! Domain types shared by every tienda-sync crate.
//!
//! - [`UserId`], [`DocumentId`], [`SubscriptionToken`] - identity types
//! - [`Session`], [`SessionState`] - authentication snapshots
//! - [`Document`], [`QuerySpec`], [`Snapshot`] - document store payloads
//! - [`ProfileDocument`], [`Product`] - the two record shapes the app stores
//! - [`ValidationError`], [`AuthErrorCode`] - caller-side and provider errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod account;
mod document;
mod error;
mod ids;
mod product;
mod profile;
mod session;

pub use account::{Credentials, Registration, MIN_PASSWORD_LEN};
pub use document::{Document, Fields, OrderDirection, QuerySpec, Snapshot};
pub use error::{AuthErrorCode, ValidationError};
pub use ids::{DocumentId, SubscriptionToken, UserId};
pub use product::{NewProduct, Product};
pub use profile::{validate_graduation_year, ProfileDocument, ProfileUpdate};
pub use session::{Identity, Session, SessionState};

/// Current time as an RFC 3339 string with millisecond precision.
///
/// This is the timestamp format written into `createdAt` / `updatedAt`.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
