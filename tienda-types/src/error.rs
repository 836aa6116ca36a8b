//! Caller-side validation errors and identity provider error codes.

use std::fmt;
use thiserror::Error;

/// Input rejected before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field was present but malformed.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Password shorter than the provider accepts.
    #[error("password must be at least {min} characters")]
    PasswordTooShort {
        /// Minimum accepted length.
        min: usize,
    },

    /// Graduation year is not a number or outside the accepted window.
    #[error("invalid graduation year: {0:?}")]
    InvalidGraduationYear(String),

    /// Price is not a non-negative number.
    #[error("invalid price: {0:?}")]
    InvalidPrice(String),
}

/// Error code reported by the identity provider.
///
/// Codes follow the provider's `auth/<kebab-case>` convention; anything not
/// listed here is kept verbatim in [`AuthErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    /// Sign-up with an email that already has an account.
    EmailAlreadyInUse,
    /// Malformed email address.
    InvalidEmail,
    /// Password rejected by the provider's strength rules.
    WeakPassword,
    /// Email/password pair does not match an account.
    InvalidCredential,
    /// No account for the email.
    UserNotFound,
    /// Wrong password for an existing account.
    WrongPassword,
    /// Provider throttled the client.
    TooManyRequests,
    /// Provider could not be reached.
    NetworkRequestFailed,
    /// Any other provider code.
    Other(String),
}

impl AuthErrorCode {
    /// Parse a provider code such as `"auth/email-already-in-use"`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "auth/email-already-in-use" => Self::EmailAlreadyInUse,
            "auth/invalid-email" => Self::InvalidEmail,
            "auth/weak-password" => Self::WeakPassword,
            "auth/invalid-credential" => Self::InvalidCredential,
            "auth/user-not-found" => Self::UserNotFound,
            "auth/wrong-password" => Self::WrongPassword,
            "auth/too-many-requests" => Self::TooManyRequests,
            "auth/network-request-failed" => Self::NetworkRequestFailed,
            other => Self::Other(other.to_string()),
        }
    }

    /// The provider code string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::InvalidEmail => "auth/invalid-email",
            Self::WeakPassword => "auth/weak-password",
            Self::InvalidCredential => "auth/invalid-credential",
            Self::UserNotFound => "auth/user-not-found",
            Self::WrongPassword => "auth/wrong-password",
            Self::TooManyRequests => "auth/too-many-requests",
            Self::NetworkRequestFailed => "auth/network-request-failed",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
