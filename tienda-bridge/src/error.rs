//! Error types for tienda-bridge.
//!
//! Lower-layer errors flatten to strings. Every variant also carries (or
//! derives) the Spanish message shown to the user.

use thiserror::Error;
use tienda_client::{ClientError, ConfigError, GuardError, LiveQueryError, StoreError};
use tienda_types::{AuthErrorCode, ValidationError};

/// Errors from tienda-bridge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Form input was rejected; holds the user-facing message.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The identity provider refused the request.
    #[error("authentication failed ({code}): {message}")]
    AuthFailed {
        /// Provider error code, e.g. `auth/weak-password`.
        code: String,
        /// User-facing message.
        message: String,
    },

    /// Nobody is signed in.
    #[error("not signed in")]
    NotSignedIn,

    /// No usable connection to the store.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A document was missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other store failure.
    #[error("store error: {0}")]
    StoreError(String),

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl BridgeError {
    /// Text to show in an alert.
    pub fn user_message(&self) -> String {
        match self {
            BridgeError::InvalidInput(message) => message.clone(),
            BridgeError::AuthFailed { message, .. } => message.clone(),
            BridgeError::NotSignedIn => "Inicie sesión para continuar".to_string(),
            BridgeError::ConnectionFailed(_) => {
                "No se pudo establecer conexión con el servidor".to_string()
            }
            BridgeError::NotFound(_) => "No se encontraron datos del usuario".to_string(),
            BridgeError::StoreError(_) => {
                "Ocurrió un error. Por favor, intenta nuevamente.".to_string()
            }
            BridgeError::InvalidConfig(message) => message.clone(),
        }
    }
}

/// User-facing message for a validation failure.
pub fn validation_message(error: &ValidationError) -> String {
    match error {
        ValidationError::MissingField(_) => "Por favor complete todos los campos",
        ValidationError::InvalidField { .. } => "Por favor revise los datos ingresados",
        ValidationError::PasswordMismatch => "Las contraseñas no coinciden",
        ValidationError::PasswordTooShort { .. } => {
            "La contraseña debe tener al menos 6 caracteres"
        }
        ValidationError::InvalidGraduationYear(_) => "Año de graduación inválido",
        ValidationError::InvalidPrice(_) => "Por favor ingrese un precio válido",
    }
    .to_string()
}

/// User-facing message for an identity provider error code.
pub fn auth_message(code: &AuthErrorCode) -> String {
    match code {
        AuthErrorCode::EmailAlreadyInUse => "Ya existe una cuenta con este correo electrónico",
        AuthErrorCode::InvalidEmail => "Correo electrónico inválido",
        AuthErrorCode::WeakPassword => "La contraseña es muy débil",
        AuthErrorCode::InvalidCredential
        | AuthErrorCode::UserNotFound
        | AuthErrorCode::WrongPassword => "Correo o contraseña incorrectos",
        AuthErrorCode::TooManyRequests => "Demasiados intentos. Intente más tarde",
        AuthErrorCode::NetworkRequestFailed => "Sin conexión a internet",
        AuthErrorCode::Other(_) => "Error de autenticación. Intente nuevamente",
    }
    .to_string()
}

impl From<StoreError> for BridgeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => {
                BridgeError::NotFound(format!("{collection}/{id}"))
            }
            other => BridgeError::StoreError(other.to_string()),
        }
    }
}

impl From<GuardError> for BridgeError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Connectivity(e) => BridgeError::ConnectionFailed(e.to_string()),
            GuardError::NotAuthenticated | GuardError::SessionMismatch { .. } => {
                BridgeError::NotSignedIn
            }
            GuardError::Validation(e) => BridgeError::InvalidInput(validation_message(&e)),
            GuardError::NotFound(uid) => BridgeError::NotFound(uid.to_string()),
            GuardError::ConcurrentWriteRace(uid) => {
                BridgeError::StoreError(format!("profile {uid} was created concurrently"))
            }
            GuardError::Store(e) => e.into(),
        }
    }
}

impl From<ClientError> for BridgeError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Validation(e) => BridgeError::InvalidInput(validation_message(&e)),
            ClientError::Auth(e) => BridgeError::AuthFailed {
                code: e.code.to_string(),
                message: auth_message(&e.code),
            },
            ClientError::Connectivity(e) => BridgeError::ConnectionFailed(e.to_string()),
            ClientError::Store(e) => e.into(),
            ClientError::Profile(e) => e.into(),
            ClientError::LiveQuery(LiveQueryError::Store(e)) => e.into(),
            ClientError::LiveQuery(LiveQueryError::SessionChanged) => BridgeError::NotSignedIn,
            ClientError::NotAuthenticated => BridgeError::NotSignedIn,
        }
    }
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        BridgeError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tienda_client::{AuthError, ConnectivityError};
    use tienda_types::{DocumentId, UserId};

    #[test]
    fn validation_maps_to_form_message() {
        let err: BridgeError = ClientError::Validation(ValidationError::PasswordMismatch).into();
        assert_eq!(
            err,
            BridgeError::InvalidInput("Las contraseñas no coinciden".to_string())
        );
        assert_eq!(err.user_message(), "Las contraseñas no coinciden");
    }

    #[test]
    fn auth_codes_map_to_registration_messages() {
        let cases = [
            (
                AuthErrorCode::EmailAlreadyInUse,
                "Ya existe una cuenta con este correo electrónico",
            ),
            (AuthErrorCode::InvalidEmail, "Correo electrónico inválido"),
            (AuthErrorCode::WeakPassword, "La contraseña es muy débil"),
        ];
        for (code, message) in cases {
            let err: BridgeError = ClientError::Auth(AuthError::new(code)).into();
            assert_eq!(err.user_message(), message);
        }
    }

    #[test]
    fn auth_error_keeps_provider_code() {
        let err: BridgeError =
            ClientError::Auth(AuthError::new(AuthErrorCode::WeakPassword)).into();
        assert!(err.to_string().contains("auth/weak-password"));
    }

    #[test]
    fn unknown_auth_code_gets_generic_message() {
        let code = AuthErrorCode::from_code("auth/quota-exceeded");
        assert_eq!(
            auth_message(&code),
            "Error de autenticación. Intente nuevamente"
        );
    }

    #[test]
    fn connectivity_maps_to_connection_failed() {
        let err: BridgeError = ClientError::Connectivity(ConnectivityError::Timeout(
            std::time::Duration::from_secs(10),
        ))
        .into();
        assert!(matches!(err, BridgeError::ConnectionFailed(_)));
        assert!(err.to_string().contains("timed out"));
        assert_eq!(
            err.user_message(),
            "No se pudo establecer conexión con el servidor"
        );
    }

    #[test]
    fn store_not_found_keeps_path() {
        let err: BridgeError = ClientError::Store(StoreError::NotFound {
            collection: "productos".into(),
            id: DocumentId::new("p1"),
        })
        .into();
        assert_eq!(err, BridgeError::NotFound("productos/p1".into()));
    }

    #[test]
    fn guard_errors_flatten() {
        let err: BridgeError = GuardError::NotFound(UserId::new("u1")).into();
        assert_eq!(err, BridgeError::NotFound("u1".into()));

        let err: BridgeError = GuardError::NotAuthenticated.into();
        assert_eq!(err, BridgeError::NotSignedIn);

        let err: BridgeError = GuardError::Store(StoreError::Rejected("denied".into())).into();
        assert!(matches!(err, BridgeError::StoreError(_)));
    }

    #[test]
    fn config_error_maps_to_invalid_config() {
        let err: BridgeError = ConfigError::Invalid("retry.max_attempts must be at least 1".into()).into();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
        assert!(err.user_message().contains("max_attempts"));
    }
}
