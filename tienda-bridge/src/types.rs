//! Flat view types for tienda-bridge.
//!
//! Owned strings and plain values only, ready for a UI binding.

use tienda_core::ConnectionState;
use tienda_types::{Product, ProfileDocument, SessionState};

/// The signed-in user, as the UI sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Whether the identity provider has reported yet.
    pub resolved: bool,
    /// Signed-in uid.
    pub uid: Option<String>,
    /// Signed-in email.
    pub email: Option<String>,
}

impl From<&SessionState> for SessionView {
    fn from(state: &SessionState) -> Self {
        let identity = state.session().and_then(|session| session.identity());
        Self {
            resolved: state.is_resolved(),
            uid: identity.map(|i| i.user_id.to_string()),
            email: identity.map(|i| i.email.clone()),
        }
    }
}

impl SessionView {
    /// Whether someone is signed in.
    pub fn is_signed_in(&self) -> bool {
        self.uid.is_some()
    }
}

/// A profile for the profile screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    /// Owner uid.
    pub uid: String,
    /// Full name.
    pub nombre: String,
    /// University degree.
    pub titulo_universitario: String,
    /// Graduation year as entered.
    pub ano_graduacion: String,
    /// Account email.
    pub email: String,
    /// Whether every editable field is filled in.
    pub complete: bool,
}

impl From<ProfileDocument> for ProfileView {
    fn from(profile: ProfileDocument) -> Self {
        let complete = profile.is_complete();
        Self {
            uid: profile.uid.to_string(),
            nombre: profile.nombre,
            titulo_universitario: profile.titulo_universitario,
            ano_graduacion: profile.ano_graduacion,
            email: profile.email,
            complete,
        }
    }
}

/// One inventory card.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductView {
    /// Document id.
    pub id: String,
    /// Display name.
    pub nombre: String,
    /// Price.
    pub precio: f64,
    /// Price formatted for display, e.g. `$1200.50`.
    pub precio_texto: String,
    /// Whether it has been sold.
    pub vendido: bool,
    /// Creation timestamp.
    pub creado: String,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            precio_texto: format!("${:.2}", product.precio),
            nombre: product.nombre,
            precio: product.precio,
            vendido: product.vendido,
            creado: product.creado,
        }
    }
}

/// Connection status for the status banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatusView {
    /// Machine label: checking, connecting, connected, degraded, failed.
    pub state: String,
    /// Banner text.
    pub message: String,
    /// Last error, if the state is an error state.
    pub error: Option<String>,
    /// Whether to show the retry button.
    pub can_retry: bool,
}

impl ConnectionStatusView {
    /// Build the view from the supervisor's state and last error.
    pub fn new(state: ConnectionState, error: Option<String>) -> Self {
        let message = match state {
            ConnectionState::Checking => "Verificando conexión...",
            ConnectionState::Connecting => "Conectando...",
            ConnectionState::Connected => "Conectado",
            ConnectionState::Degraded => "Conexión inestable",
            ConnectionState::Failed => "Error de conexión",
        };
        Self {
            state: state.label().to_string(),
            message: message.to_string(),
            error,
            can_retry: state.needs_retry(),
        }
    }
}
