//! TiendaHandle - concrete wrapper around `TiendaClient`.
//!
//! Pins the generic client to trait-object backends so bindings deal with a
//! single concrete type.

use std::sync::Arc;

use tienda_client::{
    ClientConfig, DocumentStore, IdentityProvider, MemoryStore, MockIdentityProvider,
    NetworkControl, Subscription, TiendaClient,
};
use tienda_types::{Credentials, DocumentId, NewProduct, ProfileUpdate, Registration};

use crate::error::BridgeError;
use crate::types::{ConnectionStatusView, ProductView, ProfileView, SessionView};

/// A store backend usable behind a trait object.
pub trait Backend: DocumentStore + NetworkControl {}

impl<T: DocumentStore + NetworkControl> Backend for T {}

/// Live inventory registration; dropping it stops updates.
#[derive(Debug)]
pub struct InventorySubscription {
    inner: Subscription,
}

impl InventorySubscription {
    /// Stop receiving updates.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether updates can still arrive.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Registration token as a string.
    pub fn token(&self) -> String {
        self.inner.token().to_string()
    }
}

/// Concrete handle for UI bindings.
pub struct TiendaHandle {
    client: TiendaClient<dyn IdentityProvider, dyn Backend>,
}

impl TiendaHandle {
    /// Wrap the given backends.
    pub fn new(
        config: ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let client = TiendaClient::new(config, identity, backend);
        client.start_health_monitor();
        Ok(Self { client })
    }

    /// A handle over in-memory backends (demos and tests).
    pub fn in_memory(config: ClientConfig) -> Result<Self, BridgeError> {
        Self::new(
            config,
            Arc::new(MockIdentityProvider::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Establish the connection; `true` when usable.
    pub async fn establish_connection(&self) -> bool {
        self.client.establish_connection().await
    }

    /// The retry button.
    pub async fn retry_connection(&self) -> bool {
        self.client.retry_connection().await
    }

    /// Status banner contents.
    pub fn connection_status(&self) -> ConnectionStatusView {
        ConnectionStatusView::new(
            self.client.connection_state(),
            self.client.connection_error(),
        )
    }

    /// Current session.
    pub fn current_session(&self) -> SessionView {
        SessionView::from(&self.client.current_session())
    }

    /// Sign in.
    pub async fn sign_in(&self, email: String, password: String) -> Result<SessionView, BridgeError> {
        self.client
            .sign_in(&Credentials::new(email, password))
            .await?;
        Ok(self.current_session())
    }

    /// Register a new account with its profile.
    pub async fn sign_up(&self, registration: Registration) -> Result<SessionView, BridgeError> {
        self.client.sign_up(&registration).await?;
        Ok(self.current_session())
    }

    /// Sign out.
    pub async fn sign_out(&self) -> Result<(), BridgeError> {
        self.client.sign_out().await?;
        Ok(())
    }

    /// The signed-in user's profile, created if missing.
    pub async fn load_profile(&self) -> Result<ProfileView, BridgeError> {
        Ok(self.client.load_profile().await?.into())
    }

    /// Save the profile form.
    pub async fn update_profile(
        &self,
        nombre: String,
        titulo_universitario: String,
        ano_graduacion: String,
    ) -> Result<ProfileView, BridgeError> {
        let update = ProfileUpdate {
            nombre,
            titulo_universitario,
            ano_graduacion,
        };
        self.client.update_profile(&update).await?;
        self.load_profile().await
    }

    /// Follow the inventory.
    pub async fn subscribe_inventory<F>(&self, on_update: F) -> Result<InventorySubscription, BridgeError>
    where
        F: Fn(Vec<ProductView>) + Send + Sync + 'static,
    {
        let inner = self
            .client
            .subscribe_inventory(move |products| {
                on_update(products.into_iter().map(ProductView::from).collect());
            })
            .await?;
        Ok(InventorySubscription { inner })
    }

    /// Add an item from the form; returns its id.
    pub async fn add_product(&self, nombre: String, precio: String) -> Result<String, BridgeError> {
        let id = self
            .client
            .add_product(NewProduct::new(nombre, precio))
            .await?;
        Ok(id.to_string())
    }

    /// Flip an item's sold flag.
    pub async fn toggle_sold(&self, id: String, vendido: bool) -> Result<(), BridgeError> {
        self.client
            .toggle_sold(&DocumentId::new(id), vendido)
            .await?;
        Ok(())
    }

    /// Delete an item.
    pub async fn delete_product(&self, id: String) -> Result<(), BridgeError> {
        self.client.delete_product(&DocumentId::new(id)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for TiendaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiendaHandle")
            .field("client", &self.client)
            .finish()
    }
}
