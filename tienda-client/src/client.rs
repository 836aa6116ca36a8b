//! TiendaClient - the surface the presentation layer talks to.
//!
//! Wires the session state machine, connection supervisor, profile guard and
//! live query manager around one identity provider and one store:
//!
//! ```text
//! UI ─▶ TiendaClient ─┬─▶ SessionStateMachine ◀── IdentityProvider
//!                     ├─▶ ConnectionSupervisor ──▶ NetworkControl
//!                     ├─▶ ProfileDocumentGuard ──▶ DocumentStore
//!                     └─▶ LiveQueryManager ──────▶ DocumentStore
//! ```
//!
//! # Example
//!
//! ```ignore
//! let client = TiendaClient::new(config, Arc::new(provider), Arc::new(store));
//! client.sign_in(&Credentials::new("ana@tienda.mx", "secreto1")).await?;
//! let subscription = client.subscribe_inventory(|products| render(products)).await?;
//! ```

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tienda_core::ConnectionState;
use tienda_types::{
    timestamp_now, Credentials, DocumentId, Fields, NewProduct, Product, ProfileDocument,
    ProfileUpdate, Registration, Session, SessionState, UserId, ValidationError,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::guard::{GuardError, ProfileDocumentGuard};
use crate::handle::CancelHandle;
use crate::identity::{AuthError, IdentityProvider};
use crate::live_query::{LiveQueryError, LiveQueryManager, Subscription};
use crate::lock;
use crate::session::SessionStateMachine;
use crate::store::{DocumentStore, NetworkControl, StoreError};
use crate::supervisor::{ConnectionSupervisor, ConnectivityError, EstablishOutcome};

/// Client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Form input was rejected before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The identity provider refused the request.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No usable connection.
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A profile operation failed.
    #[error(transparent)]
    Profile(#[from] GuardError),

    /// A live query could not be opened.
    #[error(transparent)]
    LiveQuery(#[from] LiveQueryError),

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotAuthenticated,
}

/// The sync engine facade.
pub struct TiendaClient<A, S>
where
    A: IdentityProvider + ?Sized,
    S: DocumentStore + NetworkControl + ?Sized + 'static,
{
    config: ClientConfig,
    identity: Arc<A>,
    store: Arc<S>,
    session: SessionStateMachine,
    supervisor: Arc<ConnectionSupervisor<S>>,
    live: LiveQueryManager<S>,
    profiles: ProfileDocumentGuard<S, S>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl<A, S> TiendaClient<A, S>
where
    A: IdentityProvider + ?Sized,
    S: DocumentStore + NetworkControl + ?Sized + 'static,
{
    /// Build the engine and start following the identity provider.
    pub fn new(config: ClientConfig, identity: Arc<A>, store: Arc<S>) -> Self {
        let session = SessionStateMachine::new();
        let supervisor = Arc::new(ConnectionSupervisor::new(
            Arc::clone(&store),
            config.supervisor(),
        ));
        // Registered before anything else listens so teardown runs first.
        let live = LiveQueryManager::new(Arc::clone(&store), session.clone());
        let profiles = ProfileDocumentGuard::new(
            Arc::clone(&store),
            Arc::clone(&supervisor),
            session.clone(),
            config.collections.profiles.clone(),
        )
        .with_atomic_create(config.profile.prefer_atomic_create);
        // Every recovery re-registers live queries, whoever triggered it.
        supervisor.add_recovery_hook(live.recovery_hook());

        session.attach(identity.as_ref());
        debug!(state = ?session.current(), "tienda client initialized");

        Self {
            config,
            identity,
            store,
            session,
            supervisor,
            live,
            profiles,
            monitor: Mutex::new(None),
        }
    }

    // ===========================================
    // Connection
    // ===========================================

    /// Make sure the store is reachable, recovering if needed.
    ///
    /// Live queries are re-registered after a recovery.
    pub async fn establish_connection(&self) -> bool {
        self.supervisor.establish().await.is_connected()
    }

    /// The UI's retry action; subject to the configured retry policy.
    pub async fn retry_connection(&self) -> bool {
        self.supervisor.retry().await.is_connected()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Watch connection state changes.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.watch_state()
    }

    /// The last connection error, cleared on success.
    pub fn connection_error(&self) -> Option<String> {
        self.supervisor.last_error()
    }

    // ===========================================
    // Session
    // ===========================================

    /// Current session state (`Unknown` until the provider resolves).
    pub fn current_session(&self) -> SessionState {
        self.session.current()
    }

    /// Register for identity transitions.
    pub fn on_session_change<F>(&self, listener: F) -> CancelHandle
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.session.subscribe(listener)
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ClientError> {
        credentials.validate()?;
        let session = self.identity.sign_in(credentials).await?;
        info!(email = %credentials.email, "signed in");
        Ok(session)
    }

    /// Create an account and write its full profile.
    pub async fn sign_up(&self, registration: &Registration) -> Result<Session, ClientError> {
        registration.validate()?;
        let session = self.identity.sign_up(&registration.credentials()).await?;
        let uid = session
            .user_id()
            .cloned()
            .ok_or(ClientError::NotAuthenticated)?;

        let profile = registration.profile(uid.clone(), timestamp_now());
        self.profiles.store(&profile).await?;
        info!(uid = %uid, "account created");
        Ok(session)
    }

    /// End the session. Live queries are torn down by the transition.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.identity.sign_out().await?;
        info!("signed out");
        Ok(())
    }

    // ===========================================
    // Profile
    // ===========================================

    /// Make sure the profile for `uid` exists and return it.
    pub async fn ensure_profile(&self, uid: &UserId) -> Result<ProfileDocument, ClientError> {
        Ok(self.profiles.ensure(uid).await?)
    }

    /// Ensure, then read the signed-in user's profile.
    pub async fn load_profile(&self) -> Result<ProfileDocument, ClientError> {
        let uid = self.signed_in_uid()?;
        Ok(self.profiles.load(&uid).await?)
    }

    /// Validate and save the signed-in user's profile fields.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ClientError> {
        update.validate()?;
        let uid = self.signed_in_uid()?;
        Ok(self.profiles.update(&uid, update).await?)
    }

    // ===========================================
    // Inventory
    // ===========================================

    /// Follow the inventory, newest first by default.
    ///
    /// The subscription ends on the next session change.
    pub async fn subscribe_inventory<F>(&self, on_update: F) -> Result<Subscription, ClientError>
    where
        F: Fn(Vec<Product>) + Send + Sync + 'static,
    {
        self.signed_in_uid()?;
        let subscription = self
            .live
            .subscribe(self.config.inventory_query(), move |documents| {
                on_update(documents.iter().map(Product::from_document).collect());
            })
            .await?;
        Ok(subscription)
    }

    /// Validate and add an inventory item.
    pub async fn add_product(&self, product: NewProduct) -> Result<DocumentId, ClientError> {
        let fields = product.into_fields(timestamp_now())?;
        self.signed_in_uid()?;
        self.connect().await?;

        let id = self
            .store
            .add_document(&self.config.collections.inventory, fields)
            .await?;
        info!(id = %id, "product added");
        Ok(id)
    }

    /// Flip an item's sold flag, given the value currently displayed.
    pub async fn toggle_sold(&self, id: &DocumentId, vendido: bool) -> Result<(), ClientError> {
        self.signed_in_uid()?;
        self.connect().await?;

        let mut fields = Fields::new();
        fields.insert("vendido".into(), serde_json::Value::Bool(!vendido));
        self.store
            .update_document(&self.config.collections.inventory, id, fields)
            .await?;
        debug!(id = %id, vendido = !vendido, "product sold flag toggled");
        Ok(())
    }

    /// Delete an inventory item.
    pub async fn delete_product(&self, id: &DocumentId) -> Result<(), ClientError> {
        self.signed_in_uid()?;
        self.connect().await?;

        self.store
            .delete_document(&self.config.collections.inventory, id)
            .await?;
        info!(id = %id, "product deleted");
        Ok(())
    }

    // ===========================================
    // Components
    // ===========================================

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The session state machine.
    pub fn session(&self) -> &SessionStateMachine {
        &self.session
    }

    /// The connection supervisor.
    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor<S>> {
        &self.supervisor
    }

    /// The live query manager.
    pub fn live_queries(&self) -> &LiveQueryManager<S> {
        &self.live
    }

    /// The profile guard.
    pub fn profiles(&self) -> &ProfileDocumentGuard<S, S> {
        &self.profiles
    }

    fn signed_in_uid(&self) -> Result<UserId, ClientError> {
        self.session
            .identity()
            .map(|identity| identity.user_id)
            .ok_or(ClientError::NotAuthenticated)
    }

    async fn connect(&self) -> Result<(), ClientError> {
        match self.supervisor.establish().await {
            EstablishOutcome::Failed(error) => Err(error.into()),
            _ => Ok(()),
        }
    }

    /// Start the background health monitor if the configuration enables it.
    ///
    /// Returns `false` when no interval is configured or it is already running.
    pub fn start_health_monitor(&self) -> bool {
        let Some(interval) = self.config.health_check_interval() else {
            return false;
        };
        let mut monitor = lock(&self.monitor);
        if monitor.is_some() {
            return false;
        }
        info!(interval_ms = interval.as_millis() as u64, "starting health monitor");
        *monitor = Some(self.supervisor.spawn_health_monitor(interval));
        true
    }
}

impl<A, S> Drop for TiendaClient<A, S>
where
    A: IdentityProvider + ?Sized,
    S: DocumentStore + NetworkControl + ?Sized + 'static,
{
    fn drop(&mut self) {
        if let Some(monitor) = lock(&self.monitor).take() {
            monitor.abort();
        }
        self.session.detach();
    }
}

impl<A, S> std::fmt::Debug for TiendaClient<A, S>
where
    A: IdentityProvider + ?Sized,
    S: DocumentStore + NetworkControl + ?Sized + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiendaClient")
            .field("session", &self.session)
            .field("connection", &self.connection_state())
            .field("live_queries", &self.live)
            .finish()
    }
}
