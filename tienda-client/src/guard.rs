//! Profile document guard.
//!
//! Makes sure the signed-in user's profile document exists before anything
//! reads or updates it. Every operation first asks the supervisor for a
//! usable connection.
//!
//! Creation prefers the store's atomic create-if-absent. Backends without it
//! fall back to read-then-create. Either way, calls for the same uid within
//! this process are serialized, so concurrent callers produce exactly one
//! write and every caller observes that document. A uid's gate is dropped
//! once its last holder releases it.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tienda_types::{
    timestamp_now, DocumentId, Identity, ProfileDocument, ProfileUpdate, UserId, ValidationError,
};
use tracing::{debug, info};

use crate::session::SessionStateMachine;
use crate::store::{CreateOutcome, DocumentStore, NetworkControl, StoreError};
use crate::supervisor::{ConnectionSupervisor, ConnectivityError, EstablishOutcome};

/// Profile guard errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// No usable connection.
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// Nobody is signed in.
    #[error("no signed-in user")]
    NotAuthenticated,

    /// The uid is not the signed-in user's.
    #[error("profile {requested} does not belong to the signed-in user")]
    SessionMismatch {
        /// The uid that was asked for.
        requested: UserId,
    },

    /// The submitted fields are invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The profile document does not exist.
    #[error("profile {0} not found")]
    NotFound(UserId),

    /// Two writers created the profile at once.
    ///
    /// Only reachable from outside this process, on backends without an
    /// atomic create.
    #[error("profile {0} was created concurrently")]
    ConcurrentWriteRace(UserId),

    /// The store failed.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for GuardError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { id, .. } => Self::NotFound(UserId::new(id.as_str())),
            other => Self::Store(other),
        }
    }
}

/// Create-if-missing, update and load for profile documents.
pub struct ProfileDocumentGuard<S: DocumentStore + ?Sized, N: NetworkControl + ?Sized> {
    store: Arc<S>,
    supervisor: Arc<ConnectionSupervisor<N>>,
    session: SessionStateMachine,
    collection: String,
    prefer_atomic: bool,
    gates: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl<S, N> ProfileDocumentGuard<S, N>
where
    S: DocumentStore + ?Sized,
    N: NetworkControl + ?Sized,
{
    /// Create a guard over `collection`.
    pub fn new(
        store: Arc<S>,
        supervisor: Arc<ConnectionSupervisor<N>>,
        session: SessionStateMachine,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            supervisor,
            session,
            collection: collection.into(),
            prefer_atomic: true,
            gates: Arc::default(),
        }
    }

    /// Whether to try the store's atomic create first (default `true`).
    pub fn with_atomic_create(mut self, prefer: bool) -> Self {
        self.prefer_atomic = prefer;
        self
    }

    /// The collection profiles live in.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Make sure the profile for `uid` exists and return it.
    ///
    /// An existing document is returned untouched. A missing one is created
    /// with empty fields, the session's email and a creation timestamp.
    pub async fn ensure(&self, uid: &UserId) -> Result<ProfileDocument, GuardError> {
        let identity = self.signed_in(uid)?;
        self.connect().await?;

        let _serialized = self.serialize(uid).await;

        let id = DocumentId::from(uid);
        if let Some(doc) = self.store.get_document(&self.collection, &id).await? {
            debug!(uid = %uid, "profile document exists");
            return Ok(ProfileDocument::from_document(&doc));
        }

        let profile = ProfileDocument::default_for(uid.clone(), &identity.email, timestamp_now());

        if self.prefer_atomic {
            match self
                .store
                .create_if_absent(&self.collection, &id, profile.to_fields())
                .await
            {
                Ok(CreateOutcome::Created) => {
                    info!(uid = %uid, "created default profile document");
                    return Ok(profile);
                }
                Ok(CreateOutcome::AlreadyExists(doc)) => {
                    debug!(uid = %uid, "profile document created elsewhere");
                    return Ok(ProfileDocument::from_document(&doc));
                }
                Err(StoreError::Unsupported(_)) => {
                    debug!("store lacks atomic create, falling back to set");
                }
                Err(error) => return Err(error.into()),
            }
        }

        self.store
            .set_document(&self.collection, &id, profile.to_fields())
            .await?;
        info!(uid = %uid, "created default profile document");
        Ok(profile)
    }

    /// Validate and write the editable profile fields.
    ///
    /// Validation happens before any connectivity check or store call.
    pub async fn update(&self, uid: &UserId, update: &ProfileUpdate) -> Result<(), GuardError> {
        update.validate()?;
        self.signed_in(uid)?;
        self.connect().await?;

        let id = DocumentId::from(uid);
        self.store
            .update_document(&self.collection, &id, update.to_fields(timestamp_now()))
            .await?;
        info!(uid = %uid, "profile updated");
        Ok(())
    }

    /// Ensure the profile exists, then read its current contents.
    pub async fn load(&self, uid: &UserId) -> Result<ProfileDocument, GuardError> {
        let ensured = self.ensure(uid).await?;
        let id = DocumentId::from(uid);
        Ok(self
            .store
            .get_document(&self.collection, &id)
            .await?
            .map(|doc| ProfileDocument::from_document(&doc))
            .unwrap_or(ensured))
    }

    /// Write a complete profile (used right after account creation).
    pub async fn store(&self, profile: &ProfileDocument) -> Result<(), GuardError> {
        self.connect().await?;
        let _serialized = self.serialize(&profile.uid).await;

        let id = DocumentId::from(&profile.uid);
        self.store
            .set_document(&self.collection, &id, profile.to_fields())
            .await?;
        info!(uid = %profile.uid, "profile document written");
        Ok(())
    }

    fn signed_in(&self, uid: &UserId) -> Result<Identity, GuardError> {
        let identity = self.session.identity().ok_or(GuardError::NotAuthenticated)?;
        if identity.user_id != *uid {
            return Err(GuardError::SessionMismatch {
                requested: uid.clone(),
            });
        }
        Ok(identity)
    }

    async fn connect(&self) -> Result<(), GuardError> {
        match self.supervisor.establish().await {
            EstablishOutcome::Failed(error) => Err(error.into()),
            _ => Ok(()),
        }
    }

    /// Number of uids with a gate currently held or awaited.
    pub fn pending_gates(&self) -> usize {
        self.gates.len()
    }

    async fn serialize(&self, uid: &UserId) -> UidGate {
        let gate = Arc::clone(self.gates.entry(uid.clone()).or_default().value());
        let mut held = UidGate {
            gates: Arc::clone(&self.gates),
            uid: uid.clone(),
            held: None,
        };
        held.held = Some(gate.lock_owned().await);
        held
    }
}

/// Exclusive hold on one uid's gate.
struct UidGate {
    gates: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
    uid: UserId,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for UidGate {
    fn drop(&mut self) {
        self.held.take();
        // Only the map's own reference left: nobody holds or awaits the gate.
        self.gates
            .remove_if(&self.uid, |_, gate| Arc::strong_count(gate) == 1);
    }
}
