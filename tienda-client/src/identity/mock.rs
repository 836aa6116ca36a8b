//! Mock identity provider for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tienda_types::{AuthErrorCode, Credentials, Identity, Session, UserId, MIN_PASSWORD_LEN};

use super::{AuthError, IdentityProvider, SessionCallback};
use crate::handle::CancelHandle;
use crate::lock;

/// In-memory [`IdentityProvider`].
///
/// Accounts live in memory. Session reports are delivered synchronously to
/// every registered callback, in registration order. Reports are delivered
/// one at a time, in the order they were recorded; callbacks must not call
/// back into the provider.
pub struct MockIdentityProvider {
    inner: Arc<Mutex<MockIdentityInner>>,
    dispatch: Arc<Mutex<()>>,
}

struct Account {
    uid: UserId,
    password: String,
}

#[derive(Default)]
struct MockIdentityInner {
    accounts: HashMap<String, Account>,
    current: Session,
    resolved: bool,
    listeners: Vec<(u64, SessionCallback)>,
    next_listener: u64,
    next_uid: u64,
    fail_next: Option<AuthErrorCode>,
    sign_in_calls: usize,
}

impl MockIdentityProvider {
    /// A provider that has already resolved to "nobody signed in".
    pub fn new() -> Self {
        let provider = Self::unresolved();
        lock(&provider.inner).resolved = true;
        provider
    }

    /// A provider that reports nothing until [`resolve`](Self::resolve).
    pub fn unresolved() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockIdentityInner::default())),
            dispatch: Arc::default(),
        }
    }

    /// Register an account without signing it in.
    pub fn with_account(self, email: &str, password: &str) -> Self {
        {
            let mut inner = lock(&self.inner);
            let uid = inner.allocate_uid();
            inner.accounts.insert(
                email.to_string(),
                Account {
                    uid,
                    password: password.to_string(),
                },
            );
        }
        self
    }

    /// The uid assigned to an account, if it exists.
    pub fn uid_for(&self, email: &str) -> Option<UserId> {
        lock(&self.inner)
            .accounts
            .get(email)
            .map(|account| account.uid.clone())
    }

    /// Finish initial resolution and report `session` to every listener.
    pub fn resolve(&self, session: Session) {
        self.report(session);
    }

    /// Push a session report as if the provider observed a change
    /// (token expiry, sign-in on another tab).
    pub fn set_session(&self, session: Session) {
        self.report(session);
    }

    /// Repeat the current session to every listener.
    pub fn repeat_current(&self) {
        let current = lock(&self.inner).current.clone();
        self.report(current);
    }

    /// Cause the next sign-in/sign-up/sign-out to fail with `code`.
    pub fn fail_next(&self, code: AuthErrorCode) {
        lock(&self.inner).fail_next = Some(code);
    }

    /// The last reported session.
    pub fn current(&self) -> Session {
        lock(&self.inner).current.clone()
    }

    /// Number of registered session callbacks.
    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    /// Number of sign-in attempts that reached the provider.
    pub fn sign_in_calls(&self) -> usize {
        lock(&self.inner).sign_in_calls
    }

    fn report(&self, session: Session) {
        let _dispatch = lock(&self.dispatch);
        let listeners: Vec<SessionCallback> = {
            let mut inner = lock(&self.inner);
            inner.current = session.clone();
            inner.resolved = true;
            inner.listeners.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for listener in listeners {
            listener(session.clone());
        }
    }
}

impl MockIdentityInner {
    fn allocate_uid(&mut self) -> UserId {
        self.next_uid += 1;
        UserId::new(format!("uid-{}", self.next_uid))
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockIdentityProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            dispatch: Arc::clone(&self.dispatch),
        }
    }
}

impl std::fmt::Debug for MockIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("MockIdentityProvider")
            .field("accounts", &inner.accounts.len())
            .field("current", &inner.current)
            .field("resolved", &inner.resolved)
            .finish()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let session = {
            let mut inner = lock(&self.inner);
            inner.sign_in_calls += 1;
            if let Some(code) = inner.fail_next.take() {
                return Err(code.into());
            }
            let account = inner
                .accounts
                .get(&credentials.email)
                .filter(|account| account.password == credentials.password)
                .ok_or(AuthError::new(AuthErrorCode::InvalidCredential))?;
            Session::authenticated(Identity::new(account.uid.clone(), credentials.email.clone()))
        };
        self.report(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let session = {
            let mut inner = lock(&self.inner);
            if let Some(code) = inner.fail_next.take() {
                return Err(code.into());
            }
            if !credentials.email.contains('@') {
                return Err(AuthErrorCode::InvalidEmail.into());
            }
            if credentials.password.len() < MIN_PASSWORD_LEN {
                return Err(AuthErrorCode::WeakPassword.into());
            }
            if inner.accounts.contains_key(&credentials.email) {
                return Err(AuthErrorCode::EmailAlreadyInUse.into());
            }
            let uid = inner.allocate_uid();
            inner.accounts.insert(
                credentials.email.clone(),
                Account {
                    uid: uid.clone(),
                    password: credentials.password.clone(),
                },
            );
            Session::authenticated(Identity::new(uid, credentials.email.clone()))
        };
        self.report(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(code) = lock(&self.inner).fail_next.take() {
            return Err(code.into());
        }
        self.report(Session::unauthenticated());
        Ok(())
    }

    fn on_session_change(&self, callback: SessionCallback) -> CancelHandle {
        let _dispatch = lock(&self.dispatch);
        let (id, initial) = {
            let mut inner = lock(&self.inner);
            let id = inner.next_listener;
            inner.next_listener += 1;
            inner.listeners.push((id, Arc::clone(&callback)));
            (id, inner.resolved.then(|| inner.current.clone()))
        };
        if let Some(session) = initial {
            callback(session);
        }

        let inner = Arc::clone(&self.inner);
        CancelHandle::new(move || {
            lock(&inner).listeners.retain(|(listener, _)| *listener != id);
        })
    }
}
