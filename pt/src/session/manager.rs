//! SessionManager - holds the current identity
//!
//! The identity lives in a `watch` channel. Listeners registered with
//! `on_identity_change` run as tasks that are aborted when their
//! subscription is cancelled or dropped.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AuthError, Identity, IdentityProvider, SessionFile};
use crate::domain::Profile;
use crate::state::StateManager;

/// Handle to a listener registered with `SessionManager::on_identity_change`
///
/// The listener stops on `cancel()` or when the handle is dropped.
pub struct IdentitySubscription {
    handle: JoinHandle<()>,
}

impl IdentitySubscription {
    pub fn cancel(self) {
        // Drop aborts
    }
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Clone)]
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    /// Profile writes on sign-up; skipped when absent
    state: Option<StateManager>,
    app_id: String,
    min_password_len: usize,
    /// Persisted session; memory-only when absent
    session_file: Option<SessionFile>,
    identity_tx: Arc<watch::Sender<Option<Identity>>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, app_id: impl Into<String>, min_password_len: usize) -> Self {
        let (identity_tx, _) = watch::channel(None);
        Self {
            provider,
            state: None,
            app_id: app_id.into(),
            min_password_len,
            session_file: None,
            identity_tx: Arc::new(identity_tx),
        }
    }

    /// Write profiles to `state` on sign-up
    pub fn with_state(mut self, state: StateManager) -> Self {
        self.state = Some(state);
        self
    }

    /// Persist the identity in `session_file` across processes
    pub fn with_session_file(mut self, session_file: SessionFile) -> Self {
        self.session_file = Some(session_file);
        self
    }

    pub fn current(&self) -> Option<Identity> {
        self.identity_tx.borrow().clone()
    }

    /// Receiver that observes every identity transition
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    /// Run `callback` with the current identity, then on every transition
    pub fn on_identity_change<F>(&self, callback: F) -> IdentitySubscription
    where
        F: Fn(Option<Identity>) + Send + 'static,
    {
        debug!("on_identity_change: called");
        let mut rx = self.identity_tx.subscribe();
        let handle = tokio::spawn(async move {
            let current = rx.borrow_and_update().clone();
            callback(current);
            while rx.changed().await.is_ok() {
                let current = rx.borrow_and_update().clone();
                callback(current);
            }
        });
        IdentitySubscription { handle }
    }

    /// Publish `identity`; listeners only hear about real transitions
    fn set_identity(&self, identity: Option<Identity>) {
        self.identity_tx.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity;
                true
            }
        });
    }

    fn persist(&self, identity: &Identity) {
        if let Some(file) = &self.session_file
            && let Err(e) = file.save(identity)
        {
            warn!(error = %e, "Failed to persist session");
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        debug!(%email, "sign_in: called");
        let identity = self.provider.sign_in(email, password).await.inspect_err(|e| {
            warn!(error = %e, "sign_in: failed");
        })?;
        info!(uid = %identity.uid, "Signed in");
        self.persist(&identity);
        self.set_identity(Some(identity.clone()));
        Ok(identity)
    }

    /// Register and sign in; also writes the identity's profile
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        debug!(%email, "sign_up: called");
        if password.chars().count() < self.min_password_len {
            return Err(AuthError::WeakPassword {
                min_len: self.min_password_len,
            });
        }

        let identity = self.provider.sign_up(email, password).await.inspect_err(|e| {
            warn!(error = %e, "sign_up: failed");
        })?;
        info!(uid = %identity.uid, "Signed up");

        if let Some(state) = &self.state {
            let profile = Profile::new(&self.app_id, identity.uid.clone(), identity.email.clone());
            if let Err(e) = state.put_profile(profile).await {
                warn!(uid = %identity.uid, error = %e, "Failed to write profile");
            }
        }

        self.persist(&identity);
        self.set_identity(Some(identity.clone()));
        Ok(identity)
    }

    /// End the session; on a provider failure the identity stays signed in
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        debug!("sign_out: called");
        if let Some(identity) = self.current() {
            self.provider.sign_out(&identity).await.inspect_err(|e| {
                warn!(error = %e, "sign_out: failed");
            })?;
            info!(uid = %identity.uid, "Signed out");
        }
        if let Some(file) = &self.session_file
            && let Err(e) = file.clear()
        {
            warn!(error = %e, "Failed to remove session file");
        }
        self.set_identity(None);
        Ok(())
    }

    /// Resolve the startup identity
    ///
    /// A persisted session wins; otherwise `initial_token` is redeemed. A
    /// failed redemption is logged and leaves the session signed out.
    pub async fn establish(&self, initial_token: Option<&str>) -> Option<Identity> {
        debug!(has_token = initial_token.is_some(), "establish: called");
        if let Some(identity) = self.session_file.as_ref().and_then(|f| f.load()) {
            info!(uid = %identity.uid, "Restored session");
            self.set_identity(Some(identity.clone()));
            return Some(identity);
        }

        if let Some(token) = initial_token.filter(|t| !t.trim().is_empty()) {
            match self.provider.sign_in_with_custom_token(token).await {
                Ok(identity) => {
                    info!(uid = %identity.uid, "Signed in with initial token");
                    self.persist(&identity);
                    self.set_identity(Some(identity.clone()));
                    return Some(identity);
                }
                Err(e) => {
                    warn!(error = %e, "Initial token sign-in failed");
                }
            }
        }

        self.set_identity(None);
        None
    }
}
