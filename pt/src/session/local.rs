//! Local identity provider
//!
//! Accounts and custom tokens live in the petition store. Passwords are
//! stored as Argon2id PHC strings.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{AuthError, Identity, IdentityProvider};
use crate::domain::{CustomToken, UserAccount, generate_token};
use crate::state::{StateError, StateManager};

/// Identity provider backed by the local store
#[derive(Clone)]
pub struct LocalIdentityProvider {
    state: StateManager,
}

impl LocalIdentityProvider {
    pub fn new(state: StateManager) -> Self {
        Self { state }
    }

    /// Issue a single-use sign-in token for an existing account
    pub async fn mint_custom_token(&self, email: &str) -> Result<String, AuthError> {
        debug!(%email, "mint_custom_token: called");
        let account = self
            .state
            .find_account_by_email(email)
            .await
            .map_err(unavailable)?
            .ok_or(AuthError::InvalidCredentials)?;

        let token = generate_token();
        self.state
            .create_custom_token(CustomToken::new(token.clone(), account.id))
            .await
            .map_err(unavailable)?;
        info!(email = %account.email, "Minted custom token");
        Ok(token)
    }
}

fn unavailable(err: StateError) -> AuthError {
    AuthError::Unavailable(err.to_string())
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Unavailable(format!("password hash error: {e}")))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Unavailable(format!("invalid hash format: {e}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Unavailable(format!("verify error: {e}"))),
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        debug!(%email, "sign_in: called");
        let Some(account) = self.state.find_account_by_email(email).await.map_err(unavailable)? else {
            debug!("sign_in: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &account.password_hash)? {
            debug!("sign_in: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Identity::new(account.id, account.email))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        debug!(%email, "sign_up: called");
        let account = UserAccount::new(email, hash_password(password)?);
        let identity = Identity::new(account.id.clone(), account.email.clone());

        // Lookup and insert happen in one store transaction
        match self.state.create_account_if_absent(account).await.map_err(unavailable)? {
            Some(_) => {
                info!(uid = %identity.uid, "Created local account");
                Ok(identity)
            }
            None => {
                debug!("sign_up: email already registered");
                Err(AuthError::EmailInUse)
            }
        }
    }

    async fn sign_in_with_custom_token(&self, token: &str) -> Result<Identity, AuthError> {
        debug!("sign_in_with_custom_token: called");
        let custom = self
            .state
            .take_custom_token(token)
            .await
            .map_err(unavailable)?
            .ok_or(AuthError::InvalidToken)?;

        let account = self
            .state
            .get_account(&custom.uid)
            .await
            .map_err(unavailable)?
            .ok_or(AuthError::InvalidToken)?;

        Ok(Identity::new(account.id, account.email))
    }
}
