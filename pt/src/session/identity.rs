//! Identity, auth errors and the identity provider seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authenticated principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
        }
    }
}

/// Authentication failure
///
/// `Display` carries the detail for logs; `user_message` is what a user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Password shorter than {min_len} characters")]
    WeakPassword { min_len: usize },

    #[error("Email already registered")]
    EmailInUse,

    #[error("Invalid or expired custom token")]
    InvalidToken,

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// Fixed user-facing message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials => "Falha no login. Verifique seu email e senha.".to_string(),
            Self::WeakPassword { min_len } => {
                format!("Falha no cadastro. A senha deve ter pelo menos {} caracteres.", min_len)
            }
            Self::EmailInUse => "Falha no cadastro. Este email já está registado.".to_string(),
            Self::InvalidToken => "Token de acesso inválido ou expirado.".to_string(),
            Self::Unavailable(_) => {
                "Serviço de autenticação indisponível. Por favor, tente novamente.".to_string()
            }
        }
    }
}

/// Backend that owns accounts and credentials
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Register a new account; password length is checked by the caller
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Redeem a pre-provisioned custom token
    async fn sign_in_with_custom_token(&self, token: &str) -> Result<Identity, AuthError>;

    /// End the session on the provider side, if it keeps one
    async fn sign_out(&self, _identity: &Identity) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_hide_details() {
        let err = AuthError::Unavailable("connection refused at 10.0.0.1".to_string());
        assert!(!err.user_message().contains("10.0.0.1"));
        assert!(err.to_string().contains("10.0.0.1"));
    }

    #[test]
    fn test_weak_password_message_names_minimum() {
        let err = AuthError::WeakPassword { min_len: 6 };
        assert_eq!(
            err.user_message(),
            "Falha no cadastro. A senha deve ter pelo menos 6 caracteres."
        );
    }
}
