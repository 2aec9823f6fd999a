//! Local identity documents
//!
//! Only used by the local identity provider; a hosted provider keeps these
//! on its own side.

use std::collections::HashMap;

use petitionstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};

use super::id::generate_id;

/// Email/password account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Identity uid
    pub id: String,
    /// Normalized (trimmed, lowercase) email
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub created_at: i64,
}

impl UserAccount {
    pub fn new(email: &str, password_hash: String) -> Self {
        Self {
            id: generate_id(),
            email: Self::normalize_email(email),
            password_hash,
            created_at: now_ms(),
        }
    }

    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }
}

impl Record for UserAccount {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "accounts"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("email".to_string(), IndexValue::String(self.email.clone()));
        fields
    }
}

/// Pre-provisioned single-use sign-in token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomToken {
    /// The token itself
    pub id: String,
    /// uid the token signs in as
    pub uid: String,
    pub created_at: i64,
}

impl CustomToken {
    pub fn new(token: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            id: token.into(),
            uid: uid.into(),
            created_at: now_ms(),
        }
    }
}

impl Record for CustomToken {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "custom_tokens"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("uid".to_string(), IndexValue::String(self.uid.clone()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_email_is_normalized() {
        let account = UserAccount::new("  Ana@Example.COM ", "hash".to_string());
        assert_eq!(account.email, "ana@example.com");
        assert_eq!(
            account.indexed_fields().get("email"),
            Some(&IndexValue::String("ana@example.com".to_string()))
        );
    }
}
