//! Per-identity profile written at sign-up

use std::collections::HashMap;

use petitionstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};

/// Plan assigned to every new profile
pub const DEFAULT_PLAN: &str = "basic";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// `{app_id}/{uid}`
    pub id: String,
    pub uid: String,
    pub email: String,
    pub plan: String,
    pub created_at: i64,
}

impl Profile {
    pub fn new(app_id: &str, uid: impl Into<String>, email: impl Into<String>) -> Self {
        let uid = uid.into();
        Self {
            id: Self::key(app_id, &uid),
            uid,
            email: email.into(),
            plan: DEFAULT_PLAN.to_string(),
            created_at: now_ms(),
        }
    }

    /// Store key of the profile for `uid` under `app_id`
    pub fn key(app_id: &str, uid: &str) -> String {
        format!("{}/{}", app_id, uid)
    }
}

impl Record for Profile {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "profiles"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("uid".to_string(), IndexValue::String(self.uid.clone()));
        fields
    }
}
