//! PetitionRecord - one persisted generation result

use std::collections::HashMap;

use petitionstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};

use super::draft::Draft;
use super::id::generate_id;

/// Lifecycle of a persisted petition
///
/// Only `Generated` exists; records are never updated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PetitionStatus {
    #[default]
    Generated,
}

impl std::fmt::Display for PetitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generated => write!(f, "generated"),
        }
    }
}

/// Immutable snapshot of a draft plus the text generated from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionRecord {
    /// Unique identifier
    pub id: String,

    /// Application instance the record belongs to
    pub app_id: String,

    /// Identity uid of the owner
    pub owner_id: String,

    /// Draft fields at submission time
    pub draft: Draft,

    /// Text returned by the generation service
    pub generated_text: String,

    pub status: PetitionStatus,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl PetitionRecord {
    /// Create a new record with a fresh id, stamped now
    pub fn new(
        app_id: impl Into<String>,
        owner_id: impl Into<String>,
        draft: Draft,
        generated_text: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            app_id: app_id.into(),
            owner_id: owner_id.into(),
            draft,
            generated_text: generated_text.into(),
            status: PetitionStatus::Generated,
            created_at: now_ms(),
        }
    }

    /// Case type label for listings
    pub fn title(&self) -> &str {
        self.draft.case_type.map(|c| c.label()).unwrap_or("(sem tipo)")
    }

    /// Creation time as a chrono timestamp
    pub fn created_at_utc(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(self.created_at).unwrap_or_default()
    }
}

impl Record for PetitionRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "petitions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("app_id".to_string(), IndexValue::String(self.app_id.clone()));
        fields.insert("owner".to_string(), IndexValue::String(self.owner_id.clone()));
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("created_at".to_string(), IndexValue::Int(self.created_at));
        fields
    }
}
