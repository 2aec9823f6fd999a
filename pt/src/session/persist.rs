//! Session file
//!
//! Each `pt` invocation is a fresh process, so the signed-in identity is kept
//! in `<store_dir>/session.json` between runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Identity;

pub const SESSION_FILE_NAME: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    identity: Identity,
    signed_in_at: i64,
}

/// Location of the persisted session
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(SESSION_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored identity; a missing or corrupt file reads as none
    pub fn load(&self) -> Option<Identity> {
        debug!(path = %self.path.display(), "load: called");
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<StoredSession>(&content) {
            Ok(stored) => Some(stored.identity),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    pub fn save(&self, identity: &Identity) -> eyre::Result<()> {
        debug!(uid = %identity.uid, "save: called");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredSession {
            identity: identity.clone(),
            signed_in_at: petitionstore::now_ms(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }

    pub fn clear(&self) -> eyre::Result<()> {
        debug!("clear: called");
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
