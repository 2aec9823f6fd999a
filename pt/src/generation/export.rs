//! Plain-text export of a generated petition

use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Default export file name
pub const EXPORT_FILE_NAME: &str = "peticao_previdenciaria.txt";

/// Write `text` to `dir/file_name`, replacing any previous export
pub fn export_text(dir: &Path, file_name: &str, text: &str) -> std::io::Result<PathBuf> {
    debug!(?dir, %file_name, text_len = text.len(), "export_text: called");
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, text)?;
    info!(path = %path.display(), "Exported petition");
    Ok(path)
}
