//! Persisting uploaded images under the upload directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Reduce a client-supplied file name to `[A-Za-z0-9_.-]`, with no directory
/// components and no leading/trailing dots or underscores. Whitespace runs
/// become a single `_`. May return an empty string.
pub fn secure_filename(raw: &str) -> String {
    let flattened: String = raw
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    flattened
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_owned()
}

/// Name to store an upload under; random when nothing usable remains.
pub fn storage_name(client_name: Option<&str>) -> String {
    let safe = client_name.map(secure_filename).unwrap_or_default();
    if safe.is_empty() {
        format!("upload-{}", uuid::Uuid::new_v4())
    } else {
        safe
    }
}

/// Write `bytes` into `dir` and return the full path. Existing files with the
/// same name are replaced.
pub async fn save_upload(dir: &Path, client_name: Option<&str>, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;

    let path = dir.join(storage_name(client_name));
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to save upload to {}", path.display()))?;
    Ok(path)
}
