pub mod checkpoint;
pub mod output;

use anyhow::{Context, Result};
use std::path::Path;

// Commits go through a temp file in the same directory plus a rename, so an
// interrupted write never leaves a partial JSON document behind.
pub(crate) async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value).context("failed to serialize state to JSON")?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &json)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to move {} into place", tmp.display()))?;
    Ok(())
}
