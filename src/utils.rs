//! Filesystem helpers

use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use tokio::fs;

/// Creates `dir` and any missing parents. An existing directory is left alone.
pub async fn ensure_directory_exists(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    if fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }

    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    debug!("Created directory {}", dir.display());
    Ok(())
}
