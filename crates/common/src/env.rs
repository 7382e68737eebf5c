//! Environment/runtime helpers
//!
//! Sanity checks to ensure the catalog data directory exists at startup.

use std::path::Path;

use tracing::{info, warn};

/// Ensure the parent directory of a file-backed catalog exists.
pub async fn ensure_data_dir(catalog_path: &Path) -> anyhow::Result<()> {
    let Some(dir) = catalog_path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if tokio::fs::metadata(dir).await.is_err() {
        warn!(dir = %dir.display(), "catalog data directory missing; creating it");
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", dir.display()))?;
    info!(dir = %dir.display(), "catalog data directory ready");
    Ok(())
}
