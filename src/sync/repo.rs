//! Repository acquisition.
//!
//! Cloning is a single opaque external call. Any fault is classified as
//! `SyncError::Clone` and is fatal to the run; retrying is the caller's
//! decision, not ours.

use std::path::Path;

use tracing::info;

use crate::errors::SyncError;

/// Clone `url` into `destination`. git2 is synchronous, so the clone runs
/// on the blocking pool.
pub async fn clone_repository(url: &str, destination: &Path) -> Result<(), SyncError> {
    info!(url, dest = %destination.display(), "cloning repository");
    let url_owned = url.to_string();
    let dest = destination.to_path_buf();

    let result = tokio::task::spawn_blocking(move || {
        git2::Repository::clone(&url_owned, &dest).map(|_| ())
    })
    .await
    .map_err(|e| SyncError::Other(anyhow::anyhow!("Clone task panicked: {}", e)))?;

    result.map_err(|source| SyncError::Clone {
        url: url.to_string(),
        source,
    })
}
