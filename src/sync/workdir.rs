//! Transient working directory for one pipeline run.
//!
//! The directory name incorporates the owning project's identifier, a
//! timestamp, and a random token, so concurrently-started runs for
//! different projects never collide. Release retries removal because some
//! host filesystems hold a brief lock on recently-written files and the
//! first removal attempts can silently fail.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{CleanupError, SyncError};
use crate::retry::{RetryPolicy, retry};

/// An owned handle to the run's working directory. Acquiring creates the
/// directory; the only supported removal path is `release`. If a handle is
/// dropped without release (early return, panic in the caller), `Drop`
/// makes one best-effort synchronous removal so directories are not leaked
/// silently.
#[derive(Debug)]
pub struct Workdir {
    path: PathBuf,
    released: bool,
}

impl Workdir {
    /// Create a uniquely-named working directory under `root`.
    pub async fn acquire(root: &Path, hint: &str) -> Result<Self, SyncError> {
        let token = Uuid::new_v4().simple().to_string();
        let name = format!(
            "sm-sync-{}-{}-{}",
            hint,
            chrono::Utc::now().timestamp_millis(),
            &token[..8]
        );
        let path = root.join(name);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| SyncError::WorkdirCreate {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "acquired working directory");
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory, retrying per `policy`. Succeeds immediately if
    /// the directory is already gone. A removal call that returns but
    /// leaves the directory in place is treated as a transient fault and
    /// retried.
    pub async fn release(mut self, policy: RetryPolicy) -> Result<(), CleanupError> {
        self.released = true;
        let path = self.path.clone();

        let result = retry(policy, |attempt| {
            let path = path.clone();
            async move {
                if !tokio::fs::try_exists(&path).await.unwrap_or(true) {
                    return Ok(());
                }
                debug!(path = %path.display(), attempt, "removing working directory");
                let removal = tokio::fs::remove_dir_all(&path).await;
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    // Removal reported success (or a transient error) but
                    // the directory survived; try again after the delay.
                    warn!(
                        path = %path.display(),
                        attempt,
                        "working directory still present after removal attempt"
                    );
                    return Err(removal.err());
                }
                Ok(())
            }
        })
        .await;

        result.map_err(|last: Option<std::io::Error>| CleanupError {
            path,
            attempts: policy.max_attempts.max(1),
            source: last,
        })
    }
}

impl Drop for Workdir {
    fn drop(&mut self) {
        if self.released || !self.path.exists() {
            return;
        }
        warn!(path = %self.path.display(), "working directory dropped without release");
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "best-effort removal failed");
        }
    }
}
