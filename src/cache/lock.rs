//! Cross-process locks for cache entries.
//!
//! Resolutions running in different processes can ask for the same
//! `(url, ref)` at the same time. Clone, update and metadata writes for one
//! cache key happen while holding that key's exclusive file lock, stored at
//! `<cache>/.locks/<key>.lock`. The lock is released when the guard drops.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::constants::CACHE_LOCKS_DIR;

/// Exclusive lock on one cache key.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Blocks (off the async runtime) until the lock for `key` is held.
    pub async fn acquire(cache_dir: &Path, key: &str) -> Result<Self> {
        let locks_dir = cache_dir.join(CACHE_LOCKS_DIR);
        tokio::fs::create_dir_all(&locks_dir)
            .await
            .with_context(|| format!("Failed to create locks directory {}", locks_dir.display()))?;

        let lock_path = locks_dir.join(format!("{key}.lock"));
        let open_path = lock_path.clone();
        let key = key.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&open_path)
                .with_context(|| format!("Failed to open lock file: {}", open_path.display()))?;
            file.lock_exclusive().with_context(|| format!("Failed to acquire cache lock for {key}"))?;
            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::trace!(target: "cache", "Acquired lock {}", lock_path.display());
        Ok(Self {
            file,
            path: lock_path,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(target: "cache", "Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

/// Removes lock files not touched for longer than `ttl`. Returns how many were removed.
///
/// A lock file is only unlinked while this call holds it, so a lock another
/// guard still holds is never removed.
pub async fn cleanup_stale_locks(cache_dir: &Path, ttl: Duration) -> Result<usize> {
    let locks_dir = cache_dir.join(CACHE_LOCKS_DIR);
    if !locks_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    let now = SystemTime::now();
    let mut entries = tokio::fs::read_dir(&locks_dir).await.context("Failed to read locks directory")?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("lock") {
            continue;
        }
        let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
            continue;
        };
        if !now.duration_since(modified).is_ok_and(|age| age > ttl) {
            continue;
        }
        let unlinked = tokio::task::spawn_blocking(move || remove_if_unheld(&path))
            .await
            .context("Failed to spawn blocking task for lock cleanup")?;
        if unlinked {
            removed += 1;
        }
    }

    Ok(removed)
}

fn remove_if_unheld(path: &Path) -> bool {
    let Ok(file) = OpenOptions::new().write(true).open(path) else {
        return false;
    };
    match file.try_lock_exclusive() {
        Ok(true) => {
            let unlinked = std::fs::remove_file(path).is_ok();
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!(target: "cache", "Failed to unlock {}: {}", path.display(), e);
            }
            unlinked
        }
        Ok(false) | Err(_) => {
            tracing::debug!(target: "cache", "Lock {} is held; kept", path.display());
            false
        }
    }
}
