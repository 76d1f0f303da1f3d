//! On-disk cache of Git clones used by the Git registry.
//!
//! Every `(url, ref)` pair maps to one directory, `<cache>/<cache_key>`, so
//! concurrent resolutions of the same dependency converge on a single clone.
//! Each entry holds the working tree plus a JSON sidecar
//! ([`CACHE_METADATA_FILE`]) describing where it came from and when it was
//! last refreshed.
//!
//! # Lifecycle
//!
//! [`GitCacheManager::ensure`] is the only way entries are created or updated:
//!
//! 1. **Valid hit** (`now - last_updated < ttl`): returned without touching
//!    the network.
//! 2. **Stale hit**: incremental update (fetch, checkout, hard reset). If that
//!    fails for any reason the entry is re-cloned instead.
//! 3. **Miss**: fresh clone pinned to the ref.
//!
//! Clones are made in a temporary sibling directory and renamed into place,
//! and all writes for one key happen under that key's [`CacheLock`], so a
//! reader never sees a half-written clone even across processes.
//!
//! ```rust,no_run
//! use prs_resolver::cache::GitCacheManager;
//! use prs_resolver::git::GitAuth;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = GitCacheManager::new("/tmp/prs-cache", Duration::from_secs(3600));
//! let fresh = cache.ensure("https://github.com/acme/prompts.git", "v1.0.0", &GitAuth::default()).await?;
//! println!("{} at {}", fresh.entry.path.display(), fresh.entry.metadata.commit_hash);
//! # Ok(())
//! # }
//! ```

pub mod lock;

pub use lock::CacheLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::constants::{CACHE_LOCKS_DIR, CACHE_METADATA_FILE, CACHE_SCHEMA_VERSION};
use crate::git::url::{cache_key, strip_auth_from_url};
use crate::git::{GitAuth, GitRepo, is_valid_git_repo};
use crate::utils::fs::{atomic_write, ensure_dir, get_directory_size};

const TEMP_PREFIX: &str = ".tmp-";

/// Contents of the metadata sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// Repository URL, credentials stripped
    pub url: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub commit_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Sidecar schema version
    pub version: u32,
}

impl CacheMetadata {
    #[must_use]
    pub fn new(url: &str, reference: &str, commit_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            url: strip_auth_from_url(url),
            reference: reference.to_string(),
            commit_hash: commit_hash.into(),
            created_at: now,
            last_updated: now,
            version: CACHE_SCHEMA_VERSION,
        }
    }
}

/// A cache directory with its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    /// Stale once `ttl` has elapsed since the last update, or when the
    /// sidecar was written by a different schema version.
    #[must_use]
    pub fn is_stale(&self, ttl: Duration) -> bool {
        if self.metadata.version != CACHE_SCHEMA_VERSION {
            return true;
        }
        let age = Utc::now().signed_duration_since(self.metadata.last_updated);
        match age.to_std() {
            Ok(age) => age >= ttl,
            // last_updated in the future: clock skew, treat as fresh
            Err(_) => false,
        }
    }
}

/// A fresh entry plus the lock that keeps it from changing while it is read.
#[derive(Debug)]
pub struct FreshEntry {
    pub entry: CacheEntry,
    _lock: CacheLock,
}

/// Counts of network operations performed by a manager.
#[derive(Debug, Default)]
pub struct CacheStats {
    clones: AtomicUsize,
    updates: AtomicUsize,
}

impl CacheStats {
    /// Full clones, including re-clones after a failed update.
    pub fn clones(&self) -> usize {
        self.clones.load(Ordering::Relaxed)
    }

    /// Incremental update attempts, successful or not.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::Relaxed)
    }
}

/// Manages the Git clone cache rooted at one directory.
///
/// Cloning the manager shares its statistics.
#[derive(Debug, Clone)]
pub struct GitCacheManager {
    cache_dir: PathBuf,
    ttl: Duration,
    stats: Arc<CacheStats>,
}

impl GitCacheManager {
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl,
            stats: Arc::new(CacheStats::default()),
        }
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Deterministic directory for `(url, reference)`.
    #[must_use]
    pub fn cache_path(&self, url: &str, reference: &str) -> PathBuf {
        self.cache_dir.join(cache_key(url, reference))
    }

    /// The entry for `(url, reference)` if it exists and its sidecar is readable.
    pub async fn get(&self, url: &str, reference: &str) -> Option<CacheEntry> {
        read_entry(&self.cache_path(url, reference)).await
    }

    /// True when the entry exists and is younger than the TTL.
    pub async fn is_valid(&self, url: &str, reference: &str) -> bool {
        self.get(url, reference).await.is_some_and(|entry| !entry.is_stale(self.ttl))
    }

    /// Commit checked out in the entry, if cached.
    pub async fn commit_hash(&self, url: &str, reference: &str) -> Option<String> {
        self.get(url, reference).await.map(|entry| entry.metadata.commit_hash)
    }

    /// Writes `metadata` into the entry directory atomically.
    pub async fn write_metadata(&self, entry_dir: &Path, metadata: &CacheMetadata) -> Result<()> {
        let json = serde_json::to_vec_pretty(metadata).context("Failed to serialize cache metadata")?;
        let path = entry_dir.join(CACHE_METADATA_FILE);
        tokio::task::spawn_blocking(move || atomic_write(&path, &json))
            .await
            .context("Failed to join metadata write task")?
    }

    /// Returns a fresh entry for `(url, reference)`, cloning or updating as needed.
    ///
    /// # Errors
    ///
    /// Returns the classified Git error of the final clone attempt. Update
    /// failures are never returned; they trigger a re-clone.
    pub async fn ensure(&self, url: &str, reference: &str, auth: &GitAuth) -> Result<FreshEntry> {
        let key = cache_key(url, reference);
        let path = self.cache_dir.join(&key);
        let shown = strip_auth_from_url(url);
        ensure_dir(&self.cache_dir)?;
        let lock = CacheLock::acquire(&self.cache_dir, &key).await?;

        if let Some(mut entry) = read_entry(&path).await
            && is_valid_git_repo(&path)
        {
            if !entry.is_stale(self.ttl) {
                tracing::debug!(target: "cache", "Cache hit for {}@{} ({})", shown, reference, key);
                return Ok(FreshEntry {
                    entry,
                    _lock: lock,
                });
            }

            tracing::debug!(target: "cache", "Cache entry for {}@{} is stale, updating", shown, reference);
            self.stats.updates.fetch_add(1, Ordering::Relaxed);
            let repo = GitRepo::new(&path);
            match repo.update_to_ref(url, reference, auth).await {
                Ok(()) => {
                    entry.metadata.commit_hash = repo.current_commit().await?;
                    entry.metadata.last_updated = Utc::now();
                    entry.metadata.version = CACHE_SCHEMA_VERSION;
                    self.write_metadata(&path, &entry.metadata).await?;
                    return Ok(FreshEntry {
                        entry,
                        _lock: lock,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        target: "cache",
                        "Update of {}@{} failed, re-cloning: {:#}",
                        shown,
                        reference,
                        e
                    );
                }
            }
        } else {
            tracing::debug!(target: "cache", "Cache miss for {}@{} ({})", shown, reference, key);
        }

        let entry = self.clone_into_place(url, reference, auth, &path).await?;
        Ok(FreshEntry {
            entry,
            _lock: lock,
        })
    }

    /// Discards the entry and clones it again.
    pub async fn refresh(&self, url: &str, reference: &str, auth: &GitAuth) -> Result<CacheEntry> {
        let key = cache_key(url, reference);
        let path = self.cache_dir.join(&key);
        ensure_dir(&self.cache_dir)?;
        let _lock = CacheLock::acquire(&self.cache_dir, &key).await?;
        self.clone_into_place(url, reference, auth, &path).await
    }

    async fn clone_into_place(
        &self,
        url: &str,
        reference: &str,
        auth: &GitAuth,
        path: &Path,
    ) -> Result<CacheEntry> {
        self.stats.clones.fetch_add(1, Ordering::Relaxed);
        let key = dir_name(path).unwrap_or_default();
        let temp = self.cache_dir.join(format!("{TEMP_PREFIX}{key}-{}", uuid::Uuid::new_v4().simple()));

        let result = async {
            let repo = GitRepo::clone_at_ref(url, reference, &temp, auth).await?;
            let metadata = CacheMetadata::new(url, reference, repo.current_commit().await?);
            self.write_metadata(&temp, &metadata).await?;

            if path.exists() {
                tokio::fs::remove_dir_all(path)
                    .await
                    .with_context(|| format!("Failed to remove old cache entry {}", path.display()))?;
            }
            tokio::fs::rename(&temp, path)
                .await
                .with_context(|| format!("Failed to move clone into {}", path.display()))?;
            Ok::<_, anyhow::Error>(metadata)
        }
        .await;

        match result {
            Ok(metadata) => {
                tracing::info!(
                    target: "cache",
                    "Cloned {}@{} at {}",
                    metadata.url,
                    reference,
                    metadata.commit_hash
                );
                Ok(CacheEntry {
                    path: path.to_path_buf(),
                    metadata,
                })
            }
            Err(e) => {
                if temp.exists() {
                    let _ = tokio::fs::remove_dir_all(&temp).await;
                }
                Err(e)
            }
        }
    }

    /// Removes the entry for `(url, reference)`.
    pub async fn remove(&self, url: &str, reference: &str) -> Result<()> {
        let key = cache_key(url, reference);
        let _lock = CacheLock::acquire(&self.cache_dir, &key).await?;
        remove_dir_if_exists(&self.cache_dir.join(key)).await
    }

    /// Every entry with a readable sidecar, sorted by path.
    pub async fn list_entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for dir in self.entry_dirs().await? {
            if let Some(entry) = read_entry(&dir).await {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Removes stale entries, entries without a readable sidecar and leftover
    /// temporary clones. Returns how many directories were removed.
    ///
    /// Each directory is removed under its key's lock, so this waits for any
    /// reader holding a [`FreshEntry`] for that key.
    pub async fn cleanup_stale(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in self.entry_dirs().await? {
            let Some(key) = dir_name(&dir) else {
                continue;
            };
            let _lock = CacheLock::acquire(&self.cache_dir, key).await?;
            let stale = read_entry(&dir).await.is_none_or(|entry| entry.is_stale(self.ttl));
            if stale && dir.exists() {
                remove_dir_if_exists(&dir).await?;
                removed += 1;
            }
        }
        for dir in self.temp_dirs().await? {
            if self.remove_temp_dir(&dir).await? {
                removed += 1;
            }
        }
        lock::cleanup_stale_locks(&self.cache_dir, self.ttl).await?;
        tracing::debug!(target: "cache", "Removed {} stale cache entries", removed);
        Ok(removed)
    }

    /// Removes every entry, each under its key's lock. Lock files are kept.
    pub async fn clear(&self) -> Result<()> {
        for dir in self.entry_dirs().await? {
            let Some(key) = dir_name(&dir) else {
                continue;
            };
            let _lock = CacheLock::acquire(&self.cache_dir, key).await?;
            remove_dir_if_exists(&dir).await?;
        }
        for dir in self.temp_dirs().await? {
            self.remove_temp_dir(&dir).await?;
        }
        tracing::debug!(target: "cache", "Cleared cache at {}", self.cache_dir.display());
        Ok(())
    }

    /// Removes a temporary clone once its key is no longer locked by a clone in
    /// progress. Returns whether it was still there.
    async fn remove_temp_dir(&self, dir: &Path) -> Result<bool> {
        let key = dir_name(dir)
            .and_then(|name| name.strip_prefix(TEMP_PREFIX))
            .and_then(|rest| rest.rsplit_once('-'))
            .map(|(key, _)| key);
        let _lock = match key {
            Some(key) => Some(CacheLock::acquire(&self.cache_dir, key).await?),
            None => None,
        };
        if !dir.exists() {
            return Ok(false);
        }
        remove_dir_if_exists(dir).await?;
        Ok(true)
    }

    /// Total bytes used by the cache directory.
    pub async fn size(&self) -> Result<u64> {
        get_directory_size(&self.cache_dir).await
    }

    async fn entry_dirs(&self) -> Result<Vec<PathBuf>> {
        self.child_dirs(|name| !name.starts_with('.')).await
    }

    async fn temp_dirs(&self) -> Result<Vec<PathBuf>> {
        self.child_dirs(|name| name.starts_with(TEMP_PREFIX)).await
    }

    async fn child_dirs(&self, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let mut dirs = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.cache_dir)
            .await
            .with_context(|| format!("Failed to read cache directory {}", self.cache_dir.display()))?;
        while let Some(child) = read_dir.next_entry().await? {
            let name = child.file_name().to_string_lossy().to_string();
            if name != CACHE_LOCKS_DIR && keep(&name) && child.file_type().await?.is_dir() {
                dirs.push(child.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

async fn read_entry(dir: &Path) -> Option<CacheEntry> {
    let raw = tokio::fs::read(dir.join(CACHE_METADATA_FILE)).await.ok()?;
    match serde_json::from_slice::<CacheMetadata>(&raw) {
        Ok(metadata) => Some(CacheEntry {
            path: dir.to_path_buf(),
            metadata,
        }),
        Err(e) => {
            tracing::debug!(target: "cache", "Ignoring unreadable metadata in {}: {}", dir.display(), e);
            None
        }
    }
}

fn dir_name(dir: &Path) -> Option<&str> {
    dir.file_name().and_then(|name| name.to_str())
}

async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", dir.display())),
    }
}
