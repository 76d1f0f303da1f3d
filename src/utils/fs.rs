//! Filesystem helpers for the on-disk cache.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::constants::CACHE_DIR_ENV;
use crate::core::{FileOperation, FileResultExt};

/// Creates `path` and its parents. Fails if `path` exists and is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_file_context(
            FileOperation::CreateDir,
            path,
            "creating directory",
            "utils::fs::ensure_dir",
        )?;
    } else if !path.is_dir() {
        anyhow::bail!("Path exists but is not a directory: {}", path.display());
    }
    Ok(())
}

/// Writes `content` to a sibling temp file, syncs it and renames it over `path`.
///
/// Readers see either the old or the new content, never a partial write.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    {
        let mut file = fs::File::create(&temp_path).with_file_context(
            FileOperation::Write,
            &temp_path,
            "creating temp file for atomic write",
            "utils::fs::atomic_write",
        )?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().context("Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path).with_file_context(
        FileOperation::Rename,
        path,
        "replacing file with temp file",
        "utils::fs::atomic_write",
    )?;
    Ok(())
}

/// Total size in bytes of every regular file under `path`.
///
/// Symlinks are not followed. A missing directory has size zero.
pub fn dir_size(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let mut total = 0;
    for entry in walkdir::WalkDir::new(path).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
        if entry.file_type().is_file() {
            total += entry
                .metadata()
                .with_context(|| format!("Failed to read metadata of {}", entry.path().display()))?
                .len();
        }
    }
    Ok(total)
}

/// Async wrapper around [`dir_size`] that runs on the blocking pool.
pub async fn get_directory_size(path: &Path) -> Result<u64> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || dir_size(&path))
        .await
        .context("Failed to join directory size task")?
}

/// Locates the Git cache directory.
///
/// Order: the `PRS_CACHE_DIR` environment variable, then `configured`, then
/// `~/.promptscript/cache`. `~` and `$VAR` are expanded. The directory is
/// not created.
pub fn get_cache_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return expand_path(&dir);
    }
    if let Some(dir) = configured {
        return expand_path(dir);
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
    Ok(home.join(".promptscript").join("cache"))
}

/// Expands `~` and environment variables in a configured path.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(raw).with_context(|| format!("Failed to expand path '{raw}'"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
