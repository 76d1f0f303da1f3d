//! Source registries: where document text comes from.
//!
//! A [`Registry`] answers three questions about a path relative to its root:
//! what is the text there ([`Registry::fetch`]), is there anything there
//! ([`Registry::exists`]) and what is inside this directory
//! ([`Registry::list`]).
//!
//! | Backend | Type | Notes |
//! |---|---|---|
//! | local directory | [`FileSystemRegistry`] | direct disk I/O |
//! | HTTP endpoint | [`HttpRegistry`] | auth header, response cache, 5xx retry |
//! | Git repository | [`GitRegistry`] | reads a managed clone from [`GitCacheManager`](crate::cache::GitCacheManager) |
//! | ordered fallback list | [`CompositeRegistry`] | first successful member wins |
//!
//! `fetch` reports a missing document as [`PrsError::FileNotFound`](crate::core::PrsError::FileNotFound).
//! `exists` and `list` are advisory: backend failures degrade to `false` and
//! an empty list instead of erroring.

mod composite;
mod fs;
mod git;
mod http;

pub use composite::CompositeRegistry;
pub use fs::FileSystemRegistry;
pub use git::GitRegistry;
pub use http::{HttpAuth, HttpRegistry, HttpRegistryOptions};

use anyhow::Result;
use async_trait::async_trait;

/// A backend serving document text by relative path.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Returns the text at `path`.
    ///
    /// # Errors
    ///
    /// Fails with `PrsError::FileNotFound` when nothing exists at `path`, or
    /// with the backend's own error (network, Git, I/O) otherwise.
    async fn fetch(&self, path: &str) -> Result<String>;

    /// Whether `path` exists. Never fails.
    async fn exists(&self, path: &str) -> bool;

    /// Entry names inside the directory `path`, in backend order. Never fails.
    async fn list(&self, path: &str) -> Vec<String>;

    /// Short description for log lines.
    fn describe(&self) -> String;
}

/// Normalizes a registry-relative path: forward slashes, no leading `./` or `/`.
pub(crate) fn clean_relative(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut trimmed = path.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }
    trimmed.trim_end_matches('/').to_string()
}
