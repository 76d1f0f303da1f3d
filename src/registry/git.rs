use anyhow::Result;
use async_trait::async_trait;
use std::path::{Component, PathBuf};

use super::{Registry, clean_relative};
use crate::cache::{FreshEntry, GitCacheManager};
use crate::constants::CACHE_METADATA_FILE;
use crate::core::PrsError;
use crate::git::GitAuth;
use crate::git::url::strip_auth_from_url;

/// Registry backed by a Git repository at a fixed ref.
///
/// Every operation first asks the [`GitCacheManager`] for a fresh clone
/// (cloning or updating as the TTL dictates) and then reads the working tree,
/// optionally below a sub-directory of the repository.
///
/// ```rust,no_run
/// use prs_resolver::cache::GitCacheManager;
/// use prs_resolver::git::GitAuth;
/// use prs_resolver::registry::{GitRegistry, Registry};
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let cache = GitCacheManager::new("/tmp/prs-cache", Duration::from_secs(3600));
/// let registry = GitRegistry::new("https://github.com/acme/prompts.git", "v1.0.0", cache)
///     .with_subpath("registry")
///     .with_auth(GitAuth { token: std::env::var("GITHUB_TOKEN").ok(), ssh_key: None });
/// let text = registry.fetch("acme/base.prs").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GitRegistry {
    url: String,
    reference: String,
    subpath: Option<String>,
    auth: GitAuth,
    cache: GitCacheManager,
}

impl GitRegistry {
    pub fn new(url: impl Into<String>, reference: impl Into<String>, cache: GitCacheManager) -> Self {
        Self {
            url: url.into(),
            reference: reference.into(),
            subpath: None,
            auth: GitAuth::default(),
            cache,
        }
    }

    /// Serves documents from a sub-directory of the repository.
    #[must_use]
    pub fn with_subpath(mut self, subpath: impl AsRef<str>) -> Self {
        let cleaned = clean_relative(subpath.as_ref());
        self.subpath = (!cleaned.is_empty()).then_some(cleaned);
        self
    }

    #[must_use]
    pub fn with_auth(mut self, auth: GitAuth) -> Self {
        self.auth = auth;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    #[must_use]
    pub fn cache(&self) -> &GitCacheManager {
        &self.cache
    }

    /// Full clones performed through this registry's cache manager.
    pub fn clones(&self) -> usize {
        self.cache.stats().clones()
    }

    /// Incremental updates attempted through this registry's cache manager.
    pub fn updates(&self) -> usize {
        self.cache.stats().updates()
    }

    /// Commit of the cached clone, if one exists.
    pub async fn commit_hash(&self) -> Option<String> {
        self.cache.commit_hash(&self.url, &self.reference).await
    }

    /// Forces a fresh clone regardless of the TTL.
    pub async fn refresh(&self) -> Result<()> {
        self.cache.refresh(&self.url, &self.reference, &self.auth).await?;
        Ok(())
    }

    async fn fresh(&self) -> Result<FreshEntry> {
        self.cache.ensure(&self.url, &self.reference, &self.auth).await
    }

    fn tree_path(&self, fresh: &FreshEntry, path: &str) -> Result<PathBuf> {
        let relative = PathBuf::from(clean_relative(path));
        if relative.components().any(|c| matches!(c, Component::ParentDir | Component::Prefix(_))) {
            return Err(PrsError::FileSystemError {
                operation: "resolving".to_string(),
                path: path.to_string(),
                reason: format!("path escapes repository {}", strip_auth_from_url(&self.url)),
            }
            .into());
        }
        let mut full = fresh.entry.path.clone();
        if let Some(subpath) = &self.subpath {
            full.push(subpath);
        }
        Ok(full.join(relative))
    }
}

#[async_trait]
impl Registry for GitRegistry {
    async fn fetch(&self, path: &str) -> Result<String> {
        let fresh = self.fresh().await?;
        let full = self.tree_path(&fresh, path)?;
        tracing::trace!(target: "registry", "Reading {} from {}", path, self.describe());
        match tokio::fs::read_to_string(&full).await {
            Ok(text) => Ok(text),
            Err(_) => Err(PrsError::FileNotFound {
                path: format!("{}@{}:{}", strip_auth_from_url(&self.url), self.reference, clean_relative(path)),
            }
            .into()),
        }
    }

    async fn exists(&self, path: &str) -> bool {
        match self.fresh().await {
            Ok(fresh) => match self.tree_path(&fresh, path) {
                Ok(full) => tokio::fs::try_exists(&full).await.unwrap_or(false),
                Err(_) => false,
            },
            Err(e) => {
                tracing::debug!(target: "registry", "exists({}) on {} failed: {:#}", path, self.describe(), e);
                false
            }
        }
    }

    async fn list(&self, path: &str) -> Vec<String> {
        let fresh = match self.fresh().await {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::debug!(target: "registry", "list({}) on {} failed: {:#}", path, self.describe(), e);
                return Vec::new();
            }
        };
        let Ok(dir) = self.tree_path(&fresh, path) else {
            return Vec::new();
        };
        let Ok(mut read_dir) = tokio::fs::read_dir(&dir).await else {
            return Vec::new();
        };
        let mut names = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if name != ".git" && name != CACHE_METADATA_FILE {
                names.push(name);
            }
        }
        names.sort();
        names
    }

    fn describe(&self) -> String {
        format!("git:{}@{}", strip_auth_from_url(&self.url), self.reference)
    }
}
