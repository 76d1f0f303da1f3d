use anyhow::Result;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::{Registry, clean_relative};
use crate::core::{FileOperation, FileResultExt, PrsError};

/// Registry backed by a local directory.
#[derive(Debug, Clone)]
pub struct FileSystemRegistry {
    root: PathBuf,
}

impl FileSystemRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `path` onto the root, refusing anything that climbs out of it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = PathBuf::from(clean_relative(path));
        if relative.components().any(|c| matches!(c, Component::ParentDir | Component::Prefix(_))) {
            return Err(PrsError::FileSystemError {
                operation: "resolving".to_string(),
                path: path.to_string(),
                reason: format!("path escapes registry root {}", self.root.display()),
            }
            .into());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Registry for FileSystemRegistry {
    async fn fetch(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        tracing::trace!(target: "registry", "Reading {}", full.display());
        match tokio::fs::read_to_string(&full).await {
            Ok(text) => Ok(text),
            Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory) => {
                Err(PrsError::FileNotFound {
                    path: full.display().to_string(),
                }
                .into())
            }
            Err(e) => Err(e)
                .with_file_context(
                    FileOperation::Read,
                    &full,
                    "reading registry document",
                    "registry::fs::fetch",
                )
                .map_err(anyhow::Error::from),
        }
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(&full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn list(&self, path: &str) -> Vec<String> {
        let Ok(dir) = self.resolve(path) else {
            return Vec::new();
        };
        let Ok(mut read_dir) = tokio::fs::read_dir(&dir).await else {
            return Vec::new();
        };
        let mut names = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        names
    }

    fn describe(&self) -> String {
        format!("filesystem:{}", self.root.display())
    }
}
