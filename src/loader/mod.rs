//! Path/reference resolution and document loading.
//!
//! The [`Loader`] turns a [`PathReference`] written in a document into an
//! absolute location, then fetches the text at that location. Locations under
//! the registry root are served by the configured [`Registry`]; everything else
//! is read from disk.
//!
//! Resolution order for a reference found in `from`:
//!
//! 1. absolute paths pass through
//! 2. `@scope/name[@version]` resolves under the registry root; the version is
//!    dropped here because the backend (a Git ref) already selects it
//! 3. `./x` and `../x` resolve against the directory of `from`
//! 4. anything else resolves against the local project root
//!
//! Every resolved location carries the `.prs` extension.

use anyhow::Result;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::ast::PathReference;
use crate::constants::SOURCE_EXTENSION;
use crate::core::{FileOperation, FileResultExt, PrsError};
use crate::registry::Registry;
use crate::utils::expand_env_vars;

/// Resolves references and loads source text.
#[derive(Clone)]
pub struct Loader {
    local_path: PathBuf,
    registry_path: PathBuf,
    registry: Option<Arc<dyn Registry>>,
    expand_env: bool,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("local_path", &self.local_path)
            .field("registry_path", &self.registry_path)
            .field("registry", &self.registry.as_ref().map(|r| r.describe()))
            .field("expand_env", &self.expand_env)
            .finish()
    }
}

impl Loader {
    pub fn new(local_path: impl Into<PathBuf>, registry_path: impl Into<PathBuf>) -> Self {
        let local_path = normalize(&local_path.into());
        let registry_path = normalize(&registry_path.into());
        Self {
            local_path,
            registry_path,
            registry: None,
            expand_env: false,
        }
    }

    /// Serves locations under the registry root from `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Expands `${VAR}` / `${VAR:-default}` in loaded text.
    #[must_use]
    pub fn with_env_expansion(mut self, enabled: bool) -> Self {
        self.expand_env = enabled;
        self
    }

    #[must_use]
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    #[must_use]
    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    #[must_use]
    pub fn registry(&self) -> Option<&Arc<dyn Registry>> {
        self.registry.as_ref()
    }

    /// Resolves a top-level entry path given by a caller.
    ///
    /// Relative paths are taken against the local project root.
    #[must_use]
    pub fn resolve_entry(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.local_path.join(path)
        };
        with_extension(normalize(&joined))
    }

    /// Resolves a reference found in the document at `from`.
    ///
    /// The `@version` suffix of a registry reference is ignored, so `@a/b@v1`
    /// and `@a/b@v2` resolve to the same location. Pin versions with the ref
    /// of a Git registry instead.
    #[must_use]
    pub fn resolve_ref(&self, reference: &PathReference, from: &Path) -> PathBuf {
        let resolved = if reference.is_absolute() {
            PathBuf::from(&reference.raw)
        } else if let Some(namespace) = &reference.namespace {
            let mut path = self.registry_path.join(format!("@{namespace}"));
            for segment in &reference.segments {
                path.push(segment);
            }
            path
        } else if reference.is_relative {
            from.parent().unwrap_or_else(|| Path::new("")).join(&reference.raw)
        } else {
            self.local_path.join(&reference.raw)
        };
        with_extension(normalize(&resolved))
    }

    /// Path of `location` relative to the registry root, when it lies inside it.
    #[must_use]
    pub fn registry_relative(&self, location: &Path) -> Option<String> {
        self.registry.as_ref()?;
        let relative = location.strip_prefix(&self.registry_path).ok()?;
        Some(relative.to_string_lossy().replace('\\', "/"))
    }

    /// Loads the text at a resolved location.
    ///
    /// # Errors
    ///
    /// `PrsError::FileNotFound` when neither the registry nor the disk has the
    /// document; registry and I/O errors otherwise.
    pub async fn load(&self, location: &Path) -> Result<String> {
        let text = match (self.registry_relative(location), &self.registry) {
            (Some(relative), Some(registry)) => {
                tracing::debug!(target: "resolver", "Loading {} from {}", relative, registry.describe());
                registry.fetch(&relative).await?
            }
            _ => read_local(location).await?,
        };
        Ok(if self.expand_env {
            expand_env_vars(&text)
        } else {
            text
        })
    }

    /// Like [`load`](Self::load) but reports absence as `None`.
    pub async fn load_optional(&self, location: &Path) -> Result<Option<String>> {
        match self.load(location).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if matches!(PrsError::from_anyhow(&e), PrsError::FileNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

async fn read_local(location: &Path) -> Result<String> {
    tracing::trace!(target: "resolver", "Reading {}", location.display());
    match tokio::fs::read_to_string(location).await {
        Ok(text) => Ok(text),
        Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory) => {
            Err(PrsError::FileNotFound {
                path: location.display().to_string(),
            }
            .into())
        }
        Err(e) => Err(e)
            .with_file_context(FileOperation::Read, location, "reading source document", "loader::load")
            .map_err(anyhow::Error::from),
    }
}

/// Appends `.prs` unless the path already ends in it.
fn with_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
        path
    } else {
        let mut raw = path.into_os_string();
        raw.push(".");
        raw.push(SOURCE_EXTENSION);
        PathBuf::from(raw)
    }
}

/// Lexically removes `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
