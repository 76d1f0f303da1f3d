//! Resolver configuration.
//!
//! [`ResolverConfig`] carries everything resolution needs from its caller:
//! where local documents and the registry root live, how the Git cache
//! behaves, and which registry backends serve `@scope/...` references. It is
//! usually read from a TOML file but can be built in code.
//!
//! # Example
//!
//! ```toml
//! local_path = "."
//! registry_path = "./registry"
//! expand_env = true
//!
//! [cache]
//! dir = "~/.promptscript/cache"
//! ttl_secs = 3600
//!
//! [[registries]]
//! type = "git"
//! url = "https://github.com/org/prompts.git"
//! ref = "main"
//! path = "registry"
//! [registries.auth]
//! token_env = "GITHUB_TOKEN"
//!
//! [[registries]]
//! type = "http"
//! url = "https://prompts.example.com/registry/"
//! cache_ttl_secs = 300
//! [registries.auth]
//! bearer = "..."
//! [registries.retry]
//! max_retries = 3
//! initial_backoff_ms = 100
//!
//! [[registries]]
//! type = "filesystem"
//! path = "./vendor/prompts"
//! ```
//!
//! One registry is used as-is; several are consulted in declaration order
//! through a [`CompositeRegistry`].
//!
//! # Cache directory
//!
//! `PRS_CACHE_DIR` overrides `cache.dir`, which overrides the default
//! `~/.promptscript/cache`. `~` and `$VAR` are expanded.
//!
//! # Credentials
//!
//! Git tokens are taken from `token`, then from the environment variable named
//! by `token_env`. Tokens are injected into clone URLs only for the duration of
//! a Git command and never logged. SSH keys are passed through
//! `GIT_SSH_COMMAND`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::GitCacheManager;
use crate::constants::{DEFAULT_CACHE_TTL, DEFAULT_GIT_REF, DEFAULT_HTTP_MAX_RETRIES, STARTING_BACKOFF_DELAY_MS};
use crate::core::PrsError;
use crate::git::GitAuth;
use crate::registry::{
    CompositeRegistry, FileSystemRegistry, GitRegistry, HttpAuth, HttpRegistry, HttpRegistryOptions, Registry,
};
use crate::utils::{expand_path, get_cache_dir};

/// Top-level resolver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Root for bare local references and relative entry paths
    pub local_path: PathBuf,
    /// Root that `@scope/...` references resolve under
    pub registry_path: PathBuf,
    /// Expand `${VAR}` / `${VAR:-default}` in source text before parsing
    pub expand_env: bool,
    pub cache: CacheSettings,
    pub registries: Vec<RegistryConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            local_path: PathBuf::from("."),
            registry_path: PathBuf::from("./registry"),
            expand_env: true,
            cache: CacheSettings::default(),
            registries: Vec::new(),
        }
    }
}

/// `[cache]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: Option<String>,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

/// One `[[registries]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegistryConfig {
    Git {
        url: String,
        #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
        /// Sub-directory of the repository that holds documents
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default)]
        auth: GitAuthConfig,
    },
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_ttl_secs: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth: Option<HttpAuthConfig>,
        #[serde(default)]
        retry: RetryConfig,
    },
    Filesystem {
        path: String,
    },
}

/// Git credentials. `token` takes precedence over `token_env`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitAuthConfig {
    pub token: Option<String>,
    pub token_env: Option<String>,
    pub ssh_key: Option<String>,
}

impl GitAuthConfig {
    /// Resolves tokens from the environment and expands the key path.
    pub fn resolve(&self) -> Result<GitAuth> {
        let token = match (&self.token, &self.token_env) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(var)) => match std::env::var(var) {
                Ok(value) if !value.trim().is_empty() => Some(value),
                _ => {
                    tracing::warn!(target: "registry", "Token variable {} is not set; continuing without a token", var);
                    None
                }
            },
            (None, None) => None,
        };
        let ssh_key = self.ssh_key.as_deref().map(expand_path).transpose()?;
        Ok(GitAuth {
            token,
            ssh_key,
        })
    }
}

/// HTTP credentials: `bearer`, or `username` with `password`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpAuthConfig {
    pub bearer: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl HttpAuthConfig {
    pub fn resolve(&self) -> Result<Option<HttpAuth>> {
        match (&self.bearer, &self.username, &self.password) {
            (Some(token), None, None) => Ok(Some(HttpAuth::Bearer(token.clone()))),
            (None, Some(username), Some(password)) => Ok(Some(HttpAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            })),
            (None, None, None) => Ok(None),
            _ => Err(PrsError::ConfigError {
                message: "HTTP auth takes either 'bearer' or both 'username' and 'password'".to_string(),
            }
            .into()),
        }
    }
}

/// `[registries.retry]` table for HTTP registries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_HTTP_MAX_RETRIES,
            initial_backoff_ms: STARTING_BACKOFF_DELAY_MS,
        }
    }
}

impl ResolverConfig {
    /// Reads a TOML file. Relative paths inside it are taken against the
    /// file's directory.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read resolver config from {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse resolver config from {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.relative_to(base))
    }

    /// Parses TOML text and validates it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| PrsError::ConfigError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Re-roots relative `local_path`, `registry_path` and filesystem
    /// registry paths under `base`.
    #[must_use]
    pub fn relative_to(mut self, base: &Path) -> Self {
        let rebase = |p: &Path| if p.is_relative() { base.join(p) } else { p.to_path_buf() };
        self.local_path = rebase(&self.local_path);
        self.registry_path = rebase(&self.registry_path);
        for registry in &mut self.registries {
            if let RegistryConfig::Filesystem {
                path,
            } = registry
                && !path.starts_with('~')
                && !path.starts_with('$')
                && Path::new(path.as_str()).is_relative()
            {
                *path = base.join(path.as_str()).display().to_string();
            }
        }
        self
    }

    /// Checks values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<()> {
        for registry in &self.registries {
            match registry {
                RegistryConfig::Git {
                    url, ..
                } if url.trim().is_empty() => {
                    return Err(config_error("git registry needs a 'url'"));
                }
                RegistryConfig::Http {
                    url,
                    auth,
                    ..
                } => {
                    if url.trim().is_empty() {
                        return Err(config_error("http registry needs a 'url'"));
                    }
                    if let Some(auth) = auth {
                        auth.resolve()?;
                    }
                }
                RegistryConfig::Filesystem {
                    path,
                } if path.trim().is_empty() => {
                    return Err(config_error("filesystem registry needs a 'path'"));
                }
                _ => {}
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// The Git cache directory after `PRS_CACHE_DIR` and `~` handling.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        get_cache_dir(self.cache.dir.as_deref())
    }

    pub fn cache_manager(&self) -> Result<GitCacheManager> {
        Ok(GitCacheManager::new(self.cache_dir()?, self.cache_ttl()))
    }

    /// Builds the configured registries, sharing `cache` between Git entries.
    ///
    /// Returns `None` when no registry is configured.
    pub fn build_registry(&self, cache: &GitCacheManager) -> Result<Option<Arc<dyn Registry>>> {
        let mut members: Vec<Arc<dyn Registry>> = Vec::with_capacity(self.registries.len());
        for registry in &self.registries {
            members.push(build_one(registry, cache)?);
        }
        Ok(match members.len() {
            0 => None,
            1 => members.pop(),
            _ => Some(Arc::new(CompositeRegistry::new(members))),
        })
    }
}

fn build_one(config: &RegistryConfig, cache: &GitCacheManager) -> Result<Arc<dyn Registry>> {
    Ok(match config {
        RegistryConfig::Git {
            url,
            reference,
            path,
            auth,
        } => {
            let mut registry = GitRegistry::new(url, reference.as_deref().unwrap_or(DEFAULT_GIT_REF), cache.clone())
                .with_auth(auth.resolve()?);
            if let Some(path) = path {
                registry = registry.with_subpath(path);
            }
            Arc::new(registry)
        }
        RegistryConfig::Http {
            url,
            cache_ttl_secs,
            timeout_secs,
            auth,
            retry,
        } => {
            let defaults = HttpRegistryOptions::default();
            let options = HttpRegistryOptions {
                auth: auth.as_ref().map(HttpAuthConfig::resolve).transpose()?.flatten(),
                cache_ttl: cache_ttl_secs.map_or(defaults.cache_ttl, Duration::from_secs),
                max_retries: retry.max_retries,
                initial_backoff: Duration::from_millis(retry.initial_backoff_ms),
                timeout: timeout_secs.map_or(defaults.timeout, Duration::from_secs),
            };
            Arc::new(HttpRegistry::new(url, options)?)
        }
        RegistryConfig::Filesystem {
            path,
        } => Arc::new(FileSystemRegistry::new(expand_path(path)?)),
    })
}

fn config_error(message: &str) -> anyhow::Error {
    PrsError::ConfigError {
        message: message.to_string(),
    }
    .into()
}
