use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dashmap::DashMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_retry::RetryIf;
use url::Url;

use super::{Registry, clean_relative};
use crate::constants::{DEFAULT_HTTP_CACHE_TTL, DEFAULT_HTTP_MAX_RETRIES, HTTP_INDEX_FILE, STARTING_BACKOFF_DELAY_MS};
use crate::core::PrsError;
use crate::utils::DoublingBackoff;

/// Credentials sent in the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAuth {
    Bearer(String),
    Basic { username: String, password: String },
}

impl HttpAuth {
    /// Value of the `Authorization` header.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            HttpAuth::Bearer(token) => format!("Bearer {token}"),
            HttpAuth::Basic {
                username,
                password,
            } => format!("Basic {}", STANDARD.encode(format!("{username}:{password}"))),
        }
    }
}

/// Tuning for [`HttpRegistry`].
#[derive(Debug, Clone)]
pub struct HttpRegistryOptions {
    pub auth: Option<HttpAuth>,
    /// How long a successful response is served from memory; zero disables caching
    pub cache_ttl: Duration,
    /// Retries after a 5xx response
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub initial_backoff: Duration,
    pub timeout: Duration,
}

impl Default for HttpRegistryOptions {
    fn default() -> Self {
        Self {
            auth: None,
            cache_ttl: DEFAULT_HTTP_CACHE_TTL,
            max_retries: DEFAULT_HTTP_MAX_RETRIES,
            initial_backoff: Duration::from_millis(STARTING_BACKOFF_DELAY_MS),
            timeout: Duration::from_secs(30),
        }
    }
}

struct CachedResponse {
    body: String,
    fetched_at: Instant,
}

/// Outcome of one request attempt; only `Retryable` is retried.
#[derive(Debug)]
enum AttemptError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

impl AttemptError {
    fn into_inner(self) -> anyhow::Error {
        match self {
            AttemptError::Retryable(e) | AttemptError::Fatal(e) => e,
        }
    }
}

/// Registry served over HTTP(S). Paths are resolved against the base URL.
pub struct HttpRegistry {
    base_url: Url,
    client: Client,
    options: HttpRegistryOptions,
    cache: DashMap<String, CachedResponse>,
    requests: AtomicUsize,
}

impl HttpRegistry {
    /// Creates a registry rooted at `base_url`. A trailing `/` is added if missing.
    pub fn new(base_url: &str, options: HttpRegistryOptions) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized).map_err(|e| PrsError::ConfigError {
            message: format!("Invalid registry URL '{base_url}': {e}"),
        })?;
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("prs-resolver/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url,
            client,
            options,
            cache: DashMap::new(),
            requests: AtomicUsize::new(0),
        })
    }

    /// Number of HTTP requests sent, retries included.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(&clean_relative(path))
            .with_context(|| format!("Invalid registry path '{path}'"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.options.auth {
            Some(auth) => request.header(reqwest::header::AUTHORIZATION, auth.header_value()),
            None => request,
        }
    }

    async fn get_once(&self, url: &Url) -> Result<String, AttemptError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let response = self
            .authorize(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|e| {
                AttemptError::Fatal(
                    PrsError::NetworkError {
                        operation: format!("GET {url}"),
                        reason: e.to_string(),
                    }
                    .into(),
                )
            })?;

        let status = response.status();
        if status.is_success() {
            return response.text().await.map_err(|e| {
                AttemptError::Fatal(
                    PrsError::NetworkError {
                        operation: format!("GET {url}"),
                        reason: format!("failed to read body: {e}"),
                    }
                    .into(),
                )
            });
        }

        let error = if status == StatusCode::NOT_FOUND {
            PrsError::FileNotFound {
                path: url.to_string(),
            }
        } else {
            PrsError::NetworkError {
                operation: format!("GET {url}"),
                reason: format!("HTTP {status}"),
            }
        };
        if status.is_server_error() {
            tracing::debug!(target: "registry", "GET {} returned {}, will retry", url, status);
            Err(AttemptError::Retryable(error.into()))
        } else {
            Err(AttemptError::Fatal(error.into()))
        }
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        let key = url.to_string();
        if !self.options.cache_ttl.is_zero()
            && let Some(cached) = self.cache.get(&key)
            && cached.fetched_at.elapsed() < self.options.cache_ttl
        {
            tracing::trace!(target: "registry", "Serving {} from response cache", key);
            return Ok(cached.body.clone());
        }

        let strategy = DoublingBackoff::new(self.options.initial_backoff, self.options.max_retries as usize);
        let body = RetryIf::spawn(
            strategy,
            || self.get_once(url),
            |e: &AttemptError| matches!(e, AttemptError::Retryable(_)),
        )
        .await
        .map_err(AttemptError::into_inner)?;

        if !self.options.cache_ttl.is_zero() {
            self.cache.insert(
                key,
                CachedResponse {
                    body: body.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }
        Ok(body)
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn fetch(&self, path: &str) -> Result<String> {
        let url = self.url_for(path)?;
        tracing::debug!(target: "registry", "Fetching {}", url);
        self.get_text(&url).await
    }

    async fn exists(&self, path: &str) -> bool {
        let Ok(url) = self.url_for(path) else {
            return false;
        };
        if self.cache.contains_key(url.as_str()) {
            return true;
        }
        self.requests.fetch_add(1, Ordering::Relaxed);
        match self.authorize(self.client.head(url.clone())).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(target: "registry", "HEAD {} failed: {}", url, e);
                false
            }
        }
    }

    async fn list(&self, path: &str) -> Vec<String> {
        let dir = clean_relative(path);
        let index = if dir.is_empty() {
            HTTP_INDEX_FILE.to_string()
        } else {
            format!("{dir}/{HTTP_INDEX_FILE}")
        };
        let result = async {
            let url = self.url_for(&index)?;
            let body = self.get_text(&url).await?;
            serde_json::from_str::<Vec<String>>(&body).with_context(|| format!("Invalid directory index at {url}"))
        }
        .await;
        result.unwrap_or_else(|e| {
            tracing::debug!(target: "registry", "Listing {} failed: {:#}", path, e);
            Vec::new()
        })
    }

    fn describe(&self) -> String {
        format!("http:{}", self.base_url)
    }
}
