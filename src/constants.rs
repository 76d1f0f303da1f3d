//! Global constants used throughout the resolver.
//!
//! This module contains timeout durations, retry parameters, file names and
//! other values that are shared across modules. Defining them centrally keeps
//! magic numbers discoverable.

use std::time::Duration;

/// Canonical extension of PromptScript source files (without the dot).
pub const SOURCE_EXTENSION: &str = "prs";

/// Name of the metadata sidecar written inside every Git cache entry.
pub const CACHE_METADATA_FILE: &str = ".prs-cache.json";

/// Schema version stamped into cache metadata sidecars.
///
/// Entries written with a different version are treated as stale.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Directory under the cache root that holds per-key lock files.
pub const CACHE_LOCKS_DIR: &str = ".locks";

/// Default time-to-live for Git cache entries.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default time-to-live for cached HTTP registry responses.
pub const DEFAULT_HTTP_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Default Git ref used when a registry does not name one.
pub const DEFAULT_GIT_REF: &str = "main";

/// Depth used for pinned shallow clones.
pub const SHALLOW_CLONE_DEPTH: u32 = 1;

/// Timeout for Git fetch operations.
pub const GIT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for Git clone operations.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of retries after an HTTP 5xx response.
pub const DEFAULT_HTTP_MAX_RETRIES: u32 = 3;

/// Initial delay before the first HTTP retry, in milliseconds.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 100;

/// Upper bound for a single backoff delay, in milliseconds.
pub const MAX_BACKOFF_DELAY_MS: u64 = 10_000;

/// Resource fetched by `HttpRegistry::list` inside a directory.
pub const HTTP_INDEX_FILE: &str = "index.json";

/// Native skill definition file name.
pub const SKILL_FILE: &str = "SKILL.md";

/// Directory (relative to a registry root or a source file) holding native skills.
pub const SKILLS_DIR: &str = "skills";

/// Name of the block whose entries the skills pass enriches.
pub const SKILLS_BLOCK: &str = "skills";

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "PRS_CACHE_DIR";
