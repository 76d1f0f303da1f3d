//! PromptScript resolver
//!
//! The resolution engine for PromptScript, a language for composing AI-agent
//! instruction documents from reusable fragments. Documents may inherit from a
//! parent, import ("use") blocks from other documents under an optional alias,
//! patch nested paths inside blocks with `extend`, and declare typed template
//! parameters. Fragments live on disk, behind an HTTP endpoint, or in a Git
//! repository.
//!
//! This crate turns an entry document into a single resolved tree with every
//! directive applied, plus the list of files that contributed and every error
//! found along the way. Parsing surface syntax, validating the result and
//! rendering it for a particular tool are left to the caller.
//!
//! # Architecture Overview
//!
//! Resolution is driven by the [`resolver::Resolver`]:
//!
//! ```text
//! Loader ──► Parser ──► bind/interpolate ──► inherit ──► use ──► extend ──► skills
//!   │                                           │          │
//!   └── Registry (fs / http / git / composite)  └──────────┴── recursive resolution
//! ```
//!
//! - The [`loader::Loader`] turns a reference such as `./tone`, `shared/base`
//!   or `@acme/security@v2` into an absolute location and fetches its text
//! - Registry locations are served by a [`registry::Registry`]; Git registries
//!   read from a managed clone kept by [`cache::GitCacheManager`]
//! - A [`parser::DocumentParser`] builds the [`ast::Document`] tree
//! - [`templating`] binds parameters and substitutes `{{name}}` placeholders
//! - [`merge`] implements the type-aware merges used by `inherit`, `use` and
//!   `extend`
//!
//! # Core Modules
//!
//! ## Document model
//! - [`ast`] - Document tree, content union and path references
//! - [`parser`] - Parser contract and a YAML-backed reference parser
//!
//! ## Resolution
//! - [`resolver`] - Orchestrator, resolved-document cache, native skills
//! - [`loader`] - Reference resolution and loading
//! - [`merge`] - Inheritance, import and extend merges
//! - [`templating`] - Parameter binding and interpolation
//!
//! ## Sources
//! - [`registry`] - File system, HTTP, Git and composite registries
//! - [`git`] - Git command wrapper, URL handling and failure classification
//! - [`cache`] - On-disk Git clone cache with TTL and cross-process locks
//!
//! ## Supporting Modules
//! - [`config`] - TOML configuration
//! - [`core`] - Error types and user-facing error context
//! - [`utils`] - File system helpers, backoff and environment expansion
//! - [`constants`] - Shared timeouts, limits and file names
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use prs_resolver::config::ResolverConfig;
//! use prs_resolver::parser::YamlDocumentParser;
//! use prs_resolver::resolver::Resolver;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ResolverConfig {
//!     local_path: "./prompts".into(),
//!     registry_path: "./prompts/registry".into(),
//!     ..ResolverConfig::default()
//! };
//! let resolver = Resolver::new(config, YamlDocumentParser::new())?;
//!
//! let result = resolver.resolve("agents/support").await;
//! if let Some(document) = &result.ast {
//!     for block in &document.blocks {
//!         println!("{}", block.name);
//!     }
//! }
//! for error in &result.errors {
//!     eprintln!("{error}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! The crate logs through `tracing` and never installs a subscriber. Targets:
//! `resolver`, `registry`, `cache`, `git` and `git::perf` (slow commands).
//!
//! ```bash
//! RUST_LOG=resolver=debug,git=debug my-tool build
//! ```

pub mod ast;
pub mod cache;
pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod loader;
pub mod merge;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod templating;
pub mod utils;

// test_utils is available in tests and when the test-utils feature is on
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
