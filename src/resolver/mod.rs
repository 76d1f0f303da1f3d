//! Resolution orchestrator.
//!
//! The [`Resolver`] turns an entry document into a fully resolved tree: no
//! `inherit`, `use` or `extend` directives left, parameters substituted, native
//! skills applied. Every document on the way goes through the same pipeline:
//!
//! 1. **Load**: resolve the reference to an absolute location and fetch its
//!    text through the [`Loader`] (registry or disk)
//! 2. **Parse**: hand the text to the configured [`DocumentParser`]
//! 3. **Bind and interpolate**: build bindings from the document's declared
//!    params and the arguments it was referenced with, then substitute its own
//!    placeholders. Content from other documents is not merged in yet, so a
//!    substituted value is never scanned again
//! 4. **Inherit**: resolve the parent through the full pipeline and merge it
//!    underneath the document
//! 5. **Import**: resolve each `use` in declaration order and merge it under
//!    import rules, recording aliases
//! 6. **Extend**: apply each `extend` in order, including `alias.block` patches
//! 7. **Skills**: substitute native `SKILL.md` definitions
//!
//! # Errors
//!
//! Errors are collected, not thrown. A failing parent or import is recorded in
//! [`ResolutionResult::errors`] and the rest of the tree is still built. Only
//! three things leave the result without a tree: the entry document cannot be
//! loaded, the entry document does not parse, or a cycle is found anywhere.
//!
//! # Cycles
//!
//! Each top-level call keeps a stack of the documents being resolved. Meeting
//! a location that is already on the stack, through `inherit` or `use`,
//! records [`PrsError::CircularDependency`] with the chain from its first
//! occurrence and aborts the whole resolution.
//!
//! # Caching
//!
//! Resolved documents are memoized in a [`ResolvedCache`] keyed by location
//! and arguments. The cache is shared by clones of the resolver and can be
//! injected, so several resolvers (or tests) can observe the same entries.
//!
//! # Example
//!
//! ```rust,no_run
//! use prs_resolver::config::ResolverConfig;
//! use prs_resolver::resolver::Resolver;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ResolverConfig::load_from(Path::new("prs.toml")).await?;
//! let resolver = Resolver::builder().config(config).build()?;
//!
//! let result = resolver.resolve("agents/reviewer").await;
//! for error in &result.errors {
//!     eprintln!("{error}");
//! }
//! if let Some(document) = result.ast {
//!     println!("{} blocks from {} files", document.blocks.len(), result.sources.len());
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod skills;


pub use cache::{CachedResolution, ResolvedCache};
pub use skills::{NativeSkill, apply_skills};

use anyhow::Result;
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ast::{Document, ParamArgument, SourceLocation};
use crate::cache::GitCacheManager;
use crate::config::ResolverConfig;
use crate::core::{PrsError, ResolveError};
use crate::loader::Loader;
use crate::merge::{AliasTable, apply_extends, merge_import, merge_inheritance};
use crate::parser::{DocumentParser, YamlDocumentParser};
use crate::registry::Registry;
use crate::templating::{bind_params, first_template_expression, interpolate_document};

/// Outcome of one top-level resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionResult {
    /// The resolved tree; `None` when resolution failed outright
    pub ast: Option<Document>,
    /// Every error recorded, in the order it was found
    pub errors: Vec<ResolveError>,
    /// Files that contributed, de-duplicated, in first-read order
    pub sources: Vec<String>,
}

impl ResolutionResult {
    /// True when a tree was produced and no error was recorded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.ast.is_some() && self.errors.is_empty()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The recorded errors without their locations.
    pub fn error_kinds(&self) -> impl Iterator<Item = &PrsError> {
        self.errors.iter().map(|e| &e.error)
    }
}

/// Mutable state of one top-level resolution.
#[derive(Debug, Default)]
struct Session {
    errors: Vec<ResolveError>,
    sources: Vec<String>,
    stack: Vec<PathBuf>,
    fatal: bool,
}

impl Session {
    fn record(&mut self, error: ResolveError) {
        tracing::debug!(target: "resolver", "Recorded error: {}", error);
        if error.error.is_fatal() {
            self.fatal = true;
        }
        self.errors.push(error);
    }

    fn finish(self, ast: Option<Document>) -> ResolutionResult {
        let mut seen = HashSet::with_capacity(self.sources.len());
        let sources = self.sources.into_iter().filter(|s| seen.insert(s.clone())).collect();
        // A fragment reached twice replays its cached errors.
        let mut errors: Vec<ResolveError> = Vec::with_capacity(self.errors.len());
        for error in self.errors {
            if !errors.contains(&error) {
                errors.push(error);
            }
        }
        ResolutionResult {
            ast: if self.fatal { None } else { ast },
            errors,
            sources,
        }
    }
}

/// Resolves PromptScript documents.
///
/// Cheap to clone; clones share the loader's registry and the resolved cache.
#[derive(Clone)]
pub struct Resolver {
    loader: Loader,
    parser: Arc<dyn DocumentParser>,
    cache: ResolvedCache,
    git_cache: Option<GitCacheManager>,
    skills: bool,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("loader", &self.loader)
            .field("cached", &self.cache.len())
            .field("git_cache", &self.git_cache.as_ref().map(GitCacheManager::cache_dir))
            .field("skills", &self.skills)
            .finish()
    }
}

impl Resolver {
    /// Creates a resolver from configuration with the given parser.
    ///
    /// # Errors
    ///
    /// Fails when a configured registry cannot be built (bad URL, unreadable
    /// credentials, no cache directory).
    pub fn new(config: ResolverConfig, parser: impl DocumentParser + 'static) -> Result<Self> {
        Self::builder().config(config).parser(parser).build()
    }

    #[must_use]
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    #[must_use]
    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// The resolved-document memo.
    #[must_use]
    pub fn cache(&self) -> &ResolvedCache {
        &self.cache
    }

    /// The Git cache manager, when one was injected or built for Git registries.
    #[must_use]
    pub fn git_cache(&self) -> Option<&GitCacheManager> {
        self.git_cache.as_ref()
    }

    /// Drops every memoized resolution.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// Resolves the entry document at `path`.
    ///
    /// Relative paths are taken against the local project root and the `.prs`
    /// extension is added when missing.
    pub async fn resolve(&self, path: impl AsRef<Path>) -> ResolutionResult {
        self.resolve_with_params(path, Vec::new()).await
    }

    /// Resolves the entry document at `path` with template arguments.
    pub async fn resolve_with_params(&self, path: impl AsRef<Path>, args: Vec<ParamArgument>) -> ResolutionResult {
        let location = self.loader.resolve_entry(path.as_ref());
        tracing::info!(target: "resolver", "Resolving {}", location.display());

        let mut session = Session::default();
        let ast = self.resolve_document(location.clone(), args, &mut session, None).await;
        let result = session.finish(ast);

        if result.ast.is_some() {
            tracing::info!(
                target: "resolver",
                "Resolved {} ({} sources, {} errors)",
                location.display(),
                result.sources.len(),
                result.errors.len()
            );
        } else {
            tracing::warn!(
                target: "resolver",
                "Failed to resolve {} ({} errors)",
                location.display(),
                result.errors.len()
            );
        }
        result
    }

    /// Resolves several independent entry documents concurrently.
    ///
    /// Results come back in the order of `paths`. Each resolution has its own
    /// cycle stack and error list; the resolved cache is shared.
    pub async fn resolve_many<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<ResolutionResult> {
        join_all(paths.iter().map(|path| self.resolve(path))).await
    }

    /// Runs the pipeline for one document.
    ///
    /// `origin` is where the reference to this document was written; load and
    /// binding failures are reported there. Returns `None` when the document
    /// contributes nothing, with the reason recorded in `session`.
    async fn resolve_document(
        &self,
        location: PathBuf,
        args: Vec<ParamArgument>,
        session: &mut Session,
        origin: Option<SourceLocation>,
    ) -> Option<Document> {
        if let Some(first) = session.stack.iter().position(|p| p == &location) {
            let chain = session.stack[first..]
                .iter()
                .chain(std::iter::once(&location))
                .map(|p| p.display().to_string())
                .collect();
            session.record(ResolveError::new(PrsError::CircularDependency { chain }).at(origin));
            return None;
        }

        if let Some(cached) = self.cache.get(&location, &args) {
            session.sources.extend(cached.sources);
            session.errors.extend(cached.errors);
            return Some(cached.document);
        }

        let first_error = session.errors.len();
        let first_source = session.sources.len();
        session.stack.push(location.clone());
        let document = self.run_pipeline(&location, &args, session, origin).await;
        session.stack.pop();

        let document = document?;
        if session.fatal {
            return None;
        }
        self.cache.insert(
            location.clone(),
            CachedResolution {
                args,
                document: document.clone(),
                sources: session.sources[first_source..].to_vec(),
                errors: session.errors[first_error..].to_vec(),
            },
        );
        Some(document)
    }

    async fn run_pipeline(
        &self,
        location: &Path,
        args: &[ParamArgument],
        session: &mut Session,
        origin: Option<SourceLocation>,
    ) -> Option<Document> {
        let file = location.display().to_string();
        tracing::debug!(target: "resolver", "Loading {}", file);

        let source = match self.loader.load(location).await {
            Ok(source) => source,
            Err(e) => {
                session.record(ResolveError::new(PrsError::from_anyhow(&e)).at(origin));
                return None;
            }
        };
        session.sources.push(file.clone());

        let document = match self.parser.parse(&source, location) {
            Ok(document) => document,
            Err(diagnostics) => {
                tracing::debug!(target: "resolver", "{} failed to parse ({} diagnostics)", file, diagnostics.len());
                for diagnostic in diagnostics {
                    session.record(diagnostic.into_resolve_error(&file));
                }
                return None;
            }
        };

        let mut document = self.bind_and_interpolate(document, args, &source, &file, session, origin);

        if let Some(inherit) = document.inherit.take() {
            let parent_location = self.loader.resolve_ref(&inherit.path, location);
            tracing::debug!(target: "resolver", "{} inherits {}", file, parent_location.display());
            let parent =
                Box::pin(self.resolve_document(parent_location, inherit.params, session, inherit.location)).await;
            if session.fatal {
                return None;
            }
            if let Some(parent) = parent {
                document = merge_inheritance(&parent, &document);
            }
        }

        let mut aliases = AliasTable::new();
        for declaration in std::mem::take(&mut document.uses) {
            let import_location = self.loader.resolve_ref(&declaration.path, location);
            tracing::debug!(target: "resolver", "{} uses {}", file, import_location.display());
            let imported = Box::pin(self.resolve_document(
                import_location.clone(),
                declaration.params,
                session,
                declaration.location,
            ))
            .await;
            if session.fatal {
                return None;
            }
            if let Some(imported) = imported {
                let source = import_location.display().to_string();
                document = merge_import(&document, &imported, declaration.alias.as_deref(), &source, &mut aliases);
            }
        }

        if !document.extends.is_empty() {
            tracing::debug!(target: "resolver", "Applying {} extends in {}", document.extends.len(), file);
            document = apply_extends(&document, &mut aliases);
        }

        if self.skills {
            document = apply_skills(&self.loader, document, location).await;
        }
        Some(document)
    }

    /// Binds `args` against the document's params and substitutes its own
    /// placeholders. On failure the error is recorded and the document is
    /// returned unchanged.
    ///
    /// A document with no params and no arguments keeps its `{{name}}` text,
    /// but an explicit template expression in it is reported as undefined.
    fn bind_and_interpolate(
        &self,
        document: Document,
        args: &[ParamArgument],
        source: &str,
        file: &str,
        session: &mut Session,
        origin: Option<SourceLocation>,
    ) -> Document {
        if document.params.is_none() && args.is_empty() {
            if let Some(name) = first_template_expression(&document) {
                let error = PrsError::UndefinedVariable {
                    name: name.to_string(),
                    file: file.to_string(),
                };
                session.record(ResolveError::new(error).at(locate(source, file, name)));
            }
            return document;
        }
        let bindings = match bind_params(document.params.as_deref(), Some(args), file) {
            Ok(bindings) => bindings,
            Err(e) => {
                session.record(ResolveError::new(e).at(origin));
                return document;
            }
        };
        match interpolate_document(&document, &bindings, file) {
            Ok(interpolated) => interpolated,
            Err(e) => {
                let location = match &e {
                    PrsError::UndefinedVariable {
                        name,
                        ..
                    } => locate(source, file, &format!("{{{{{name}}}}}")).or_else(|| locate(source, file, name)),
                    _ => None,
                };
                session.record(ResolveError::new(e).at(location));
                document
            }
        }
    }
}

/// Position of the first occurrence of `needle` in `source`.
fn locate(source: &str, file: &str, needle: &str) -> Option<SourceLocation> {
    source.lines().enumerate().find_map(|(index, line)| {
        line.find(needle).map(|column| SourceLocation::new(file, index + 1, column + 1))
    })
}

/// Assembles a [`Resolver`].
///
/// Without an injected registry, one is built from the configured
/// `[[registries]]`, sharing the injected Git cache manager or one created from
/// the `[cache]` settings.
#[derive(Default)]
pub struct ResolverBuilder {
    config: ResolverConfig,
    parser: Option<Arc<dyn DocumentParser>>,
    registry: Option<Arc<dyn Registry>>,
    git_cache: Option<GitCacheManager>,
    resolved_cache: Option<ResolvedCache>,
    skills: Option<bool>,
}

impl ResolverBuilder {
    #[must_use]
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Parser used for every document. Defaults to [`YamlDocumentParser`].
    #[must_use]
    pub fn parser(mut self, parser: impl DocumentParser + 'static) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    /// Serves registry references from `registry`, ignoring `[[registries]]`.
    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn git_cache(mut self, cache: GitCacheManager) -> Self {
        self.git_cache = Some(cache);
        self
    }

    #[must_use]
    pub fn resolved_cache(mut self, cache: ResolvedCache) -> Self {
        self.resolved_cache = Some(cache);
        self
    }

    /// Enables the native skills pass (on by default).
    #[must_use]
    pub fn skills(mut self, enabled: bool) -> Self {
        self.skills = Some(enabled);
        self
    }

    /// Builds the resolver.
    ///
    /// # Errors
    ///
    /// Fails when a configured registry cannot be built.
    pub fn build(self) -> Result<Resolver> {
        let Self {
            config,
            parser,
            registry,
            mut git_cache,
            resolved_cache,
            skills,
        } = self;

        let registry = match registry {
            Some(registry) => Some(registry),
            None if config.registries.is_empty() => None,
            None => {
                let cache = match git_cache.take() {
                    Some(cache) => cache,
                    None => config.cache_manager()?,
                };
                let built = config.build_registry(&cache)?;
                git_cache = Some(cache);
                built
            }
        };

        let mut loader = Loader::new(config.local_path.clone(), config.registry_path.clone())
            .with_env_expansion(config.expand_env);
        if let Some(registry) = registry {
            tracing::debug!(target: "resolver", "Using registry {}", registry.describe());
            loader = loader.with_registry(registry);
        }

        Ok(Resolver {
            loader,
            parser: parser.unwrap_or_else(|| Arc::new(YamlDocumentParser::new())),
            cache: resolved_cache.unwrap_or_default(),
            git_cache,
            skills: skills.unwrap_or(true),
        })
    }
}
