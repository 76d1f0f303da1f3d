//! In-process memo of resolved documents.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ast::{Document, ParamArgument};
use crate::core::ResolveError;

/// A resolved document and what its resolution produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResolution {
    /// Arguments the document was resolved with
    pub args: Vec<ParamArgument>,
    pub document: Document,
    /// Every file read while resolving it, in read order
    pub sources: Vec<String>,
    /// Non-fatal errors recorded while resolving it
    pub errors: Vec<ResolveError>,
}

/// Resolved documents keyed by absolute path.
///
/// An entry answers a lookup only when the lookup's arguments equal the ones
/// the entry was resolved with; otherwise the lookup misses and the next
/// insert replaces it. Cloning shares the underlying map, so one cache can be
/// handed to several resolvers.
#[derive(Debug, Clone, Default)]
pub struct ResolvedCache {
    entries: Arc<DashMap<PathBuf, CachedResolution>>,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
}

impl ResolvedCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached resolution of `path` for `args`, if any.
    pub fn get(&self, path: &Path, args: &[ParamArgument]) -> Option<CachedResolution> {
        let found = self.entries.get(path).filter(|entry| entry.args == args).map(|entry| entry.value().clone());
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(target: "resolver", "Resolved cache hit: {}", path.display());
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, path: PathBuf, resolution: CachedResolution) {
        self.entries.insert(path, resolution);
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Drops every entry. Counters are kept.
    pub fn invalidate(&self) {
        tracing::debug!(target: "resolver", "Invalidating {} resolved documents", self.entries.len());
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}
