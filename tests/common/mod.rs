//! Common test utilities for resolver integration tests
//!
//! Consolidates project setup so each test only states the documents it needs.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::Result;
use prs_resolver::config::ResolverConfig;
use prs_resolver::registry::Registry;
use prs_resolver::resolver::Resolver;
use prs_resolver::test_utils::{TestGit, init_test_logging, write_document};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A throwaway project directory with a local root and a registry root.
pub struct TestProject {
    _temp: TempDir,
    root: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        init_test_logging(None);
        let temp = TempDir::new()?;
        let root = temp.path().to_path_buf();
        Ok(Self {
            _temp: temp,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local project root that entry paths resolve against.
    pub fn local(&self) -> PathBuf {
        self.root.join("project")
    }

    /// Root that `@scope/...` references resolve under.
    pub fn registry_root(&self) -> PathBuf {
        self.root.join("project").join("registry")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Writes a document under the local project root.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        write_document(&self.local(), relative, content)
    }

    /// Config pointing at this project, without environment expansion.
    pub fn config(&self) -> ResolverConfig {
        ResolverConfig {
            local_path: self.local(),
            registry_path: self.registry_root(),
            expand_env: false,
            ..ResolverConfig::default()
        }
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::builder().config(self.config()).build().expect("build resolver")
    }

    pub fn resolver_with(&self, registry: Arc<dyn Registry>) -> Resolver {
        Resolver::builder().config(self.config()).registry(registry).build().expect("build resolver")
    }

    /// Creates a Git repository at `<root>/<name>` holding `files`, committed
    /// on `main`.
    pub fn git_repo(&self, name: &str, files: &[(&str, &str)]) -> Result<TestGit> {
        let git = TestGit::new(self.root.join(name));
        git.init()?;
        for (path, content) in files {
            git.write_file(path, content)?;
        }
        git.commit_all("initial")?;
        Ok(git)
    }
}
