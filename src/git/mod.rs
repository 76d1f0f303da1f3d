//! Git operations for the Git-backed registry.
//!
//! Like the rest of the crate this shells out to the system `git` binary
//! instead of embedding a Git library, so SSH agents, credential helpers and
//! local Git configuration keep working unchanged.
//!
//! # Clone strategy
//!
//! [`GitRepo::clone_at_ref`] first tries a shallow clone pinned to the
//! requested ref (`--depth 1 --branch <ref>`). When Git reports that the ref
//! is not a branch or tag it can pin (a commit SHA, or a branch the shallow
//! history excludes), it retries once with an unpinned clone followed by an
//! explicit checkout/fetch of the ref. Failures are classified by
//! [`classify::classify_git_failure`] into auth, ref-not-found and generic
//! clone errors.
//!
//! # Credentials
//!
//! Tokens are embedded into the URL only for the network command that needs
//! them. After a clone the `origin` remote is rewritten to the credential-free
//! URL, and every URL that reaches a log line or error goes through
//! [`url::strip_auth_from_url`].
//!
//! ```rust,no_run
//! use prs_resolver::git::{GitAuth, GitRepo};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let auth = GitAuth::default();
//! let repo = GitRepo::clone_at_ref(
//!     "https://github.com/acme/prompts.git",
//!     "v1.2.0",
//!     std::env::temp_dir().join("prompts"),
//!     &auth,
//! )
//! .await?;
//! println!("checked out {}", repo.current_commit().await?);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod command_builder;
#[cfg(test)]
mod tests;
pub mod url;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::constants::{GIT_CLONE_TIMEOUT, GIT_FETCH_TIMEOUT, SHALLOW_CLONE_DEPTH};
use crate::core::PrsError;
use classify::{GitFailureKind, classified_error, classify_git_failure, failure_text};
use command_builder::GitCommand;
use url::{build_auth_url, strip_auth_from_url};

/// Credentials used for clone and fetch commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitAuth {
    /// Token embedded into HTTP(S) URLs as `oauth2:<token>`
    pub token: Option<String>,
    /// Private key passed through `GIT_SSH_COMMAND`
    pub ssh_key: Option<PathBuf>,
}

impl GitAuth {
    /// URL to hand to Git for network operations.
    #[must_use]
    pub fn authenticated_url(&self, url: &str) -> String {
        match &self.token {
            Some(token) => build_auth_url(url, token),
            None => url.to_string(),
        }
    }

    fn apply(&self, cmd: GitCommand) -> GitCommand {
        match &self.ssh_key {
            Some(key) => cmd.ssh_key(key),
            None => cmd,
        }
    }
}

/// Handle to a local clone.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Wraps an existing clone. The path is not validated.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the directory has a `.git` entry.
    #[must_use]
    pub fn is_git_repo(&self) -> bool {
        is_valid_git_repo(&self.path)
    }

    /// Clones `url` into `target` with `reference` checked out.
    ///
    /// `target` must not exist. On failure any partial clone is removed.
    ///
    /// # Errors
    ///
    /// Returns [`PrsError::GitAuth`], [`PrsError::GitRefNotFound`] or
    /// [`PrsError::GitClone`] according to Git's error output, or
    /// [`PrsError::GitNotFound`] when Git is not installed.
    pub async fn clone_at_ref(
        url: &str,
        reference: &str,
        target: impl AsRef<Path>,
        auth: &GitAuth,
    ) -> Result<Self> {
        let target = target.as_ref();
        let auth_url = auth.authenticated_url(url);
        let repo = Self::new(target);

        let shallow = auth
            .apply(GitCommand::clone_shallow(&auth_url, reference, SHALLOW_CLONE_DEPTH, target))
            .with_timeout(Some(GIT_CLONE_TIMEOUT))
            .with_context(strip_auth_from_url(url))
            .execute_success()
            .await;

        let first_error = match shallow {
            Ok(()) => {
                repo.scrub_remote(url).await?;
                return Ok(repo);
            }
            Err(e) => e,
        };
        if is_git_missing(&first_error) {
            return Err(first_error);
        }

        let text = failure_text(&first_error);
        let kind = classify_git_failure(&text);
        if kind != GitFailureKind::RefNotFound {
            remove_partial(target).await;
            return Err(classified_error(kind, url, reference, &text).into());
        }

        tracing::debug!(
            target: "git",
            "Ref '{}' not pinnable on {}, retrying with an unpinned clone",
            reference,
            strip_auth_from_url(url)
        );
        remove_partial(target).await;

        match repo.clone_unpinned(url, &auth_url, reference, auth).await {
            Ok(()) => Ok(repo),
            Err(e) => {
                remove_partial(target).await;
                if is_git_missing(&e) {
                    return Err(e);
                }
                let text = failure_text(&e);
                let kind = match classify_git_failure(&text) {
                    GitFailureKind::RefNotFound => GitFailureKind::RefNotFound,
                    _ => GitFailureKind::Clone,
                };
                Err(classified_error(kind, url, reference, &text).into())
            }
        }
    }

    async fn clone_unpinned(&self, url: &str, auth_url: &str, reference: &str, auth: &GitAuth) -> Result<()> {
        auth.apply(GitCommand::clone_full(auth_url, &self.path))
            .with_timeout(Some(GIT_CLONE_TIMEOUT))
            .with_context(strip_auth_from_url(url))
            .execute_success()
            .await?;

        // A full clone already has every branch tip, tag and commit.
        let direct = GitCommand::checkout(reference).current_dir(&self.path).execute_success().await;
        if direct.is_err() {
            auth.apply(GitCommand::fetch_ref(auth_url, reference, None))
                .current_dir(&self.path)
                .with_timeout(Some(GIT_FETCH_TIMEOUT))
                .execute_success()
                .await?;
            GitCommand::checkout_fetch_head().current_dir(&self.path).execute_success().await?;
        }
        self.scrub_remote(url).await
    }

    /// Incrementally moves the clone to the latest state of `reference`:
    /// fetch, checkout, hard reset.
    ///
    /// # Errors
    ///
    /// Returns a classified Git error; callers are expected to fall back to a
    /// fresh clone.
    pub async fn update_to_ref(&self, url: &str, reference: &str, auth: &GitAuth) -> Result<()> {
        let auth_url = auth.authenticated_url(url);
        let result = async {
            auth.apply(GitCommand::fetch_ref(&auth_url, reference, Some(SHALLOW_CLONE_DEPTH)))
                .current_dir(&self.path)
                .with_timeout(Some(GIT_FETCH_TIMEOUT))
                .with_context(strip_auth_from_url(url))
                .execute_success()
                .await?;
            GitCommand::checkout_fetch_head().current_dir(&self.path).execute_success().await?;
            GitCommand::reset_hard("FETCH_HEAD").current_dir(&self.path).execute_success().await
        }
        .await;

        result.map_err(|e| {
            if is_git_missing(&e) {
                return e;
            }
            let text = failure_text(&e);
            classified_error(classify_git_failure(&text), url, reference, &text).into()
        })
    }

    /// Full SHA of `HEAD`.
    pub async fn current_commit(&self) -> Result<String> {
        GitCommand::current_commit().current_dir(&self.path).execute_stdout().await
    }

    /// URL of the `origin` remote.
    pub async fn remote_url(&self) -> Result<String> {
        GitCommand::remote_url().current_dir(&self.path).execute_stdout().await
    }

    async fn scrub_remote(&self, url: &str) -> Result<()> {
        GitCommand::set_remote_url(&strip_auth_from_url(url))
            .current_dir(&self.path)
            .execute_success()
            .await
    }
}

fn is_git_missing(error: &anyhow::Error) -> bool {
    matches!(PrsError::from_anyhow(error), PrsError::GitNotFound)
}

async fn remove_partial(target: &Path) {
    if !target.exists() {
        return;
    }
    if let Err(e) = tokio::fs::remove_dir_all(target).await {
        tracing::warn!(target: "git", "Failed to remove partial clone {}: {}", target.display(), e);
    }
}

/// True when Git can be executed.
pub async fn is_git_installed() -> bool {
    GitCommand::version().execute_success().await.is_ok()
}

/// Fails with [`PrsError::GitNotFound`] when Git cannot be executed.
pub async fn ensure_git_available() -> Result<()> {
    if !is_git_installed().await {
        return Err(PrsError::GitNotFound.into());
    }
    Ok(())
}

/// True when `path` has a `.git` entry.
#[must_use]
pub fn is_valid_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}
