//! Classification of clone/update failures from Git's error output.
//!
//! Git reports failures as free text that varies across versions and
//! locales, so the matching lives here and nowhere else. Anything that matches
//! no pattern is a generic (retryable) clone failure; we never guess a more
//! specific kind.

use crate::core::PrsError;

/// What kind of remediation a failed Git operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitFailureKind {
    /// Credentials are missing or were rejected.
    Auth,
    /// The branch, tag or commit does not exist on the remote.
    RefNotFound,
    /// Anything else; treated as transient.
    Clone,
}

/// Lowercase substrings that identify credential failures.
pub const AUTH_PATTERNS: &[&str] = &[
    "authentication failed",
    "permission denied",
    "returned error: 401",
    "returned error: 403",
    "could not read username",
    "could not read password",
    "terminal prompts disabled",
    "invalid username or password",
    "access denied",
];

/// Lowercase substrings that identify a missing ref.
pub const REF_NOT_FOUND_PATTERNS: &[&str] = &[
    "remote branch",
    "couldn't find remote ref",
    "could not find remote ref",
    "did not match any file(s) known to git",
    "pathspec",
    "unknown revision",
    "invalid reference",
    "not a valid object name",
];

/// Classifies Git error output. Credential patterns win over ref patterns.
#[must_use]
pub fn classify_git_failure(output: &str) -> GitFailureKind {
    let lower = output.to_lowercase();
    if AUTH_PATTERNS.iter().any(|p| lower.contains(p)) {
        GitFailureKind::Auth
    } else if REF_NOT_FOUND_PATTERNS.iter().any(|p| lower.contains(p)) {
        GitFailureKind::RefNotFound
    } else {
        GitFailureKind::Clone
    }
}

/// Builds the typed error for a classified failure.
#[must_use]
pub fn classified_error(kind: GitFailureKind, url: &str, reference: &str, message: &str) -> PrsError {
    let url = super::url::strip_auth_from_url(url);
    let message = message.trim().to_string();
    match kind {
        GitFailureKind::Auth => PrsError::GitAuth { url, message },
        GitFailureKind::RefNotFound => PrsError::GitRefNotFound {
            url,
            reference: reference.to_string(),
            message,
        },
        GitFailureKind::Clone => PrsError::GitClone { url, message },
    }
}

/// Extracts Git's error text from a failed command's `anyhow::Error`.
#[must_use]
pub fn failure_text(error: &anyhow::Error) -> String {
    match PrsError::from_anyhow(error) {
        PrsError::GitCommandError { stderr, .. } => stderr,
        PrsError::GitClone { message, .. }
        | PrsError::GitAuth { message, .. }
        | PrsError::GitRefNotFound { message, .. } => message,
        other => other.to_string(),
    }
}
