//! Error handling for the PromptScript resolver
//!
//! This module provides the error taxonomy of the resolution pipeline and the
//! user-facing wrappers built on top of it. The error system follows two rules:
//! 1. **Strongly-typed errors** ([`PrsError`]) for precise handling in code
//! 2. **User-friendly messages** ([`ErrorContext`]) with actionable suggestions
//!
//! # Error Categories
//!
//! - **Loading**: [`PrsError::FileNotFound`], [`PrsError::ParseError`]
//! - **Graph**: [`PrsError::CircularDependency`]
//! - **Git**: [`PrsError::GitAuth`], [`PrsError::GitRefNotFound`], [`PrsError::GitClone`]
//! - **Templates**: [`PrsError::MissingParam`], [`PrsError::UnknownParam`],
//!   [`PrsError::ParamTypeMismatch`], [`PrsError::UndefinedVariable`]
//! - **Plumbing**: network, filesystem, configuration and generic failures
//!
//! Fallible plumbing returns [`anyhow::Result`]; typed errors travel inside the
//! `anyhow::Error` and are recovered with [`PrsError::from_anyhow`].
//!
//! # Examples
//!
//! ```rust
//! use prs_resolver::core::{PrsError, user_friendly_error};
//!
//! let error = PrsError::GitAuth {
//!     url: "https://github.com/org/private.git".to_string(),
//!     message: "fatal: Authentication failed".to_string(),
//! };
//! let context = user_friendly_error(anyhow::Error::from(error));
//! assert!(context.suggestion.is_some());
//! ```

use crate::ast::SourceLocation;
use std::fmt;
use thiserror::Error;

/// The error type for every failure the resolution pipeline can report.
///
/// `PrsError` is `Clone` so that errors can be accumulated in a
/// [`ResolutionResult`](crate::resolver::ResolutionResult) and handed to
/// callers while the original `anyhow::Error` is dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrsError {
    /// A reference resolved to a location that no backend could provide.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The resolved path or URL that was requested
        path: String,
    },

    /// Source text was rejected by the parser.
    #[error("Parse error in {file}: {message}")]
    ParseError {
        /// File the parser was reading
        file: String,
        /// Parser message
        message: String,
    },

    /// An inheritance or import chain refers back to a file already being resolved.
    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency {
        /// Every file on the chain, ending with the repeated one
        chain: Vec<String>,
    },

    /// Git rejected the credentials (or had none) for a repository.
    #[error("Git authentication failed for {url}: {message}")]
    GitAuth {
        /// Repository URL with credentials stripped
        url: String,
        /// Git's error output
        message: String,
    },

    /// The requested branch, tag or commit does not exist in the repository.
    #[error("Git reference '{reference}' not found in {url}: {message}")]
    GitRefNotFound {
        /// Repository URL with credentials stripped
        url: String,
        /// The ref that was requested
        reference: String,
        /// Git's error output
        message: String,
    },

    /// Any other clone or update failure, treated as transient.
    #[error("Failed to clone {url}: {message}")]
    GitClone {
        /// Repository URL with credentials stripped
        url: String,
        /// Git's error output
        message: String,
    },

    /// A git command exited unsuccessfully outside of clone/update classification.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g. "fetch", "rev-parse")
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// Git executable not found in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A required template parameter was not supplied and has no default.
    #[error("Missing required parameter '{name}' for {file}")]
    MissingParam {
        /// Parameter name
        name: String,
        /// Template source file
        file: String,
    },

    /// An argument names a parameter the template does not declare.
    #[error("Unknown parameter '{name}' for {file}. Valid parameters: {}", format_names(.valid))]
    UnknownParam {
        /// Supplied parameter name
        name: String,
        /// Template source file
        file: String,
        /// Every declared parameter name
        valid: Vec<String>,
    },

    /// An argument's type (or enum option) does not match the declaration.
    #[error("Parameter '{name}' for {file} expects {expected}, got {actual}")]
    ParamTypeMismatch {
        /// Parameter name
        name: String,
        /// Template source file
        file: String,
        /// Declared type, e.g. `number` or `enum(a | b)`
        expected: String,
        /// Description of the supplied value
        actual: String,
    },

    /// A `{{name}}` placeholder or template expression has no binding.
    #[error("Undefined template variable '{name}' in {file}")]
    UndefinedVariable {
        /// Identifier inside the placeholder
        name: String,
        /// Source file being interpolated
        file: String,
    },

    /// An HTTP request failed.
    #[error("Network error during {operation}: {reason}")]
    NetworkError {
        /// What was being requested
        operation: String,
        /// Transport or status description
        reason: String,
    },

    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// A filesystem operation failed.
    #[error("File system error while {operation} {path}: {reason}")]
    FileSystemError {
        /// Operation being performed
        operation: String,
        /// Path involved
        path: String,
        /// Underlying error text
        reason: String,
    },

    /// Anything else, carried as text.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

impl PrsError {
    /// Recovers the typed error from an `anyhow::Error`, or wraps its text.
    ///
    /// The full context chain is kept in the message of the fallback variant.
    #[must_use]
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        for cause in error.chain() {
            if let Some(prs) = cause.downcast_ref::<PrsError>() {
                return prs.clone();
            }
        }
        if let Some(file_error) = error.downcast_ref::<super::file_error::FileOperationError>() {
            if file_error.source.kind() == std::io::ErrorKind::NotFound {
                return Self::FileNotFound {
                    path: file_error.file_path.display().to_string(),
                };
            }
        }
        Self::Other {
            message: format!("{error:#}"),
        }
    }

    /// Whether this error forces the whole resolution to fail with no tree.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }
}

/// An error recorded in a resolution result, with its source position when known.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveError {
    /// The underlying error
    pub error: PrsError,
    /// Where in the source it was raised
    pub location: Option<SourceLocation>,
}

impl ResolveError {
    /// Creates an error without a location.
    #[must_use]
    pub const fn new(error: PrsError) -> Self {
        Self {
            error,
            location: None,
        }
    }

    /// Attaches a source location.
    #[must_use]
    pub fn at(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    /// Human-readable message without the location prefix.
    #[must_use]
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl From<PrsError> for ResolveError {
    fn from(error: PrsError) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Error wrapper with user-facing details and suggestions.
///
/// ```rust
/// use prs_resolver::core::{ErrorContext, PrsError};
///
/// let context = ErrorContext::new(PrsError::GitNotFound)
///     .with_suggestion("Install git from https://git-scm.com/");
/// assert!(context.to_string().contains("Suggestion"));
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: PrsError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: PrsError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with remediation hints.
///
/// Typed [`PrsError`]s get tailored suggestions; I/O errors are mapped onto
/// filesystem errors; anything else is carried as [`PrsError::Other`].
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        return match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorContext::new(PrsError::FileSystemError {
                operation: "accessing".to_string(),
                path: "unknown".to_string(),
                reason: io_error.to_string(),
            })
            .with_suggestion("Check file ownership and permissions"),
            std::io::ErrorKind::NotFound => ErrorContext::new(PrsError::FileSystemError {
                operation: "accessing".to_string(),
                path: "unknown".to_string(),
                reason: io_error.to_string(),
            })
            .with_suggestion("Check that the file or directory exists and the path is correct"),
            _ => ErrorContext::new(PrsError::Other {
                message: io_error.to_string(),
            }),
        };
    }

    create_error_context(PrsError::from_anyhow(&error))
}

fn create_error_context(error: PrsError) -> ErrorContext {
    match &error {
        PrsError::GitAuth { .. } => ErrorContext::new(error)
            .with_suggestion(
                "Configure a token (registries.auth.token or token_env) or an SSH key (registries.auth.ssh_key)",
            )
            .with_details("The remote rejected the request or asked for credentials"),
        PrsError::GitRefNotFound { reference, .. } => {
            let suggestion = format!(
                "Check that '{reference}' exists on the remote: git ls-remote <url> {reference}"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        PrsError::GitClone { .. } => ErrorContext::new(error)
            .with_suggestion("Check network connectivity and retry; the failure may be transient"),
        PrsError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ and make sure it is in PATH"),
        PrsError::CircularDependency { .. } => ErrorContext::new(error)
            .with_suggestion("Remove one @inherit or @use edge so the chain no longer loops"),
        PrsError::FileNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Check the reference path, the registry configuration and the file extension"),
        PrsError::UnknownParam { name, valid, .. } if !valid.is_empty() => {
            let similar = crate::templating::find_similar_names(name, valid);
            let suggestion = match similar.first() {
                Some(closest) => format!("Did you mean '{closest}'?"),
                None => format!("Use one of: {}", valid.join(", ")),
            };
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        PrsError::MissingParam { name, .. } => {
            let suggestion = format!("Pass '{name}' where the template is referenced");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_display_lists_chain() {
        let error = PrsError::CircularDependency {
            chain: vec!["a.prs".into(), "b.prs".into(), "a.prs".into()],
        };
        assert_eq!(error.to_string(), "Circular dependency detected: a.prs -> b.prs -> a.prs");
        assert!(error.is_fatal());
    }

    #[test]
    fn test_unknown_param_lists_valid_names() {
        let error = PrsError::UnknownParam {
            name: "colour".into(),
            file: "t.prs".into(),
            valid: vec!["color".into(), "size".into()],
        };
        let message = error.to_string();
        assert!(message.contains("colour"));
        assert!(message.contains("color, size"));

        let empty = PrsError::UnknownParam {
            name: "x".into(),
            file: "t.prs".into(),
            valid: vec![],
        };
        assert!(empty.to_string().contains("(none)"));
    }

    #[test]
    fn test_from_anyhow_recovers_typed_error_through_context() {
        use anyhow::Context;

        let result: anyhow::Result<()> = Err(PrsError::GitNotFound.into());
        let error = result.context("while cloning").unwrap_err();
        assert_eq!(PrsError::from_anyhow(&error), PrsError::GitNotFound);

        let plain = anyhow::anyhow!("boom");
        assert_eq!(
            PrsError::from_anyhow(&plain),
            PrsError::Other {
                message: "boom".into()
            }
        );
    }

    #[test]
    fn test_resolve_error_display_with_location() {
        let error = ResolveError::new(PrsError::UndefinedVariable {
            name: "name".into(),
            file: "main.prs".into(),
        })
        .at(Some(SourceLocation::new("main.prs", 3, 7)));
        assert_eq!(error.to_string(), "main.prs:3:7: Undefined template variable 'name' in main.prs");
    }

    #[test]
    fn test_user_friendly_error_suggestions() {
        let context = user_friendly_error(
            PrsError::GitRefNotFound {
                url: "https://example.com/r.git".into(),
                reference: "v9".into(),
                message: "not found".into(),
            }
            .into(),
        );
        assert!(context.suggestion.unwrap().contains("v9"));

        let context = user_friendly_error(
            PrsError::UnknownParam {
                name: "colour".into(),
                file: "t.prs".into(),
                valid: vec!["color".into(), "size".into()],
            }
            .into(),
        );
        assert_eq!(context.suggestion.as_deref(), Some("Did you mean 'color'?"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let context = user_friendly_error(io.into());
        assert!(matches!(context.error, PrsError::FileSystemError { .. }));
    }
}
