//! File operation errors with the context needed to explain them.
//!
//! Registry backends and the Git cache touch the filesystem constantly; a bare
//! `io::Error` says nothing about which document or cache entry was involved.
//! [`FileResultExt::with_file_context`] attaches the operation, path, purpose
//! and caller so that the final message points at the right place.

use std::path::PathBuf;
use thiserror::Error;

/// The kind of filesystem operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    List,
    Metadata,
    CreateDir,
    Remove,
    Rename,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::List => write!(f, "listing"),
            FileOperation::Metadata => write!(f, "getting metadata for"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::Remove => write!(f, "removing"),
            FileOperation::Rename => write!(f, "renaming"),
        }
    }
}

/// An I/O error annotated with what the resolver was trying to do.
#[derive(Error, Debug)]
#[error("Failed {operation} '{}' for {purpose} ({caller})", .file_path.display())]
pub struct FileOperationError {
    pub operation: FileOperation,
    pub file_path: PathBuf,
    pub purpose: String,
    pub caller: String,
    #[source]
    pub source: std::io::Error,
}

impl FileOperationError {
    /// Whether the underlying error means the path does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.source.kind() == std::io::ErrorKind::NotFound
    }

    /// Message with a hint for the most common failure kinds.
    #[must_use]
    pub fn user_message(&self) -> String {
        let mut message = self.to_string();
        match self.source.kind() {
            std::io::ErrorKind::NotFound => {
                message.push_str("\n\nThe file does not exist at the specified path.");
            }
            std::io::ErrorKind::PermissionDenied => {
                message.push_str(&format!(
                    "\n\nPermission denied. Check file/directory permissions for: {}",
                    self.file_path.display()
                ));
            }
            std::io::ErrorKind::InvalidData => {
                message.push_str("\n\nThe file is not valid UTF-8 text.");
            }
            _ => {
                message.push_str(&format!("\n\nError details: {}", self.source));
            }
        }
        message
    }
}

/// Extension trait adding file context to `io::Result`s.
pub trait FileResultExt<T> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Result<T, FileOperationError>;
}

impl<T> FileResultExt<T> for Result<T, std::io::Error> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Result<T, FileOperationError> {
        self.map_err(|source| FileOperationError {
            operation,
            file_path: file_path.into(),
            purpose: purpose.into(),
            caller: caller.into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_file_result_ext_keeps_context() {
        let result: Result<String, Error> = Err(Error::new(ErrorKind::PermissionDenied, "denied"));
        let error = result
            .with_file_context(
                FileOperation::Write,
                "/tmp/cache/meta.json",
                "writing cache metadata",
                "cache::write_metadata",
            )
            .unwrap_err();

        assert_eq!(error.operation, FileOperation::Write);
        assert!(!error.is_not_found());
        let message = error.user_message();
        assert!(message.contains("writing"));
        assert!(message.contains("/tmp/cache/meta.json"));
        assert!(message.contains("Permission denied"));
    }

    #[test]
    fn test_not_found_is_detected() {
        let result: Result<(), Error> = Err(Error::new(ErrorKind::NotFound, "missing"));
        let error = result
            .with_file_context(FileOperation::Read, "a.prs", "loading document", "test")
            .unwrap_err();
        assert!(error.is_not_found());
        assert!(error.user_message().contains("does not exist"));
    }
}
