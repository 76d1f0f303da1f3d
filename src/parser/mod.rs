//! The parser contract.
//!
//! Turning PromptScript surface syntax into a tree is not this crate's job;
//! the resolver only needs something implementing [`DocumentParser`]. A parser
//! returns either a [`Document`] or a non-empty list of [`ParseDiagnostic`]s,
//! never both.
//!
//! [`YamlDocumentParser`] is a complete implementation that reads documents
//! written as a YAML (or JSON) serialization of the tree. It is what the tests
//! use and is enough to drive the resolver without a surface-syntax front end.

mod yaml;

pub use yaml::YamlDocumentParser;

use std::fmt;
use std::path::Path;

use crate::ast::{Document, SourceLocation};
use crate::core::{PrsError, ResolveError};

/// A single problem reported by a parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl ParseDiagnostic {
    pub fn new(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }

    /// Converts the diagnostic into a resolution error for `file`.
    #[must_use]
    pub fn into_resolve_error(self, file: &str) -> ResolveError {
        ResolveError::new(PrsError::ParseError {
            file: file.to_string(),
            message: self.message,
        })
        .at(self.location)
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Turns source text into a document tree.
pub trait DocumentParser: Send + Sync {
    /// Parses `source`, read from `file`.
    ///
    /// # Errors
    ///
    /// Returns every diagnostic found; the list is never empty.
    fn parse(&self, source: &str, file: &Path) -> Result<Document, Vec<ParseDiagnostic>>;
}
