use crate::git::url::parse_versioned_path;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// A reference to another document, as written after `@inherit` or `@use`.
///
/// Four forms are recognized:
///
/// | Form | Example | Resolves against |
/// |---|---|---|
/// | absolute | `/opt/prompts/base.prs` | nothing, passes through |
/// | registry | `@org/base`, `@org/base@v1.2.0` | the registry root |
/// | relative | `./fragments/tone`, `../shared` | the referencing file's directory |
/// | local | `fragments/tone` | the local project root |
///
/// ```rust
/// use prs_resolver::ast::PathReference;
///
/// let r = PathReference::parse("@acme/standards/security@v2.0.0");
/// assert_eq!(r.namespace.as_deref(), Some("acme"));
/// assert_eq!(r.segments, vec!["standards", "security"]);
/// assert_eq!(r.version.as_deref(), Some("v2.0.0"));
/// assert!(!r.is_relative);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathReference {
    pub raw: String,
    pub segments: Vec<String>,
    pub namespace: Option<String>,
    pub is_relative: bool,
    pub version: Option<String>,
}

impl PathReference {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(body) = raw.strip_prefix('@') {
            let (path, version) = parse_versioned_path(body);
            let mut parts = path.split('/').filter(|s| !s.is_empty()).map(str::to_string);
            let namespace = parts.next();
            return Self {
                raw: raw.to_string(),
                segments: parts.collect(),
                namespace,
                is_relative: false,
                version,
            };
        }

        let is_relative = raw == "." || raw == ".." || raw.starts_with("./") || raw.starts_with("../");
        Self {
            raw: raw.to_string(),
            segments: raw.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect(),
            namespace: None,
            is_relative,
            version: None,
        }
    }

    #[must_use]
    pub fn is_absolute(&self) -> bool {
        Path::new(&self.raw).is_absolute()
    }

    #[must_use]
    pub const fn is_registry(&self) -> bool {
        self.namespace.is_some()
    }
}

impl fmt::Display for PathReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
