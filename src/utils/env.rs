//! Environment-variable expansion for source text.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("environment variable pattern is valid")
});

/// Expands `${NAME}` and `${NAME:-default}` using the process environment.
///
/// Unset variables without a default are left untouched and logged.
#[must_use]
pub fn expand_env_vars(source: &str) -> String {
    expand_with(source, |name| std::env::var(name).ok())
}

/// Expansion with an explicit lookup, for callers that supply their own environment.
pub fn expand_with<F>(source: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_VAR_PATTERN
        .replace_all(source, |caps: &Captures<'_>| {
            let name = &caps[1];
            match (lookup(name), caps.get(2)) {
                (Some(value), _) => value,
                (None, Some(default)) => default.as_str().to_string(),
                (None, None) => {
                    tracing::warn!(target: "resolver", "Environment variable {} is not set", name);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}
