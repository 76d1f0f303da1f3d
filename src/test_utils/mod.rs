//! Test utilities for the resolver
//!
//! Available under `cfg(test)` and the `test-utils` feature.
//!
//! - [`init_test_logging`] wires `tracing` output into the test harness
//! - [`TestGit`] builds local repositories for Git registry tests
//! - [`write_document`] drops a source file into a temporary project

pub mod git_helper;

pub use git_helper::TestGit;

use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Runs once per process. Uses `level` when given, otherwise `RUST_LOG`;
/// with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=registry=debug,git=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Writes `content` to `dir/relative`, creating parent directories, and
/// returns the full path.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_document(dir: &Path, relative: &str, content: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture directory");
    }
    std::fs::write(&path, content).expect("write fixture");
    path
}
