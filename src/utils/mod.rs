//! Small shared helpers.
//!
//! - [`backoff`] - doubling retry delays for the HTTP registry
//! - [`env`] - `${VAR}` / `${VAR:-default}` expansion in source text
//! - [`fs`] - atomic writes, directory sizes and cache directory discovery

pub mod backoff;
pub mod env;
pub mod fs;

pub use backoff::DoublingBackoff;
pub use env::expand_env_vars;
pub use fs::{atomic_write, dir_size, ensure_dir, expand_path, get_cache_dir, get_directory_size};
