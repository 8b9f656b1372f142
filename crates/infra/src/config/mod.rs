//! Configuration loading
//!
//! File (TOML or JSON) or built-in defaults, overridden by `STORESYNC_*`
//! environment variables.

pub mod loader;

pub use loader::{apply_env_overrides, load, load_from_file, probe_config_paths};
