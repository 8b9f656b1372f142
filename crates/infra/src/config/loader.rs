//! Configuration loader
//!
//! ## Loading Strategy
//! 1. `STORESYNC_CONFIG` names a file explicitly; otherwise standard paths are
//!    probed and, if nothing is found, built-in defaults are used
//! 2. `STORESYNC_*` environment variables override individual values
//! 3. The merged result is validated
//!
//! ## Environment Variables
//! - `STORESYNC_DATABASE_PATH`, `STORESYNC_DATABASE_POOL_SIZE`
//! - `STORESYNC_REDIS_URL` (falls back to `REDIS_URL`), `STORESYNC_REDIS_KEY_PREFIX`
//! - `STORESYNC_WORKER_CONCURRENCY`, `STORESYNC_WORKER_START_RATE`,
//!   `STORESYNC_WORKER_MAX_ATTEMPTS`, `STORESYNC_WORKER_RETRY_DELAY_MS`,
//!   `STORESYNC_SCHEDULE_TICK`
//! - `STORESYNC_SYNC_PAGE_SIZE`, `STORESYNC_SYNC_MAX_PAGES`,
//!   `STORESYNC_SYNC_REQUEST_TIMEOUT_SECS`, `STORESYNC_UPSTREAM_RATE_LIMIT`
//! - `STORESYNC_BIND_ADDR`, `STORESYNC_LOG_LEVEL`, `STORESYNC_LOG_JSON`
//!
//! ## File Locations
//! `storesync.toml`, `storesync.json`, `config.toml`, `config.json` in the
//! working directory and its two parents, then next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use storesync_domain::{Config, Result, StoreSyncError};

const FILE_NAMES: [&str; 4] = ["storesync.toml", "storesync.json", "config.toml", "config.json"];

/// Load file-or-default configuration, apply environment overrides and
/// validate the result
///
/// # Errors
/// Returns `StoreSyncError::Config` if a named file is missing or unreadable,
/// a value cannot be parsed, or validation fails.
pub fn load() -> Result<Config> {
    let explicit = std::env::var("STORESYNC_CONFIG").ok().map(PathBuf::from);
    let mut config = match explicit.or_else(probe_config_paths) {
        Some(path) => load_from_file(&path)?,
        None => {
            tracing::info!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a JSON or TOML file (by extension)
///
/// Missing sections and fields take their defaults.
pub fn load_from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(StoreSyncError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| StoreSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StoreSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| StoreSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(StoreSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
        dirs.push(cwd.join("../.."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Apply every `STORESYNC_*` override that is set
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(path) = env_string("STORESYNC_DATABASE_PATH") {
        config.database.path = path;
    }
    override_parsed("STORESYNC_DATABASE_POOL_SIZE", &mut config.database.pool_size)?;

    if let Some(url) = env_string("STORESYNC_REDIS_URL").or_else(|| env_string("REDIS_URL")) {
        config.redis.url = url;
    }
    if let Some(prefix) = env_string("STORESYNC_REDIS_KEY_PREFIX") {
        config.redis.key_prefix = Some(prefix);
    }

    override_parsed("STORESYNC_WORKER_CONCURRENCY", &mut config.worker.concurrency)?;
    override_parsed("STORESYNC_WORKER_START_RATE", &mut config.worker.start_rate_per_sec)?;
    override_parsed("STORESYNC_WORKER_MAX_ATTEMPTS", &mut config.worker.max_attempts)?;
    override_parsed("STORESYNC_WORKER_RETRY_DELAY_MS", &mut config.worker.retry_delay_ms)?;
    if let Some(tick) = env_string("STORESYNC_SCHEDULE_TICK") {
        config.worker.schedule_tick = tick;
    }

    override_parsed("STORESYNC_SYNC_PAGE_SIZE", &mut config.sync.page_size)?;
    override_parsed("STORESYNC_SYNC_MAX_PAGES", &mut config.sync.max_pages)?;
    override_parsed("STORESYNC_SYNC_REQUEST_TIMEOUT_SECS", &mut config.sync.request_timeout_secs)?;
    override_parsed("STORESYNC_UPSTREAM_RATE_LIMIT", &mut config.sync.upstream_rate_limit)?;

    if let Some(addr) = env_string("STORESYNC_BIND_ADDR") {
        config.server.bind_addr = addr;
    }
    if let Some(level) = env_string("STORESYNC_LOG_LEVEL") {
        config.log.level = level;
    }
    config.log.json = env_bool("STORESYNC_LOG_JSON", config.log.json);

    Ok(())
}

/// Non-empty environment value
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn override_parsed<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = env_string(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| StoreSyncError::Config(format!("Invalid value for {key}: {e}")))?;
    }
    Ok(())
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("STORESYNC_TEST_BOOL_ON", "ON");
        std::env::set_var("STORESYNC_TEST_BOOL_OFF", "off");
        std::env::remove_var("STORESYNC_TEST_BOOL_MISSING");

        assert!(env_bool("STORESYNC_TEST_BOOL_ON", false));
        assert!(!env_bool("STORESYNC_TEST_BOOL_OFF", true));
        assert!(env_bool("STORESYNC_TEST_BOOL_MISSING", true));

        std::env::remove_var("STORESYNC_TEST_BOOL_ON");
        std::env::remove_var("STORESYNC_TEST_BOOL_OFF");
    }

    #[test]
    fn overrides_replace_only_set_values() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("STORESYNC_DATABASE_PATH", "/tmp/override.db");
        std::env::set_var("STORESYNC_WORKER_CONCURRENCY", "4");
        std::env::set_var("STORESYNC_REDIS_KEY_PREFIX", "staging");

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();

        assert_eq!(config.database.path, "/tmp/override.db");
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.redis.key_prefix.as_deref(), Some("staging"));
        assert_eq!(config.worker.start_rate_per_sec, 50);

        std::env::remove_var("STORESYNC_DATABASE_PATH");
        std::env::remove_var("STORESYNC_WORKER_CONCURRENCY");
        std::env::remove_var("STORESYNC_REDIS_KEY_PREFIX");
    }

    #[test]
    fn unparseable_override_is_config_error() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("STORESYNC_DATABASE_POOL_SIZE", "lots");
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        std::env::remove_var("STORESYNC_DATABASE_POOL_SIZE");

        assert!(matches!(err, StoreSyncError::Config(message) if message.contains("STORESYNC_DATABASE_POOL_SIZE")));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let toml_content = r#"
[database]
path = "shop.db"

[sync]
page_size = 25
"#;
        let config = parse_config(toml_content, &PathBuf::from("storesync.toml")).unwrap();
        assert_eq!(config.database.path, "shop.db");
        assert_eq!(config.sync.page_size, 25);
        assert_eq!(config.sync.max_pages, 100);
        assert_eq!(config.breaker.failure_threshold, 5);
    }

    #[test]
    fn parses_json() {
        let json_content = r#"{ "worker": { "concurrency": 8 }, "log": { "json": true } }"#;
        let config = parse_config(json_content, &PathBuf::from("config.json")).unwrap();
        assert_eq!(config.worker.concurrency, 8);
        assert!(config.log.json);
    }

    #[test]
    fn unsupported_format_is_rejected() {
        let result = parse_config("key: value", &PathBuf::from("config.yaml"));
        assert!(matches!(result, Err(StoreSyncError::Config(_))));
    }

    #[test]
    fn missing_file_is_config_error() {
        let result = load_from_file(Path::new("/nonexistent/storesync.toml"));
        assert!(matches!(result, Err(StoreSyncError::Config(_))));
    }
}
