//! Tracing subscriber setup

use anyhow::anyhow;
use storesync_domain::LogConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log.level`; `log.json` switches to JSON lines.
pub fn init(log: &LogConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&log.level)
            .map_err(|e| anyhow!("invalid log level {:?}: {e}", log.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if log.json { builder.json().try_init() } else { builder.try_init() };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
