//! Log output setup for processes embedding the service.

use tracing_subscriber::EnvFilter;

use crate::config::GeneralConfig;
use crate::error::{GameStateError, Result};

/// Install a global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from
/// `config.log_level`. With `config.json_logs` every event is a JSON line.
///
/// # Errors
/// Returns [`GameStateError::Config`] if the level is not a valid filter or
/// a global subscriber is already installed.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| GameStateError::Config(format!("log_level: {e}")))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| GameStateError::Config(format!("tracing subscriber: {e}")))
}
