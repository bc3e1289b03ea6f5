//! Configuration for the game-state service.
//!
//! Maps directly to `gamestate.toml`. Every section and field is optional;
//! missing values fall back to the defaults below.
//!
//! ```toml
//! [general]
//! log_level = "debug"
//!
//! [persistence]
//! path = "players.db"
//!
//! [leaderboard]
//! limit = 25
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Hard cap on leaderboard length; a configured limit can only lower it.
pub const MAX_LEADERBOARD_SIZE: usize = 50;

/// Network identifier reported when none is configured (Ethereum mainnet).
pub const DEFAULT_NETWORK_ID: u64 = 1;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameStateConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Store settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Game-state view settings.
    #[serde(default)]
    pub game_state: GameStateViewConfig,
    /// Leaderboard settings.
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
}

impl GameStateConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `GameStateError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::GameStateError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database file. `None` keeps everything in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: None,
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }
}

/// Settings for the aggregated game-state view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateViewConfig {
    /// Chain / network identifier reported in every player view.
    #[serde(default = "default_network_id")]
    pub network_id: u64,
}

impl Default for GameStateViewConfig {
    fn default() -> Self {
        Self {
            network_id: DEFAULT_NETWORK_ID,
        }
    }
}

/// Leaderboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Maximum entries returned. Values above [`MAX_LEADERBOARD_SIZE`] are
    /// clamped.
    #[serde(default = "default_leaderboard_limit")]
    pub limit: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            limit: MAX_LEADERBOARD_SIZE,
        }
    }
}

impl LeaderboardConfig {
    /// The limit actually applied.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit.min(MAX_LEADERBOARD_SIZE)
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_busy_timeout() -> u64 { 5000 }
fn default_network_id() -> u64 { DEFAULT_NETWORK_ID }
fn default_leaderboard_limit() -> usize { MAX_LEADERBOARD_SIZE }
