//! Per-player lifetime statistics.

use serde::{Deserialize, Serialize};

/// Lifetime statistics for one player.
///
/// A player has at most one of these. A missing record is a valid state and
/// reads as [`GameStats::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    /// Dungeons fully cleared.
    pub dungeons_cleared: u64,
    /// Total loot collected.
    pub total_loot: u64,
    /// Experience earned across all sessions.
    pub total_experience: u64,
    /// Highest level ever reached.
    pub highest_level: u32,
    /// Completed game sessions.
    pub games_played: u64,
}

impl Default for GameStats {
    fn default() -> Self {
        Self {
            dungeons_cleared: 0,
            total_loot: 0,
            total_experience: 0,
            highest_level: 1,
            games_played: 0,
        }
    }
}

impl GameStats {
    /// Whether this is the zero-state object a new player starts with.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
