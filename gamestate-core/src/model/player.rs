//! Player records and the shapes they are returned in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GameStateError, Result};
use crate::model::{Equipment, GameStats, Membership};
use crate::types::{PlayerId, WalletAddress};

/// Level every new player starts at.
pub const STARTING_LEVEL: u32 = 1;

/// A player's identity and progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Internal key.
    pub id: PlayerId,
    /// External key. Never changes after creation.
    #[serde(rename = "walletAddress")]
    pub wallet: WalletAddress,
    /// Display name, if the player picked one.
    pub username: Option<String>,
    /// Progression level (≥ 1).
    pub level: u32,
    /// Experience points.
    pub experience: u64,
    /// Whether the player is currently in the game.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A player together with their statistics record, if one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerWithStats {
    /// The player.
    #[serde(flatten)]
    pub player: Player,
    /// Statistics as stored; `None` for legacy players without a record.
    pub game_stats: Option<GameStats>,
}

/// Full read-side view of a player: equipment, statistics and parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    /// The player.
    #[serde(flatten)]
    pub player: Player,
    /// Statistics as stored.
    pub game_stats: Option<GameStats>,
    /// Owned equipment.
    pub equipment: Vec<Equipment>,
    /// Party memberships with party summaries.
    pub parties: Vec<Membership>,
}

/// The mutable subset of a player.
///
/// Identity fields (id, wallet) are absent, and unknown fields
/// are rejected when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlayerUpdate {
    /// New display name.
    #[serde(default)]
    pub username: Option<String>,
    /// New level.
    #[serde(default)]
    pub level: Option<u32>,
    /// New experience total.
    #[serde(default)]
    pub experience: Option<u64>,
}

impl PlayerUpdate {
    /// Whether the update touches no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.level.is_none() && self.experience.is_none()
    }

    /// Check field-level preconditions.
    ///
    /// # Errors
    /// Returns [`GameStateError::InvalidInput`] for a level below
    /// [`STARTING_LEVEL`] or a blank username.
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = self.level {
            if level < STARTING_LEVEL {
                return Err(GameStateError::InvalidInput(format!(
                    "level must be at least {STARTING_LEVEL}, got {level}"
                )));
            }
        }
        if let Some(name) = &self.username {
            if name.trim().is_empty() {
                return Err(GameStateError::InvalidInput(
                    "username must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}
