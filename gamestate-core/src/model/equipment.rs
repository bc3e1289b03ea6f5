//! Equipment owned by a player. Read through unchanged by the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EquipmentId, PlayerId};

/// A single piece of equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    /// Record identifier.
    pub id: EquipmentId,
    /// Owning player.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Slot the item occupies (e.g. `"weapon"`, `"head"`).
    pub slot: String,
    /// Optional rarity tier.
    pub rarity: Option<String>,
    /// Item power score.
    pub power: u64,
    /// When the player obtained it.
    pub acquired_at: DateTime<Utc>,
}

/// Fields needed to record a new piece of equipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEquipment {
    /// Display name.
    pub name: String,
    /// Slot the item occupies.
    pub slot: String,
    /// Optional rarity tier.
    pub rarity: Option<String>,
    /// Item power score.
    pub power: u64,
}

impl NewEquipment {
    /// Convenience constructor for an item without rarity.
    #[must_use]
    pub fn new(name: impl Into<String>, slot: impl Into<String>, power: u64) -> Self {
        Self {
            name: name.into(),
            slot: slot.into(),
            rarity: None,
            power,
        }
    }

    /// Set the rarity tier.
    #[must_use]
    pub fn with_rarity(mut self, rarity: impl Into<String>) -> Self {
        self.rarity = Some(rarity.into());
        self
    }
}
