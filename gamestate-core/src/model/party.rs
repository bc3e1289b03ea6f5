//! Parties and the player↔party membership relation.
//!
//! A player may belong to several parties over time. At most one membership
//! per player carries `is_current`; the game-state view surfaces that one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PartyId, PlayerId};

/// A party, optionally with its member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    /// Party identifier.
    pub id: PartyId,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Members, present only when the party was loaded with members.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub members: Option<Vec<PartyMember>>,
}

/// One member entry inside a loaded [`Party`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyMember {
    /// The member.
    pub player_id: PlayerId,
    /// The member's username at load time.
    pub username: Option<String>,
    /// When they joined.
    pub joined_at: DateTime<Utc>,
}

/// A membership as seen from the player's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// The party joined.
    pub party: Party,
    /// When the player joined.
    pub joined_at: DateTime<Utc>,
    /// Whether this is the player's current party.
    pub is_current: bool,
}

/// Pick the player's current membership.
///
/// The membership flagged `is_current` wins. Without a flag the most recently
/// joined membership is used, ties broken by party id, so the choice never
/// depends on store ordering.
#[must_use]
pub fn current_membership(memberships: &[Membership]) -> Option<&Membership> {
    memberships
        .iter()
        .find(|m| m.is_current)
        .or_else(|| {
            memberships.iter().max_by(|a, b| {
                a.joined_at
                    .cmp(&b.joined_at)
                    .then_with(|| b.party.id.cmp(&a.party.id))
            })
        })
}
