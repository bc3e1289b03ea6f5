//! Record types stored by a [`crate::store::Store`].
//!
//! The player is the aggregate root; parties, equipment and statistics hang
//! off it and are loaded on demand through [`crate::store::Include`].

pub mod equipment;
pub mod party;
pub mod player;
pub mod stats;

pub use equipment::{Equipment, NewEquipment};
pub use party::{Membership, Party, PartyMember};
pub use player::{Player, PlayerProfile, PlayerUpdate, PlayerWithStats};
pub use stats::GameStats;
