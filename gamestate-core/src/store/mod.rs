//! Persistence boundary.
//!
//! The services only talk to storage through [`Store`]. Two backends ship:
//!
//! - [`SqliteStore`]: a `rusqlite` database, file-backed or in-memory.
//! - [`MemoryStore`]: `parking_lot`-guarded maps, for tests and embedding.
//!
//! Parties and equipment are written by other parts of a game backend;
//! [`RelationWriter`] is the surface they (and the tests) use.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::model::{
    Equipment, GameStats, Membership, NewEquipment, Party, Player, PlayerProfile, PlayerWithStats,
};
use crate::types::{PartyId, PlayerId, WalletAddress};

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Eager-loading selection
// ---------------------------------------------------------------------------

/// How much of a player's parties to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartyDetail {
    /// Do not load memberships.
    #[default]
    None,
    /// Load memberships with party id, name and creation time.
    Summary,
    /// Load memberships with each party's full member list.
    WithMembers,
}

/// Which relations to load alongside a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Include {
    /// Load owned equipment.
    pub equipment: bool,
    /// Load the statistics record.
    pub game_stats: bool,
    /// Load party memberships.
    pub parties: PartyDetail,
}

impl Include {
    /// Player row only.
    pub const NONE: Self = Self {
        equipment: false,
        game_stats: false,
        parties: PartyDetail::None,
    };

    /// Player plus statistics.
    pub const STATS: Self = Self {
        equipment: false,
        game_stats: true,
        parties: PartyDetail::None,
    };

    /// Player, statistics, equipment and party summaries.
    pub const PROFILE: Self = Self {
        equipment: true,
        game_stats: true,
        parties: PartyDetail::Summary,
    };

    /// Everything, with full party member lists.
    pub const GAME_STATE: Self = Self {
        equipment: true,
        game_stats: true,
        parties: PartyDetail::WithMembers,
    };
}

// ---------------------------------------------------------------------------
// Records and write requests
// ---------------------------------------------------------------------------

/// A player plus whichever relations were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    /// The player row.
    pub player: Player,
    /// Statistics, if requested and present.
    pub game_stats: Option<GameStats>,
    /// Equipment, empty unless requested.
    pub equipment: Vec<Equipment>,
    /// Memberships, empty unless requested.
    pub memberships: Vec<Membership>,
}

impl PlayerRecord {
    /// A record with no relations loaded.
    #[must_use]
    pub fn bare(player: Player) -> Self {
        Self {
            player,
            game_stats: None,
            equipment: Vec::new(),
            memberships: Vec::new(),
        }
    }
}

impl From<PlayerRecord> for PlayerWithStats {
    fn from(record: PlayerRecord) -> Self {
        Self {
            player: record.player,
            game_stats: record.game_stats,
        }
    }
}

impl From<PlayerRecord> for PlayerProfile {
    fn from(record: PlayerRecord) -> Self {
        Self {
            player: record.player,
            game_stats: record.game_stats,
            equipment: record.equipment,
            parties: record.memberships,
        }
    }
}

/// Fields for a brand-new player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayer {
    /// External key; must be unique.
    pub wallet: WalletAddress,
    /// Optional display name.
    pub username: Option<String>,
}

/// A partial update applied by [`Store::update_player`].
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerChanges {
    /// New display name.
    pub username: Option<String>,
    /// New level.
    pub level: Option<u32>,
    /// New experience total.
    pub experience: Option<u64>,
    /// New lifecycle flag.
    pub is_active: Option<bool>,
}

impl PlayerChanges {
    /// Change only the lifecycle flag.
    #[must_use]
    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Record-level access to players and their relations.
///
/// Implementations must be `Send + Sync`; the services share one store
/// handle across request threads.
pub trait Store: Send + Sync {
    /// Look a player up by wallet address.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend fails.
    fn find_player_by_wallet(
        &self,
        wallet: &WalletAddress,
        include: Include,
    ) -> StoreResult<Option<PlayerRecord>>;

    /// Look a player up by id. All requested relations come from one
    /// consistent read.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend fails.
    fn find_player_by_id(&self, id: PlayerId, include: Include)
    -> StoreResult<Option<PlayerRecord>>;

    /// Create a player and its default [`GameStats`] as one atomic unit.
    /// The returned record carries the statistics.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] if the wallet is already taken.
    fn create_player(&self, new: NewPlayer) -> StoreResult<PlayerRecord>;

    /// Apply `changes`, bump `updated_at`, and return the player with
    /// statistics.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if `id` does not exist.
    fn update_player(&self, id: PlayerId, changes: &PlayerChanges) -> StoreResult<PlayerRecord>;

    /// Up to `limit` players with statistics, ordered by level descending,
    /// then experience descending, then id ascending.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend fails.
    fn list_players_by_level_desc(&self, limit: usize) -> StoreResult<Vec<PlayerRecord>>;
}

/// Writes owned by collaborators outside the core: parties, equipment and
/// statistics updates.
pub trait RelationWriter: Send + Sync {
    /// Create an empty party.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend fails.
    fn create_party(&self, name: &str) -> StoreResult<Party>;

    /// Add `player` to `party`. With `make_current`, every other membership
    /// of that player loses its current flag.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if either side is missing and
    /// [`StoreError::Conflict`] if the player is already a member.
    fn join_party(&self, player: PlayerId, party: PartyId, make_current: bool)
    -> StoreResult<()>;

    /// Give `player` a new piece of equipment.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the player is missing.
    fn add_equipment(&self, player: PlayerId, item: NewEquipment) -> StoreResult<Equipment>;

    /// Insert or replace the statistics record of `player`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the player is missing.
    fn record_game_stats(&self, player: PlayerId, stats: GameStats) -> StoreResult<()>;
}

/// Leaderboard ordering shared by both backends.
pub(crate) fn leaderboard_order(a: &Player, b: &Player) -> std::cmp::Ordering {
    b.level
        .cmp(&a.level)
        .then_with(|| b.experience.cmp(&a.experience))
        .then_with(|| a.id.cmp(&b.id))
}
