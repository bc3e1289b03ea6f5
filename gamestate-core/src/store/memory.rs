//! In-process store backed by hash maps.
//!
//! Every operation takes the table lock once, so reads are consistent
//! snapshots and `create_player` is atomic.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use super::{
    Include, NewPlayer, PartyDetail, PlayerChanges, PlayerRecord, RelationWriter, Store,
    StoreResult, leaderboard_order,
};
use crate::error::StoreError;
use crate::model::{
    Equipment, GameStats, Membership, NewEquipment, Party, PartyMember, Player,
    player::STARTING_LEVEL,
};
use crate::types::{EquipmentId, PartyId, PlayerId, WalletAddress};

#[derive(Debug, Clone)]
struct MembershipRow {
    player_id: PlayerId,
    party_id: PartyId,
    joined_at: chrono::DateTime<Utc>,
    is_current: bool,
}

#[derive(Debug, Default)]
struct Tables {
    players: HashMap<PlayerId, Player>,
    by_wallet: HashMap<WalletAddress, PlayerId>,
    stats: HashMap<PlayerId, GameStats>,
    parties: HashMap<PartyId, Party>,
    // Insertion order is kept, mirroring row order in a table.
    memberships: Vec<MembershipRow>,
    equipment: Vec<Equipment>,
}

impl Tables {
    fn load(&self, player: &Player, include: Include) -> PlayerRecord {
        let mut record = PlayerRecord::bare(player.clone());

        if include.game_stats {
            record.game_stats = self.stats.get(&player.id).copied();
        }
        if include.equipment {
            record.equipment = self
                .equipment
                .iter()
                .filter(|e| e.player_id == player.id)
                .cloned()
                .collect();
        }
        if include.parties != PartyDetail::None {
            record.memberships = self
                .memberships
                .iter()
                .filter(|m| m.player_id == player.id)
                .filter_map(|m| {
                    let party = self.parties.get(&m.party_id)?;
                    Some(Membership {
                        party: self.party_view(party, include.parties),
                        joined_at: m.joined_at,
                        is_current: m.is_current,
                    })
                })
                .collect();
        }
        record
    }

    fn party_view(&self, party: &Party, detail: PartyDetail) -> Party {
        let mut view = party.clone();
        if detail == PartyDetail::WithMembers {
            let members = self
                .memberships
                .iter()
                .filter(|m| m.party_id == party.id)
                .map(|m| PartyMember {
                    player_id: m.player_id,
                    username: self
                        .players
                        .get(&m.player_id)
                        .and_then(|p| p.username.clone()),
                    joined_at: m.joined_at,
                })
                .collect();
            view.members = Some(members);
        }
        view
    }
}

/// A [`Store`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of player rows.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.tables.read().players.len()
    }

    /// Drop a player's statistics record, leaving the player in place.
    ///
    /// Models legacy rows written before statistics existed.
    pub fn remove_game_stats(&self, player: PlayerId) -> bool {
        self.tables.write().stats.remove(&player).is_some()
    }
}

impl Store for MemoryStore {
    fn find_player_by_wallet(
        &self,
        wallet: &WalletAddress,
        include: Include,
    ) -> StoreResult<Option<PlayerRecord>> {
        let tables = self.tables.read();
        Ok(tables
            .by_wallet
            .get(wallet)
            .and_then(|id| tables.players.get(id))
            .map(|p| tables.load(p, include)))
    }

    fn find_player_by_id(
        &self,
        id: PlayerId,
        include: Include,
    ) -> StoreResult<Option<PlayerRecord>> {
        let tables = self.tables.read();
        Ok(tables.players.get(&id).map(|p| tables.load(p, include)))
    }

    fn create_player(&self, new: NewPlayer) -> StoreResult<PlayerRecord> {
        let mut tables = self.tables.write();
        if tables.by_wallet.contains_key(&new.wallet) {
            return Err(StoreError::Conflict(format!(
                "wallet {} already registered",
                new.wallet
            )));
        }

        let now = Utc::now();
        let player = Player {
            id: PlayerId::new(),
            wallet: new.wallet,
            username: new.username,
            level: STARTING_LEVEL,
            experience: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let stats = GameStats::default();

        tables.by_wallet.insert(player.wallet.clone(), player.id);
        tables.stats.insert(player.id, stats);
        tables.players.insert(player.id, player.clone());

        let mut record = PlayerRecord::bare(player);
        record.game_stats = Some(stats);
        Ok(record)
    }

    fn update_player(&self, id: PlayerId, changes: &PlayerChanges) -> StoreResult<PlayerRecord> {
        let mut tables = self.tables.write();
        let player = tables.players.get_mut(&id).ok_or(StoreError::NotFound)?;

        if let Some(username) = &changes.username {
            player.username = Some(username.clone());
        }
        if let Some(level) = changes.level {
            player.level = level;
        }
        if let Some(experience) = changes.experience {
            player.experience = experience;
        }
        if let Some(is_active) = changes.is_active {
            player.is_active = is_active;
        }
        player.updated_at = Utc::now();

        let player = player.clone();
        Ok(tables.load(&player, Include::STATS))
    }

    fn list_players_by_level_desc(&self, limit: usize) -> StoreResult<Vec<PlayerRecord>> {
        let tables = self.tables.read();
        let mut players: Vec<&Player> = tables.players.values().collect();
        players.sort_by(|a, b| leaderboard_order(a, b));
        Ok(players
            .into_iter()
            .take(limit)
            .map(|p| tables.load(p, Include::STATS))
            .collect())
    }
}

impl RelationWriter for MemoryStore {
    fn create_party(&self, name: &str) -> StoreResult<Party> {
        let party = Party {
            id: PartyId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
            members: None,
        };
        self.tables.write().parties.insert(party.id, party.clone());
        Ok(party)
    }

    fn join_party(
        &self,
        player: PlayerId,
        party: PartyId,
        make_current: bool,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.players.contains_key(&player) || !tables.parties.contains_key(&party) {
            return Err(StoreError::NotFound);
        }
        if tables
            .memberships
            .iter()
            .any(|m| m.player_id == player && m.party_id == party)
        {
            return Err(StoreError::Conflict(format!(
                "player {player} already in party {party}"
            )));
        }
        if make_current {
            for m in tables.memberships.iter_mut().filter(|m| m.player_id == player) {
                m.is_current = false;
            }
        }
        tables.memberships.push(MembershipRow {
            player_id: player,
            party_id: party,
            joined_at: Utc::now(),
            is_current: make_current,
        });
        Ok(())
    }

    fn add_equipment(&self, player: PlayerId, item: NewEquipment) -> StoreResult<Equipment> {
        let mut tables = self.tables.write();
        if !tables.players.contains_key(&player) {
            return Err(StoreError::NotFound);
        }
        let equipment = Equipment {
            id: EquipmentId::new(),
            player_id: player,
            name: item.name,
            slot: item.slot,
            rarity: item.rarity,
            power: item.power,
            acquired_at: Utc::now(),
        };
        tables.equipment.push(equipment.clone());
        Ok(equipment)
    }

    fn record_game_stats(&self, player: PlayerId, stats: GameStats) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.players.contains_key(&player) {
            return Err(StoreError::NotFound);
        }
        tables.stats.insert(player, stats);
        Ok(())
    }
}
