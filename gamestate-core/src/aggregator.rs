//! Composes a player's identity, current party, equipment and statistics
//! into one [`GameState`] snapshot.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::config::GameStateViewConfig;
use crate::error::{GameStateError, Result};
use crate::metrics::{ServiceCounters, spans};
use crate::model::party::current_membership;
use crate::model::{Equipment, GameStats, Party, Player};
use crate::store::{Include, Store};
use crate::types::{PlayerId, WalletAddress};

/// The player part of a [`GameState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Internal key.
    pub id: PlayerId,
    /// External key.
    pub wallet_address: WalletAddress,
    /// Display name.
    pub username: Option<String>,
    /// Progression level.
    pub level: u32,
    /// Experience points.
    pub experience: u64,
    /// Whether the player is currently in the game.
    pub is_active: bool,
    /// Configured chain / network identifier.
    pub network_id: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl PlayerView {
    fn new(player: Player, network_id: u64) -> Self {
        Self {
            id: player.id,
            wallet_address: player.wallet,
            username: player.username,
            level: player.level,
            experience: player.experience,
            is_active: player.is_active,
            network_id,
            created_at: player.created_at,
            updated_at: player.updated_at,
        }
    }
}

/// Everything a client needs about one player, as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Identity and progression.
    pub player: PlayerView,
    /// Current party with its members, if any.
    pub party: Option<Party>,
    /// Owned equipment, as stored.
    pub equipment: Vec<Equipment>,
    /// Statistics; the default object when none are stored.
    pub stats: GameStats,
}

/// Builds [`GameState`] views. Read-only.
#[derive(Debug)]
pub struct GameStateAggregator<S> {
    store: Arc<S>,
    counters: Arc<ServiceCounters>,
    config: GameStateViewConfig,
}

impl<S> Clone for GameStateAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            counters: Arc::clone(&self.counters),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> GameStateAggregator<S> {
    /// Build an aggregator over a shared store.
    #[must_use]
    pub fn new(store: Arc<S>, counters: Arc<ServiceCounters>, config: GameStateViewConfig) -> Self {
        Self {
            store,
            counters,
            config,
        }
    }

    /// Compose the game state of `player_id`.
    ///
    /// The current party is the membership flagged current, falling back to
    /// the latest joined one. Missing statistics read as
    /// [`GameStats::default`].
    ///
    /// # Errors
    /// - [`GameStateError::NotFound`] if no player has this id.
    /// - [`GameStateError::StoreUnavailable`] on store failure.
    pub fn get_game_state(&self, player_id: PlayerId) -> Result<GameState> {
        let _span = info_span!(spans::GAME_STATE, player = %player_id).entered();
        let start = Instant::now();

        let record = self
            .store
            .find_player_by_id(player_id, Include::GAME_STATE)?
            .ok_or_else(|| GameStateError::player_not_found(player_id))?;

        let party = current_membership(&record.memberships).map(|m| m.party.clone());
        let stats = record.game_stats.unwrap_or_default();
        if record.game_stats.is_none() {
            debug!("No stored statistics, using defaults");
        }

        let state = GameState {
            player: PlayerView::new(record.player, self.config.network_id),
            party,
            equipment: record.equipment,
            stats,
        };

        ServiceCounters::bump(&self.counters.game_state_reads);
        debug!(
            has_party = state.party.is_some(),
            equipment = state.equipment.len(),
            default_stats = state.stats.is_default(),
            elapsed_us = start.elapsed().as_micros(),
            "Game state composed"
        );
        Ok(state)
    }
}
