//! Lifetime ranking of players by level.
//!
//! Active and inactive players are ranked alike. Equal levels are ordered
//! by experience, then by id, so the board is stable between calls.

use std::sync::Arc;

use tracing::{debug, info_span};

use crate::config::LeaderboardConfig;
use crate::error::Result;
use crate::metrics::{ServiceCounters, spans};
use crate::model::PlayerWithStats;
use crate::store::Store;

/// Serves the bounded leaderboard.
#[derive(Debug)]
pub struct LeaderboardService<S> {
    store: Arc<S>,
    counters: Arc<ServiceCounters>,
    limit: usize,
}

impl<S> Clone for LeaderboardService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            counters: Arc::clone(&self.counters),
            limit: self.limit,
        }
    }
}

impl<S: Store> LeaderboardService<S> {
    /// Build a leaderboard over a shared store.
    #[must_use]
    pub fn new(store: Arc<S>, counters: Arc<ServiceCounters>, config: &LeaderboardConfig) -> Self {
        Self {
            store,
            counters,
            limit: config.effective_limit(),
        }
    }

    /// Number of entries the board is capped at.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Top players by level, at most [`Self::limit`] of them.
    ///
    /// # Errors
    /// Returns [`crate::GameStateError::StoreUnavailable`] on store failure.
    pub fn get_leaderboard(&self) -> Result<Vec<PlayerWithStats>> {
        let _span = info_span!(spans::LEADERBOARD, limit = self.limit).entered();

        let mut rows = self.store.list_players_by_level_desc(self.limit)?;
        // A store may ignore the limit; the cap is enforced here too.
        rows.truncate(self.limit);

        ServiceCounters::bump(&self.counters.leaderboard_reads);
        debug!(entries = rows.len(), "Leaderboard served");
        Ok(rows.into_iter().map(PlayerWithStats::from).collect())
    }
}
