//! Process-level entry point.
//!
//! A [`GameService`] is created once at start-up, owns the store handle and
//! the counters, and hands out cheap clones of the three services. There is
//! no global connection: request handlers receive the services they need.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::aggregator::GameStateAggregator;
use crate::config::GameStateConfig;
use crate::directory::PlayerDirectory;
use crate::error::Result;
use crate::leaderboard::LeaderboardService;
use crate::metrics::{CounterSnapshot, ServiceCounters};
use crate::store::{SqliteStore, Store};

/// Owner of the shared store and the services built on it.
#[derive(Debug)]
pub struct GameService<S> {
    store: Arc<S>,
    counters: Arc<ServiceCounters>,
    directory: PlayerDirectory<S>,
    aggregator: GameStateAggregator<S>,
    leaderboard: LeaderboardService<S>,
}

impl GameService<SqliteStore> {
    /// Open the SQLite store described by `config` and wire the services.
    ///
    /// # Errors
    /// Returns [`crate::GameStateError::StoreUnavailable`] if the database
    /// cannot be opened.
    pub fn open(config: &GameStateConfig) -> Result<Self> {
        let store = SqliteStore::from_config(&config.persistence)?;
        Ok(Self::with_store(store, config))
    }
}

impl<S: Store> GameService<S> {
    /// Wire the services over an already-open store.
    #[must_use]
    pub fn with_store(store: S, config: &GameStateConfig) -> Self {
        let store = Arc::new(store);
        let counters = Arc::new(ServiceCounters::new());
        let leaderboard = LeaderboardService::new(
            Arc::clone(&store),
            Arc::clone(&counters),
            &config.leaderboard,
        );
        debug!(
            network_id = config.game_state.network_id,
            leaderboard_limit = leaderboard.limit(),
            "Game services wired"
        );
        Self {
            directory: PlayerDirectory::new(Arc::clone(&store), Arc::clone(&counters)),
            aggregator: GameStateAggregator::new(
                Arc::clone(&store),
                Arc::clone(&counters),
                config.game_state.clone(),
            ),
            leaderboard,
            store,
            counters,
        }
    }

    /// Player lifecycle operations.
    #[must_use]
    pub fn directory(&self) -> &PlayerDirectory<S> {
        &self.directory
    }

    /// Game-state views.
    #[must_use]
    pub fn aggregator(&self) -> &GameStateAggregator<S> {
        &self.aggregator
    }

    /// Leaderboard.
    #[must_use]
    pub fn leaderboard(&self) -> &LeaderboardService<S> {
        &self.leaderboard
    }

    /// The shared store, for collaborators that write parties or equipment.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Release the store.
    ///
    /// The store is closed once the last service clone handed out from
    /// here is dropped; outstanding clones are reported.
    pub fn shutdown(self) {
        let snapshot = self.counters.snapshot();
        let Self {
            store,
            directory,
            aggregator,
            leaderboard,
            ..
        } = self;
        drop((directory, aggregator, leaderboard));

        let outstanding = Arc::strong_count(&store) - 1;
        if outstanding > 0 {
            warn!(outstanding, "Store still referenced at shutdown");
        }
        drop(store);
        info!(
            created = snapshot.players_created,
            reactivated = snapshot.players_reactivated,
            left = snapshot.players_left,
            "Game service shut down"
        );
    }
}
