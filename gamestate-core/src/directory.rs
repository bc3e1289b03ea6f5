//! Player identity lifecycle: connect, leave, lookup and update.
//!
//! `connect` is create-or-reactivate and safe to repeat. Two concurrent
//! connects for a brand-new wallet race on creation; the store's unique
//! wallet constraint rejects the loser with a conflict, and the loser then
//! reactivates the winner's row instead of failing.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::error::{GameStateError, Result, StoreError};
use crate::metrics::{ServiceCounters, spans};
use crate::model::{PlayerProfile, PlayerUpdate, PlayerWithStats};
use crate::store::{Include, NewPlayer, PlayerChanges, PlayerRecord, Store};
use crate::types::{PlayerId, WalletAddress};

/// Treat an absent or blank username as "not provided".
fn provided_username(username: Option<&str>) -> Option<&str> {
    username.filter(|name| !name.trim().is_empty())
}

/// Owns player identity lifecycle on top of a [`Store`].
#[derive(Debug)]
pub struct PlayerDirectory<S> {
    store: Arc<S>,
    counters: Arc<ServiceCounters>,
}

impl<S> Clone for PlayerDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<S: Store> PlayerDirectory<S> {
    /// Build a directory over a shared store.
    #[must_use]
    pub fn new(store: Arc<S>, counters: Arc<ServiceCounters>) -> Self {
        Self { store, counters }
    }

    /// Connect a player by wallet, creating them on first sight.
    ///
    /// An existing player is set active and, if `username` is given,
    /// non-blank and different, renamed. A new player starts at level 1
    /// with zero experience and default statistics. Both branches return
    /// the same shape.
    ///
    /// # Errors
    /// - [`GameStateError::InvalidInput`] if `wallet` is blank.
    /// - [`GameStateError::Conflict`] if creation conflicted and the winning
    ///   row still could not be found.
    /// - [`GameStateError::StoreUnavailable`] on store failure.
    pub fn connect(&self, wallet: &str, username: Option<&str>) -> Result<PlayerWithStats> {
        let wallet = WalletAddress::parse(wallet)?;
        let username = provided_username(username);
        let _span = info_span!(spans::CONNECT, wallet = %wallet).entered();

        if let Some(existing) = self.store.find_player_by_wallet(&wallet, Include::NONE)? {
            return self.reactivate(existing, username);
        }

        let new = NewPlayer {
            wallet: wallet.clone(),
            username: username.map(str::to_string),
        };
        match self.store.create_player(new) {
            Ok(created) => {
                ServiceCounters::bump(&self.counters.players_created);
                info!(player = %created.player.id, "Player created");
                Ok(created.into())
            }
            Err(StoreError::Conflict(reason)) => {
                warn!(%reason, "Lost creation race, reactivating existing player");
                ServiceCounters::bump(&self.counters.conflict_retries);
                let existing = self
                    .store
                    .find_player_by_wallet(&wallet, Include::NONE)?
                    .ok_or(GameStateError::Conflict(reason))?;
                self.reactivate(existing, username)
            }
            Err(other) => Err(other.into()),
        }
    }

    fn reactivate(&self, existing: PlayerRecord, username: Option<&str>) -> Result<PlayerWithStats> {
        let player = existing.player;
        let rename = username
            .filter(|name| player.username.as_deref() != Some(*name))
            .map(str::to_string);

        let changes = PlayerChanges {
            username: rename,
            is_active: Some(true),
            ..PlayerChanges::default()
        };
        let updated = match self.store.update_player(player.id, &changes) {
            Ok(updated) => updated,
            Err(StoreError::NotFound) => return Err(GameStateError::player_not_found(player.id)),
            Err(other) => return Err(other.into()),
        };

        ServiceCounters::bump(&self.counters.players_reactivated);
        info!(
            player = %player.id,
            was_active = player.is_active,
            renamed = changes.username.is_some(),
            "Player reactivated"
        );
        Ok(updated.into())
    }

    /// Mark a player as having left the game.
    ///
    /// Only the active flag changes. Leaving twice is not an error.
    ///
    /// # Errors
    /// - [`GameStateError::NotFound`] if no player has this id.
    /// - [`GameStateError::StoreUnavailable`] on store failure.
    pub fn leave(&self, player_id: PlayerId) -> Result<()> {
        let _span = info_span!(spans::LEAVE, player = %player_id).entered();

        match self.store.update_player(player_id, &PlayerChanges::active(false)) {
            Ok(_) => {
                ServiceCounters::bump(&self.counters.players_left);
                info!("Player left");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(GameStateError::player_not_found(player_id)),
            Err(other) => Err(other.into()),
        }
    }

    /// Look a player up by wallet, with equipment, statistics and party
    /// summaries.
    ///
    /// # Errors
    /// - [`GameStateError::InvalidInput`] if `wallet` is blank.
    /// - [`GameStateError::NotFound`] if no player has this wallet.
    /// - [`GameStateError::StoreUnavailable`] on store failure.
    pub fn get_by_wallet(&self, wallet: &str) -> Result<PlayerProfile> {
        let wallet = WalletAddress::parse(wallet)?;
        let record = self
            .store
            .find_player_by_wallet(&wallet, Include::PROFILE)?
            .ok_or_else(|| GameStateError::player_not_found(&wallet))?;
        debug!(player = %record.player.id, "Profile loaded by wallet");
        Ok(record.into())
    }

    /// Look a player up by id, in the same shape as [`Self::get_by_wallet`].
    ///
    /// # Errors
    /// - [`GameStateError::NotFound`] if no player has this id.
    /// - [`GameStateError::StoreUnavailable`] on store failure.
    pub fn get_by_id(&self, player_id: PlayerId) -> Result<PlayerProfile> {
        self.store
            .find_player_by_id(player_id, Include::PROFILE)?
            .map(PlayerProfile::from)
            .ok_or_else(|| GameStateError::player_not_found(player_id))
    }

    /// Apply a structured update and return the refreshed player with
    /// statistics. An empty update still returns the current record.
    ///
    /// # Errors
    /// - [`GameStateError::InvalidInput`] if the update fails validation.
    /// - [`GameStateError::NotFound`] if no player has this id.
    /// - [`GameStateError::StoreUnavailable`] on store failure.
    pub fn update_player(&self, player_id: PlayerId, update: PlayerUpdate) -> Result<PlayerWithStats> {
        update.validate()?;
        let _span = info_span!(spans::UPDATE, player = %player_id).entered();

        if update.is_empty() {
            return self
                .store
                .find_player_by_id(player_id, Include::STATS)?
                .map(PlayerWithStats::from)
                .ok_or_else(|| GameStateError::player_not_found(player_id));
        }

        let changes = PlayerChanges {
            username: update.username,
            level: update.level,
            experience: update.experience,
            is_active: None,
        };
        match self.store.update_player(player_id, &changes) {
            Ok(updated) => {
                info!(
                    level = updated.player.level,
                    experience = updated.player.experience,
                    "Player updated"
                );
                Ok(updated.into())
            }
            Err(StoreError::NotFound) => Err(GameStateError::player_not_found(player_id)),
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::GameStats;
    use crate::store::MemoryStore;
    use crate::store::StoreResult;

    fn directory() -> PlayerDirectory<MemoryStore> {
        PlayerDirectory::new(Arc::new(MemoryStore::new()), Arc::new(ServiceCounters::new()))
    }

    #[test]
    fn connect_creates_new_player() {
        let dir = directory();
        let p = dir.connect("0xABC", Some("Rin")).expect("connect");

        assert_eq!(p.player.wallet.as_str(), "0xABC");
        assert_eq!(p.player.username.as_deref(), Some("Rin"));
        assert_eq!(p.player.level, 1);
        assert_eq!(p.player.experience, 0);
        assert!(p.player.is_active);
        assert_eq!(p.game_stats, Some(GameStats::default()));
        assert_eq!(dir.counters.snapshot().players_created, 1);
    }

    #[test]
    fn connect_is_idempotent() {
        let dir = directory();
        let first = dir.connect("0xABC", None).expect("first");
        let second = dir.connect("0xABC", None).expect("second");

        assert_eq!(first.player.id, second.player.id);
        assert_eq!(dir.store.player_count(), 1);
        let snap = dir.counters.snapshot();
        assert_eq!(snap.players_created, 1);
        assert_eq!(snap.players_reactivated, 1);
    }

    #[test]
    fn connect_rejects_blank_wallet() {
        let dir = directory();
        let err = dir.connect("", Some("Rin")).expect_err("blank");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(dir.store.player_count(), 0);
    }

    #[test]
    fn reconnect_renames_only_when_different() {
        let dir = directory();
        let created = dir.connect("0xABC", Some("Rin")).expect("create");

        let same = dir.connect("0xABC", Some("Rin")).expect("same");
        assert_eq!(same.player.username.as_deref(), Some("Rin"));

        let blank = dir.connect("0xABC", Some("")).expect("blank");
        assert_eq!(blank.player.username.as_deref(), Some("Rin"));

        let renamed = dir.connect("0xABC", Some("Rin the Bold")).expect("rename");
        assert_eq!(renamed.player.id, created.player.id);
        assert_eq!(renamed.player.username.as_deref(), Some("Rin the Bold"));
    }

    #[test]
    fn leave_then_connect_reactivates() {
        let dir = directory();
        let p = dir.connect("0xABC", None).expect("connect").player;

        dir.leave(p.id).expect("leave");
        dir.leave(p.id).expect("leave twice");
        let left = dir.get_by_id(p.id).expect("get");
        assert!(!left.player.is_active);
        assert_eq!(left.player.level, p.level);

        let back = dir.connect("0xABC", Some("Kai")).expect("reconnect");
        assert!(back.player.is_active);
        assert_eq!(back.player.username.as_deref(), Some("Kai"));
    }

    #[test]
    fn leave_unknown_is_not_found() {
        let dir = directory();
        let err = dir.leave(PlayerId::new()).expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn get_by_wallet_not_found() {
        let dir = directory();
        let err = dir.get_by_wallet("0xNOPE").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn update_player_structured() {
        let dir = directory();
        let p = dir.connect("0xABC", Some("Rin")).expect("connect").player;

        let update = PlayerUpdate {
            level: Some(12),
            experience: Some(4_500),
            ..PlayerUpdate::default()
        };
        let updated = dir.update_player(p.id, update).expect("update");
        assert_eq!(updated.player.level, 12);
        assert_eq!(updated.player.experience, 4_500);
        assert_eq!(updated.player.username.as_deref(), Some("Rin"));
        assert_eq!(updated.player.wallet, p.wallet);
        assert!(updated.game_stats.is_some());

        let unchanged = dir
            .update_player(p.id, PlayerUpdate::default())
            .expect("empty update");
        assert_eq!(unchanged.player.level, 12);
    }

    #[test]
    fn update_player_errors() {
        let dir = directory();
        let err = dir
            .update_player(PlayerId::new(), PlayerUpdate::default())
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let p = dir.connect("0xABC", None).expect("connect").player;
        let err = dir
            .update_player(
                p.id,
                PlayerUpdate {
                    level: Some(0),
                    ..PlayerUpdate::default()
                },
            )
            .expect_err("level 0");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    /// Store that reports a conflict on the first create, as if another
    /// connect had inserted the same wallet in between.
    struct RacingStore {
        inner: MemoryStore,
        raced: parking_lot::Mutex<bool>,
    }

    impl Store for RacingStore {
        fn find_player_by_wallet(
            &self,
            wallet: &WalletAddress,
            include: Include,
        ) -> StoreResult<Option<PlayerRecord>> {
            self.inner.find_player_by_wallet(wallet, include)
        }

        fn find_player_by_id(
            &self,
            id: PlayerId,
            include: Include,
        ) -> StoreResult<Option<PlayerRecord>> {
            self.inner.find_player_by_id(id, include)
        }

        fn create_player(&self, new: NewPlayer) -> StoreResult<PlayerRecord> {
            let mut raced = self.raced.lock();
            if !*raced {
                *raced = true;
                let mut winner = new.clone();
                winner.username = Some("Winner".to_string());
                self.inner.create_player(winner)?;
            }
            self.inner.create_player(new)
        }

        fn update_player(
            &self,
            id: PlayerId,
            changes: &PlayerChanges,
        ) -> StoreResult<PlayerRecord> {
            self.inner.update_player(id, changes)
        }

        fn list_players_by_level_desc(&self, limit: usize) -> StoreResult<Vec<PlayerRecord>> {
            self.inner.list_players_by_level_desc(limit)
        }
    }

    #[test]
    fn creation_race_falls_back_to_reactivation() {
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
            raced: parking_lot::Mutex::new(false),
        });
        let dir = PlayerDirectory::new(Arc::clone(&store), Arc::new(ServiceCounters::new()));

        let p = dir.connect("0xABC", Some("Loser")).expect("connect");
        assert_eq!(store.inner.player_count(), 1);
        assert_eq!(p.player.username.as_deref(), Some("Loser"));
        assert!(p.player.is_active);
        assert_eq!(dir.counters.snapshot().conflict_retries, 1);
    }

    #[derive(Debug, Clone, Copy)]
    enum Failure {
        /// Every call fails in the backend.
        Backend,
        /// Creation conflicts but the conflicting row is never visible.
        NoWinner,
        /// The row is found but deleted before the reactivating update.
        VanishedRow,
    }

    /// Store that fails in one scripted way on top of a working
    /// [`MemoryStore`].
    struct ScriptedStore {
        inner: MemoryStore,
        failure: Failure,
    }

    impl ScriptedStore {
        fn new(failure: Failure) -> Self {
            Self {
                inner: MemoryStore::new(),
                failure,
            }
        }

        fn backend_error() -> StoreError {
            StoreError::Backend(Box::new(std::io::Error::other("disk unplugged")))
        }
    }

    impl Store for ScriptedStore {
        fn find_player_by_wallet(
            &self,
            wallet: &WalletAddress,
            include: Include,
        ) -> StoreResult<Option<PlayerRecord>> {
            match self.failure {
                Failure::Backend => Err(Self::backend_error()),
                Failure::NoWinner => Ok(None),
                Failure::VanishedRow => self.inner.find_player_by_wallet(wallet, include),
            }
        }

        fn find_player_by_id(
            &self,
            id: PlayerId,
            include: Include,
        ) -> StoreResult<Option<PlayerRecord>> {
            match self.failure {
                Failure::Backend => Err(Self::backend_error()),
                Failure::NoWinner | Failure::VanishedRow => self.inner.find_player_by_id(id, include),
            }
        }

        fn create_player(&self, new: NewPlayer) -> StoreResult<PlayerRecord> {
            match self.failure {
                Failure::Backend => Err(Self::backend_error()),
                Failure::NoWinner => Err(StoreError::Conflict(format!(
                    "wallet {} already registered",
                    new.wallet
                ))),
                Failure::VanishedRow => self.inner.create_player(new),
            }
        }

        fn update_player(
            &self,
            id: PlayerId,
            changes: &PlayerChanges,
        ) -> StoreResult<PlayerRecord> {
            match self.failure {
                Failure::Backend => Err(Self::backend_error()),
                Failure::NoWinner => self.inner.update_player(id, changes),
                Failure::VanishedRow => Err(StoreError::NotFound),
            }
        }

        fn list_players_by_level_desc(&self, limit: usize) -> StoreResult<Vec<PlayerRecord>> {
            match self.failure {
                Failure::Backend => Err(Self::backend_error()),
                Failure::NoWinner | Failure::VanishedRow => {
                    self.inner.list_players_by_level_desc(limit)
                }
            }
        }
    }

    #[test]
    fn backend_failure_is_store_unavailable_everywhere() {
        use crate::aggregator::GameStateAggregator;
        use crate::config::{GameStateViewConfig, LeaderboardConfig};
        use crate::leaderboard::LeaderboardService;
        use std::error::Error as _;

        let store = Arc::new(ScriptedStore::new(Failure::Backend));
        let counters = Arc::new(ServiceCounters::new());
        let dir = PlayerDirectory::new(Arc::clone(&store), Arc::clone(&counters));
        let agg = GameStateAggregator::new(
            Arc::clone(&store),
            Arc::clone(&counters),
            GameStateViewConfig::default(),
        );
        let board = LeaderboardService::new(store, counters, &LeaderboardConfig::default());

        let errors = [
            dir.connect("0xABC", None).expect_err("connect"),
            agg.get_game_state(PlayerId::new()).expect_err("game state"),
            board.get_leaderboard().expect_err("leaderboard"),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
            let cause = err.source().expect("store error attached");
            assert!(cause.to_string().contains("disk unplugged"), "got {cause}");
        }
    }

    #[test]
    fn lost_race_without_winner_is_conflict() {
        let store = Arc::new(ScriptedStore::new(Failure::NoWinner));
        let dir = PlayerDirectory::new(store, Arc::new(ServiceCounters::new()));

        let err = dir.connect("0xABC", Some("Rin")).expect_err("no winner");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("0xABC"));
        assert_eq!(dir.counters.snapshot().conflict_retries, 1);
        assert_eq!(dir.counters.snapshot().players_created, 0);
    }

    #[test]
    fn row_deleted_before_reactivation_names_the_player() {
        let store = Arc::new(ScriptedStore::new(Failure::VanishedRow));
        let id = store
            .inner
            .create_player(NewPlayer {
                wallet: WalletAddress::parse("0xABC").expect("wallet"),
                username: None,
            })
            .expect("create")
            .player
            .id;
        let dir = PlayerDirectory::new(store, Arc::new(ServiceCounters::new()));

        let err = dir.connect("0xABC", None).expect_err("vanished");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), format!("Player not found: {id}"));
    }
}
