//! SQLite-backed [`Store`].
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE players (
//!     id          TEXT PRIMARY KEY,
//!     wallet      TEXT NOT NULL UNIQUE,
//!     username    TEXT,
//!     level       INTEGER NOT NULL,
//!     experience  INTEGER NOT NULL,
//!     is_active   INTEGER NOT NULL,
//!     created_at  TEXT NOT NULL,
//!     updated_at  TEXT NOT NULL
//! );
//! CREATE TABLE game_stats        (player_id TEXT PRIMARY KEY, ...);
//! CREATE TABLE parties           (id TEXT PRIMARY KEY, name TEXT, created_at TEXT);
//! CREATE TABLE party_memberships (player_id, party_id, joined_at, is_current);
//! CREATE TABLE equipment         (id TEXT PRIMARY KEY, player_id, ...);
//! ```
//!
//! - UUIDs and RFC 3339 timestamps are stored as TEXT.
//! - Unsigned counters are stored as INTEGER and range-checked both ways.
//! - The `UNIQUE` wallet index is what makes concurrent connects safe.
//! - A single `parking_lot::Mutex` serialises access to the connection.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, params};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    Include, NewPlayer, PartyDetail, PlayerChanges, PlayerRecord, RelationWriter, Store,
    StoreResult,
};
use crate::config::PersistenceConfig;
use crate::error::StoreError;
use crate::model::{
    Equipment, GameStats, Membership, NewEquipment, Party, PartyMember, Player,
    player::STARTING_LEVEL,
};
use crate::types::{EquipmentId, PartyId, PlayerId, WalletAddress};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS players (
        id          TEXT PRIMARY KEY,
        wallet      TEXT NOT NULL UNIQUE,
        username    TEXT,
        level       INTEGER NOT NULL DEFAULT 1,
        experience  INTEGER NOT NULL DEFAULT 0,
        is_active   INTEGER NOT NULL DEFAULT 1,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS players_level_idx
        ON players (level DESC, experience DESC, id ASC);

    CREATE TABLE IF NOT EXISTS game_stats (
        player_id         TEXT PRIMARY KEY REFERENCES players(id) ON DELETE CASCADE,
        dungeons_cleared  INTEGER NOT NULL DEFAULT 0,
        total_loot        INTEGER NOT NULL DEFAULT 0,
        total_experience  INTEGER NOT NULL DEFAULT 0,
        highest_level     INTEGER NOT NULL DEFAULT 1,
        games_played      INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS parties (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS party_memberships (
        player_id   TEXT NOT NULL REFERENCES players(id) ON DELETE CASCADE,
        party_id    TEXT NOT NULL REFERENCES parties(id) ON DELETE CASCADE,
        joined_at   TEXT NOT NULL,
        is_current  INTEGER NOT NULL DEFAULT 0,
        UNIQUE (player_id, party_id)
    );
    CREATE INDEX IF NOT EXISTS party_memberships_party_idx
        ON party_memberships (party_id);

    CREATE TABLE IF NOT EXISTS equipment (
        id           TEXT PRIMARY KEY,
        player_id    TEXT NOT NULL REFERENCES players(id) ON DELETE CASCADE,
        name         TEXT NOT NULL,
        slot         TEXT NOT NULL,
        rarity       TEXT,
        power        INTEGER NOT NULL DEFAULT 0,
        acquired_at  TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS equipment_player_idx ON equipment (player_id);
";

const PLAYER_COLUMNS: &str =
    "id, wallet, username, level, experience, is_active, created_at, updated_at";

// ---------------------------------------------------------------------------
// Column codecs
// ---------------------------------------------------------------------------

fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn ts_from_sql(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

fn uuid_from_sql(raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("uuid {raw:?}: {e}")))
}

fn u64_to_sql(value: u64, field: &str) -> StoreResult<i64> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidValue(format!("{field} {value} exceeds {}", i64::MAX)))
}

fn u64_from_sql(value: i64, field: &str) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {field}: {value}")))
}

fn u32_from_sql(value: i64, field: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

/// Undecoded `players` row.
struct PlayerRow {
    id: String,
    wallet: String,
    username: Option<String>,
    level: i64,
    experience: i64,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl PlayerRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            wallet: row.get(1)?,
            username: row.get(2)?,
            level: row.get(3)?,
            experience: row.get(4)?,
            is_active: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn decode(self) -> StoreResult<Player> {
        Ok(Player {
            id: PlayerId(uuid_from_sql(&self.id)?),
            wallet: WalletAddress::parse(self.wallet)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            username: self.username,
            level: u32_from_sql(self.level, "level")?,
            experience: u64_from_sql(self.experience, "experience")?,
            is_active: self.is_active,
            created_at: ts_from_sql(&self.created_at)?,
            updated_at: ts_from_sql(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Relation loaders (run inside one transaction)
// ---------------------------------------------------------------------------

fn load_player_where(
    tx: &Transaction<'_>,
    column: &str,
    key: &str,
) -> StoreResult<Option<Player>> {
    let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE {column} = ?1");
    let row = tx
        .prepare_cached(&sql)?
        .query_row(params![key], PlayerRow::from_row)
        .optional()?;
    row.map(PlayerRow::decode).transpose()
}

fn load_stats(tx: &Transaction<'_>, player: PlayerId) -> StoreResult<Option<GameStats>> {
    let row: Option<(i64, i64, i64, i64, i64)> = tx
        .prepare_cached(
            "SELECT dungeons_cleared, total_loot, total_experience, highest_level, games_played
             FROM game_stats WHERE player_id = ?1",
        )?
        .query_row(params![player.to_string()], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })
        .optional()?;

    row.map(|(dungeons, loot, exp, highest, games)| {
        Ok(GameStats {
            dungeons_cleared: u64_from_sql(dungeons, "dungeons_cleared")?,
            total_loot: u64_from_sql(loot, "total_loot")?,
            total_experience: u64_from_sql(exp, "total_experience")?,
            highest_level: u32_from_sql(highest, "highest_level")?,
            games_played: u64_from_sql(games, "games_played")?,
        })
    })
    .transpose()
}

fn load_equipment(tx: &Transaction<'_>, player: PlayerId) -> StoreResult<Vec<Equipment>> {
    let mut stmt = tx.prepare_cached(
        "SELECT id, name, slot, rarity, power, acquired_at
         FROM equipment WHERE player_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![player.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (id, name, slot, rarity, power, acquired_at) = row?;
        items.push(Equipment {
            id: EquipmentId(uuid_from_sql(&id)?),
            player_id: player,
            name,
            slot,
            rarity,
            power: u64_from_sql(power, "power")?,
            acquired_at: ts_from_sql(&acquired_at)?,
        });
    }
    Ok(items)
}

fn load_members(tx: &Transaction<'_>, party: PartyId) -> StoreResult<Vec<PartyMember>> {
    let mut stmt = tx.prepare_cached(
        "SELECT m.player_id, p.username, m.joined_at
         FROM party_memberships m JOIN players p ON p.id = m.player_id
         WHERE m.party_id = ?1 ORDER BY m.rowid",
    )?;
    let rows = stmt.query_map(params![party.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut members = Vec::new();
    for row in rows {
        let (player_id, username, joined_at) = row?;
        members.push(PartyMember {
            player_id: PlayerId(uuid_from_sql(&player_id)?),
            username,
            joined_at: ts_from_sql(&joined_at)?,
        });
    }
    Ok(members)
}

fn load_memberships(
    tx: &Transaction<'_>,
    player: PlayerId,
    detail: PartyDetail,
) -> StoreResult<Vec<Membership>> {
    let mut stmt = tx.prepare_cached(
        "SELECT pt.id, pt.name, pt.created_at, m.joined_at, m.is_current
         FROM party_memberships m JOIN parties pt ON pt.id = m.party_id
         WHERE m.player_id = ?1 ORDER BY m.rowid",
    )?;
    let rows = stmt.query_map(params![player.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, bool>(4)?,
        ))
    })?;

    let mut raw = Vec::new();
    for row in rows {
        raw.push(row?);
    }
    drop(stmt);

    let mut memberships = Vec::with_capacity(raw.len());
    for (id, name, created_at, joined_at, is_current) in raw {
        let party_id = PartyId(uuid_from_sql(&id)?);
        let members = match detail {
            PartyDetail::WithMembers => Some(load_members(tx, party_id)?),
            PartyDetail::Summary | PartyDetail::None => None,
        };
        memberships.push(Membership {
            party: Party {
                id: party_id,
                name,
                created_at: ts_from_sql(&created_at)?,
                members,
            },
            joined_at: ts_from_sql(&joined_at)?,
            is_current,
        });
    }
    Ok(memberships)
}

fn load_relations(
    tx: &Transaction<'_>,
    player: Player,
    include: Include,
) -> StoreResult<PlayerRecord> {
    let id = player.id;
    let mut record = PlayerRecord::bare(player);
    if include.game_stats {
        record.game_stats = load_stats(tx, id)?;
    }
    if include.equipment {
        record.equipment = load_equipment(tx, id)?;
    }
    if include.parties != PartyDetail::None {
        record.memberships = load_memberships(tx, id, include.parties)?;
    }
    Ok(record)
}

fn player_exists(tx: &Transaction<'_>, player: PlayerId) -> StoreResult<bool> {
    Ok(tx
        .prepare_cached("SELECT 1 FROM players WHERE id = ?1")?
        .query_row(params![player.to_string()], |_| Ok(()))
        .optional()?
        .is_some())
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Handle to an open SQLite database holding players and their relations.
///
/// # Usage
///
/// ```no_run
/// # use gamestate_core::config::PersistenceConfig;
/// # use gamestate_core::store::{Include, NewPlayer, SqliteStore, Store};
/// # use gamestate_core::types::WalletAddress;
/// let store = SqliteStore::open("players.db", &PersistenceConfig::default())?;
/// let wallet = WalletAddress::parse("0xABC")?;
/// let created = store.create_player(NewPlayer { wallet: wallet.clone(), username: None })?;
/// let found = store.find_player_by_wallet(&wallet, Include::STATS)?;
/// assert_eq!(found.map(|r| r.player.id), Some(created.player.id));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database at `path`.
    ///
    /// The schema is created if missing. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        Self::prepare(&conn, config)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Game-state store opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(&conn, config)?;

        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Open the database described by `config.path`, or an in-memory one
    /// when no path is configured.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on SQLite failures.
    pub fn from_config(config: &PersistenceConfig) -> StoreResult<Self> {
        match &config.path {
            Some(path) => Self::open(path, config),
            None => Self::open_in_memory(config),
        }
    }

    fn prepare(conn: &Connection, config: &PersistenceConfig) -> StoreResult<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Run `f` inside one transaction on the locked connection.
    ///
    /// The transaction commits only if `f` succeeds.
    fn with_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Return the path to the database file (or `:memory:` for in-memory DBs).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of player rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on SQLite failures.
    pub fn player_count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| StoreError::Corrupt(format!("row count {count}")))
    }

    /// Drop a player's statistics row, leaving the player in place.
    ///
    /// Models legacy rows written before statistics existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on SQLite failures.
    pub fn remove_game_stats(&self, player: PlayerId) -> StoreResult<bool> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM game_stats WHERE player_id = ?1",
            params![player.to_string()],
        )?;
        Ok(deleted > 0)
    }

    /// Run an integrity check on the database.
    ///
    /// Returns `Ok(true)` if the database passes the check, `Ok(false)` if
    /// corruption is detected.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the integrity check query itself fails.
    pub fn integrity_check(&self) -> StoreResult<bool> {
        let result: String =
            self.conn
                .lock()
                .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Copy the database to `dest_path` using SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> StoreResult<()> {
        let start = Instant::now();
        let conn = self.conn.lock();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }
}

impl Store for SqliteStore {
    fn find_player_by_wallet(
        &self,
        wallet: &WalletAddress,
        include: Include,
    ) -> StoreResult<Option<PlayerRecord>> {
        let start = Instant::now();
        let record = self.with_tx(|tx| {
            load_player_where(tx, "wallet", wallet.as_str())?
                .map(|p| load_relations(tx, p, include))
                .transpose()
        })?;
        debug!(
            wallet = %wallet,
            found = record.is_some(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded player by wallet"
        );
        Ok(record)
    }

    fn find_player_by_id(
        &self,
        id: PlayerId,
        include: Include,
    ) -> StoreResult<Option<PlayerRecord>> {
        let start = Instant::now();
        let record = self.with_tx(|tx| {
            load_player_where(tx, "id", &id.to_string())?
                .map(|p| load_relations(tx, p, include))
                .transpose()
        })?;
        debug!(
            player = %id,
            found = record.is_some(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded player by id"
        );
        Ok(record)
    }

    fn create_player(&self, new: NewPlayer) -> StoreResult<PlayerRecord> {
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

        self.with_tx(|tx| {
            let id = player.id.to_string();
            tx.execute(
                "INSERT INTO players
                    (id, wallet, username, level, experience, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    player.wallet.as_str(),
                    player.username,
                    player.level,
                    0_i64,
                    player.is_active,
                    ts_to_sql(now),
                    ts_to_sql(now),
                ],
            )?;
            tx.execute(
                "INSERT INTO game_stats
                    (player_id, dungeons_cleared, total_loot, total_experience,
                     highest_level, games_played)
                 VALUES (?1, 0, 0, 0, ?2, 0)",
                params![id, stats.highest_level],
            )?;
            Ok(())
        })?;

        debug!(player = %player.id, wallet = %player.wallet, "Inserted player with default stats");
        let mut record = PlayerRecord::bare(player);
        record.game_stats = Some(stats);
        Ok(record)
    }

    fn update_player(&self, id: PlayerId, changes: &PlayerChanges) -> StoreResult<PlayerRecord> {
        let experience = changes
            .experience
            .map(|xp| u64_to_sql(xp, "experience"))
            .transpose()?;

        self.with_tx(|tx| {
            let key = id.to_string();
            let updated = tx.execute(
                "UPDATE players SET
                    username   = COALESCE(?2, username),
                    level      = COALESCE(?3, level),
                    experience = COALESCE(?4, experience),
                    is_active  = COALESCE(?5, is_active),
                    updated_at = ?6
                 WHERE id = ?1",
                params![
                    key,
                    changes.username,
                    changes.level,
                    experience,
                    changes.is_active,
                    ts_to_sql(Utc::now()),
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound);
            }
            let player = load_player_where(tx, "id", &key)?.ok_or(StoreError::NotFound)?;
            load_relations(tx, player, Include::STATS)
        })
    }

    fn list_players_by_level_desc(&self, limit: usize) -> StoreResult<Vec<PlayerRecord>> {
        let start = Instant::now();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = self.with_tx(|tx| {
            let sql = format!(
                "SELECT {PLAYER_COLUMNS} FROM players
                 ORDER BY level DESC, experience DESC, id ASC LIMIT ?1"
            );
            let mut stmt = tx.prepare_cached(&sql)?;
            let rows = stmt.query_map(params![limit], PlayerRow::from_row)?;
            let mut players = Vec::new();
            for row in rows {
                players.push(row?.decode()?);
            }
            drop(stmt);

            players
                .into_iter()
                .map(|p| load_relations(tx, p, Include::STATS))
                .collect::<StoreResult<Vec<_>>>()
        })?;
        debug!(
            rows = records.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded leaderboard rows"
        );
        Ok(records)
    }
}

impl RelationWriter for SqliteStore {
    fn create_party(&self, name: &str) -> StoreResult<Party> {
        let party = Party {
            id: PartyId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
            members: None,
        };
        self.conn.lock().execute(
            "INSERT INTO parties (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![party.id.to_string(), party.name, ts_to_sql(party.created_at)],
        )?;
        Ok(party)
    }

    fn join_party(
        &self,
        player: PlayerId,
        party: PartyId,
        make_current: bool,
    ) -> StoreResult<()> {
        self.with_tx(|tx| {
            let party_exists = tx
                .prepare_cached("SELECT 1 FROM parties WHERE id = ?1")?
                .query_row(params![party.to_string()], |_| Ok(()))
                .optional()?
                .is_some();
            if !party_exists || !player_exists(tx, player)? {
                return Err(StoreError::NotFound);
            }
            if make_current {
                tx.execute(
                    "UPDATE party_memberships SET is_current = 0 WHERE player_id = ?1",
                    params![player.to_string()],
                )?;
            }
            tx.execute(
                "INSERT INTO party_memberships (player_id, party_id, joined_at, is_current)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    player.to_string(),
                    party.to_string(),
                    ts_to_sql(Utc::now()),
                    make_current
                ],
            )?;
            Ok(())
        })
    }

    fn add_equipment(&self, player: PlayerId, item: NewEquipment) -> StoreResult<Equipment> {
        let equipment = Equipment {
            id: EquipmentId::new(),
            player_id: player,
            name: item.name,
            slot: item.slot,
            rarity: item.rarity,
            power: item.power,
            acquired_at: Utc::now(),
        };
        let power = u64_to_sql(equipment.power, "power")?;

        self.with_tx(|tx| {
            if !player_exists(tx, player)? {
                return Err(StoreError::NotFound);
            }
            tx.execute(
                "INSERT INTO equipment (id, player_id, name, slot, rarity, power, acquired_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    equipment.id.to_string(),
                    player.to_string(),
                    equipment.name,
                    equipment.slot,
                    equipment.rarity,
                    power,
                    ts_to_sql(equipment.acquired_at),
                ],
            )?;
            Ok(())
        })?;
        Ok(equipment)
    }

    fn record_game_stats(&self, player: PlayerId, stats: GameStats) -> StoreResult<()> {
        let dungeons = u64_to_sql(stats.dungeons_cleared, "dungeons_cleared")?;
        let loot = u64_to_sql(stats.total_loot, "total_loot")?;
        let exp = u64_to_sql(stats.total_experience, "total_experience")?;
        let games = u64_to_sql(stats.games_played, "games_played")?;

        self.with_tx(|tx| {
            if !player_exists(tx, player)? {
                return Err(StoreError::NotFound);
            }
            tx.execute(
                "INSERT INTO game_stats
                    (player_id, dungeons_cleared, total_loot, total_experience,
                     highest_level, games_played)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(player_id) DO UPDATE SET
                    dungeons_cleared = excluded.dungeons_cleared,
                    total_loot       = excluded.total_loot,
                    total_experience = excluded.total_experience,
                    highest_level    = excluded.highest_level,
                    games_played     = excluded.games_played",
                params![
                    player.to_string(),
                    dungeons,
                    loot,
                    exp,
                    stats.highest_level,
                    games
                ],
            )?;
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory(&PersistenceConfig::default()).expect("open")
    }

    fn new_player(wallet: &str, username: Option<&str>) -> NewPlayer {
        NewPlayer {
            wallet: WalletAddress::parse(wallet).expect("wallet"),
            username: username.map(str::to_string),
        }
    }

    #[test]
    fn create_then_find_round_trips() {
        let store = store();
        let created = store
            .create_player(new_player("0xABC", Some("Rin")))
            .expect("create");
        let found = store
            .find_player_by_wallet(&created.player.wallet, Include::STATS)
            .expect("find")
            .expect("some");

        assert_eq!(found.player, created.player);
        assert_eq!(found.game_stats, Some(GameStats::default()));
    }

    #[test]
    fn wallet_unique_constraint_is_conflict() {
        let store = store();
        store.create_player(new_player("0xABC", None)).expect("create");
        let err = store
            .create_player(new_player("0xABC", None))
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
        assert_eq!(store.player_count().expect("count"), 1);
    }

    #[test]
    fn wallet_lookup_is_case_sensitive() {
        let store = store();
        store.create_player(new_player("0xabc", None)).expect("create");
        let upper = WalletAddress::parse("0xABC").expect("wallet");
        assert!(store
            .find_player_by_wallet(&upper, Include::NONE)
            .expect("find")
            .is_none());
    }

    #[test]
    fn update_applies_only_given_columns() {
        let store = store();
        let created = store
            .create_player(new_player("0x1", Some("Rin")))
            .expect("create");
        let changes = PlayerChanges {
            level: Some(7),
            ..PlayerChanges::default()
        };
        let updated = store
            .update_player(created.player.id, &changes)
            .expect("update");

        assert_eq!(updated.player.level, 7);
        assert_eq!(updated.player.username.as_deref(), Some("Rin"));
        assert!(updated.player.is_active);
        assert!(updated.player.updated_at >= created.player.updated_at);
        assert_eq!(updated.game_stats, Some(GameStats::default()));
    }

    #[test]
    fn update_missing_is_not_found() {
        let store = store();
        let err = store
            .update_player(PlayerId::new(), &PlayerChanges::active(false))
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn oversized_experience_is_invalid_value() {
        let store = store();
        let created = store.create_player(new_player("0x1", None)).expect("create");
        let changes = PlayerChanges {
            experience: Some(u64::MAX),
            ..PlayerChanges::default()
        };
        let err = store
            .update_player(created.player.id, &changes)
            .expect_err("too wide");
        assert!(matches!(err, StoreError::InvalidValue(_)));
    }

    #[test]
    fn leaderboard_orders_and_limits() {
        let store = store();
        for (i, level) in [3_u32, 9, 1, 9, 5].into_iter().enumerate() {
            let p = store
                .create_player(new_player(&format!("0x{i}"), None))
                .expect("create")
                .player;
            let changes = PlayerChanges {
                level: Some(level),
                experience: Some(u64::from(level) * 10 + i as u64),
                ..PlayerChanges::default()
            };
            store.update_player(p.id, &changes).expect("update");
        }

        let board = store.list_players_by_level_desc(3).expect("list");
        let levels: Vec<u32> = board.iter().map(|r| r.player.level).collect();
        assert_eq!(levels, vec![9, 9, 5]);
        assert!(board[0].player.experience >= board[1].player.experience);
        assert!(board.iter().all(|r| r.game_stats.is_some()));
    }

    #[test]
    fn game_state_include_loads_everything() {
        let store = store();
        let rin = store.create_player(new_player("0x1", Some("Rin"))).expect("create").player;
        let kai = store.create_player(new_player("0x2", Some("Kai"))).expect("create").player;
        let party = store.create_party("Moonlit Blades").expect("party");
        store.join_party(rin.id, party.id, true).expect("join");
        store.join_party(kai.id, party.id, true).expect("join");
        store
            .add_equipment(rin.id, NewEquipment::new("Ash Staff", "weapon", 42).with_rarity("rare"))
            .expect("equip");

        let record = store
            .find_player_by_id(rin.id, Include::GAME_STATE)
            .expect("find")
            .expect("some");
        assert_eq!(record.equipment.len(), 1);
        assert_eq!(record.equipment[0].rarity.as_deref(), Some("rare"));
        assert_eq!(record.memberships.len(), 1);
        let members = record.memberships[0].party.members.as_ref().expect("members");
        let names: Vec<_> = members.iter().filter_map(|m| m.username.as_deref()).collect();
        assert_eq!(names, vec!["Rin", "Kai"]);

        let summary = store
            .find_player_by_id(rin.id, Include::PROFILE)
            .expect("find")
            .expect("some");
        assert!(summary.memberships[0].party.members.is_none());
    }

    #[test]
    fn duplicate_membership_conflicts() {
        let store = store();
        let p = store.create_player(new_player("0x1", None)).expect("create").player;
        let party = store.create_party("Solo").expect("party");
        store.join_party(p.id, party.id, false).expect("join");
        let err = store.join_party(p.id, party.id, false).expect_err("dup");
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn relation_writes_require_player() {
        let store = store();
        let err = store
            .add_equipment(PlayerId::new(), NewEquipment::new("Sword", "weapon", 1))
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound));
        let err = store
            .record_game_stats(PlayerId::new(), GameStats::default())
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn remove_and_record_stats() {
        let store = store();
        let p = store.create_player(new_player("0x1", None)).expect("create").player;
        assert!(store.remove_game_stats(p.id).expect("remove"));
        let record = store
            .find_player_by_id(p.id, Include::STATS)
            .expect("find")
            .expect("some");
        assert!(record.game_stats.is_none());

        let stats = GameStats {
            dungeons_cleared: 4,
            games_played: 9,
            ..GameStats::default()
        };
        store.record_game_stats(p.id, stats).expect("record");
        let record = store
            .find_player_by_id(p.id, Include::STATS)
            .expect("find")
            .expect("some");
        assert_eq!(record.game_stats, Some(stats));
    }

    #[test]
    fn corrupt_row_fails_leaderboard() {
        use crate::config::LeaderboardConfig;
        use crate::error::ErrorKind;
        use crate::leaderboard::LeaderboardService;
        use crate::metrics::ServiceCounters;
        use std::error::Error as _;
        use std::sync::Arc;

        let store = store();
        for wallet in ["0x1", "0x2", "0x3"] {
            store.create_player(new_player(wallet, None)).expect("create");
        }
        store
            .conn
            .lock()
            .execute("UPDATE players SET experience = -5 WHERE wallet = '0x1'", [])
            .expect("corrupt");

        let err = store
            .list_players_by_level_desc(50)
            .expect_err("corrupt row");
        assert!(matches!(err, StoreError::Corrupt(_)), "got {err:?}");

        let board = LeaderboardService::new(
            Arc::new(store),
            Arc::new(ServiceCounters::new()),
            &LeaderboardConfig::default(),
        );
        let err = board.get_leaderboard().expect_err("corrupt row");
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        let cause = err.source().expect("cause attached");
        assert!(cause.to_string().contains("negative experience"));
    }

    #[test]
    fn integrity_check_passes() {
        assert!(store().integrity_check().expect("check"));
    }

    #[test]
    fn file_based_open_and_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("players.db");
        let config = PersistenceConfig::default();

        let store = SqliteStore::open(&db_path, &config).expect("open");
        let created = store
            .create_player(new_player("0xABC", Some("Rin")))
            .expect("create");

        let backup_path = dir.path().join("players_backup.db");
        store.backup(&backup_path).expect("backup");

        let restored = SqliteStore::open(&backup_path, &config).expect("open backup");
        let found = restored
            .find_player_by_id(created.player.id, Include::STATS)
            .expect("find")
            .expect("some");
        assert_eq!(found.player.username.as_deref(), Some("Rin"));
    }
}
