//! # Game-State Core
//!
//! Player lifecycle and game-state aggregation for a multiplayer game
//! backend. The crate is invoked programmatically by a request-handling
//! layer; it owns no transport.
//!
//! - [`PlayerDirectory`]: connect (create-or-reactivate), leave, lookup,
//!   structured updates.
//! - [`GameStateAggregator`]: one consistent [`GameState`] per player:
//!   identity, current party, equipment, statistics.
//! - [`LeaderboardService`]: top players by level, at most 50.
//! - [`store`]: the persistence boundary, with SQLite and in-memory
//!   backends.
//! - [`wire`]: JSON output that never rounds wide integers.
//!
//! ```
//! use gamestate_core::{GameService, GameStateConfig};
//!
//! let service = GameService::open(&GameStateConfig::default())?;
//! let rin = service.directory().connect("0xABC", Some("Rin"))?;
//! let state = service.aggregator().get_game_state(rin.player.id)?;
//! assert_eq!(state.stats.highest_level, 1);
//! # Ok::<(), gamestate_core::GameStateError>(())
//! ```

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregator;
pub mod config;
pub mod directory;
pub mod error;
pub mod leaderboard;
pub mod metrics;
pub mod model;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod wire;

pub use aggregator::{GameState, GameStateAggregator, PlayerView};
pub use config::GameStateConfig;
pub use directory::PlayerDirectory;
pub use error::{ErrorKind, GameStateError, StoreError};
pub use leaderboard::LeaderboardService;
pub use service::GameService;
pub use types::*;
