//! Service counters and tracing span names.
//!
//! Counters are plain `AtomicU64`s bumped on the request path and read on
//! export, so the services stay free of locks.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters for player lifecycle and read traffic.
#[derive(Debug)]
pub struct ServiceCounters {
    /// Players created by `connect`.
    pub players_created: AtomicU64,
    /// Existing players reactivated by `connect`.
    pub players_reactivated: AtomicU64,
    /// Successful `leave` calls.
    pub players_left: AtomicU64,
    /// `connect` calls that lost the creation race and fell back to
    /// reactivation.
    pub conflict_retries: AtomicU64,
    /// Game-state views served.
    pub game_state_reads: AtomicU64,
    /// Leaderboards served.
    pub leaderboard_reads: AtomicU64,
}

impl ServiceCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            players_created: AtomicU64::new(0),
            players_reactivated: AtomicU64::new(0),
            players_left: AtomicU64::new(0),
            conflict_retries: AtomicU64::new(0),
            game_state_reads: AtomicU64::new(0),
            leaderboard_reads: AtomicU64::new(0),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            players_created: self.players_created.load(Ordering::Relaxed),
            players_reactivated: self.players_reactivated.load(Ordering::Relaxed),
            players_left: self.players_left.load(Ordering::Relaxed),
            conflict_retries: self.conflict_retries.load(Ordering::Relaxed),
            game_state_reads: self.game_state_reads.load(Ordering::Relaxed),
            leaderboard_reads: self.leaderboard_reads.load(Ordering::Relaxed),
        }
    }
}

impl Default for ServiceCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    /// Players created.
    pub players_created: u64,
    /// Players reactivated.
    pub players_reactivated: u64,
    /// Players that left.
    pub players_left: u64,
    /// Creation races resolved by reactivation.
    pub conflict_retries: u64,
    /// Game-state views served.
    pub game_state_reads: u64,
    /// Leaderboards served.
    pub leaderboard_reads: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP gamestate_players_created_total Players created on first connect\n\
             # TYPE gamestate_players_created_total counter\n\
             gamestate_players_created_total {}\n\
             # HELP gamestate_players_reactivated_total Players reactivated on connect\n\
             # TYPE gamestate_players_reactivated_total counter\n\
             gamestate_players_reactivated_total {}\n\
             # HELP gamestate_players_left_total Leave calls completed\n\
             # TYPE gamestate_players_left_total counter\n\
             gamestate_players_left_total {}\n\
             # HELP gamestate_conflict_retries_total Connect races resolved by reactivation\n\
             # TYPE gamestate_conflict_retries_total counter\n\
             gamestate_conflict_retries_total {}\n\
             # HELP gamestate_game_state_reads_total Game-state views served\n\
             # TYPE gamestate_game_state_reads_total counter\n\
             gamestate_game_state_reads_total {}\n\
             # HELP gamestate_leaderboard_reads_total Leaderboards served\n\
             # TYPE gamestate_leaderboard_reads_total counter\n\
             gamestate_leaderboard_reads_total {}\n",
            self.players_created,
            self.players_reactivated,
            self.players_left,
            self.conflict_retries,
            self.game_state_reads,
            self.leaderboard_reads,
        )
    }
}

/// Span names used with `tracing::info_span!`.
pub mod spans {
    /// Player connect.
    pub const CONNECT: &str = "gamestate::directory::connect";
    /// Player leave.
    pub const LEAVE: &str = "gamestate::directory::leave";
    /// Player update.
    pub const UPDATE: &str = "gamestate::directory::update";
    /// Game-state aggregation.
    pub const GAME_STATE: &str = "gamestate::aggregate";
    /// Leaderboard read.
    pub const LEADERBOARD: &str = "gamestate::leaderboard";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_default_zero() {
        let snap = ServiceCounters::new().snapshot();
        assert_eq!(snap.players_created, 0);
        assert_eq!(snap.leaderboard_reads, 0);
    }

    #[test]
    fn bump_and_snapshot() {
        let c = ServiceCounters::new();
        ServiceCounters::bump(&c.players_created);
        ServiceCounters::bump(&c.players_created);
        ServiceCounters::bump(&c.conflict_retries);
        let snap = c.snapshot();
        assert_eq!(snap.players_created, 2);
        assert_eq!(snap.conflict_retries, 1);
        assert_eq!(snap.players_left, 0);
    }

    #[test]
    fn prometheus_format_valid() {
        let c = ServiceCounters::new();
        ServiceCounters::bump(&c.game_state_reads);
        let text = c.snapshot().to_prometheus();
        assert!(text.contains("gamestate_game_state_reads_total 1"));
        assert!(text.contains("# TYPE gamestate_players_left_total counter"));
    }
}
