//! Database models and domain types.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use serde::Serialize;
use tracing::instrument;

use crate::db::{DbError, schema};
use crate::rank::Tier;

/// Registered player database model.
///
/// The stored `rank` column is a cache of the tier derived from `points`;
/// [`Player::tier`] re-derives it so callers never trust a stale cache.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters, Serialize)]
#[diesel(table_name = schema::players)]
pub struct Player {
    id: i32,
    external_id: String,
    display_name: String,
    points: i32,
    rank: String,
    created_at: NaiveDateTime,
}

impl Player {
    /// Tier derived from the player's current points.
    pub fn tier(&self) -> Tier {
        Tier::for_points(self.points)
    }

    /// Parses the stored rank string into a [`Tier`] enum.
    #[instrument(skip(self), fields(rank = %self.rank))]
    pub fn parse_rank(&self) -> Result<Tier, DbError> {
        Tier::from_db_string(self.rank())
    }
}

/// Insertable player model for registering new players.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::players)]
pub struct NewPlayer {
    external_id: String,
    display_name: String,
    points: i32,
    rank: String,
}

impl NewPlayer {
    /// Builds a fresh registration at zero points in the base tier.
    pub fn registration(external_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        NewPlayer::new(
            external_id.into(),
            display_name.into(),
            0,
            Tier::BASE.to_db_string().to_string(),
        )
    }
}

/// Approved match ledger row.
///
/// Participant ids are plain external ids rather than foreign keys so the
/// row survives the deletion of either player. The gained and lost columns
/// freeze the formula output at approval time.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters, Serialize)]
#[diesel(table_name = schema::matches)]
pub struct MatchRecord {
    id: i32,
    winner_id: String,
    loser_id: String,
    winner_score: i32,
    loser_score: i32,
    winner_points_gained: i32,
    loser_points_lost: i32,
    recorded_at: NaiveDateTime,
}

impl MatchRecord {
    /// Returns true if the given external id took part in this match.
    pub fn involves(&self, external_id: &str) -> bool {
        self.winner_id == external_id || self.loser_id == external_id
    }
}

/// Insertable ledger row for recording an approved match.
#[derive(Debug, Clone, Insertable, new, Getters)]
#[diesel(table_name = schema::matches)]
pub struct NewMatchRecord {
    winner_id: String,
    loser_id: String,
    winner_score: i32,
    loser_score: i32,
    winner_points_gained: i32,
    loser_points_lost: i32,
}

/// Result of atomically applying one approved match: the appended ledger row
/// plus both player rows as they stand after the point updates.
#[derive(Debug, Clone, Getters, new, Serialize)]
pub struct AppliedMatch {
    record: MatchRecord,
    winner: Player,
    loser: Player,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_starts_at_base() {
        let new_player = NewPlayer::registration("7001", "Ken");
        assert_eq!(new_player.points, 0);
        assert_eq!(new_player.rank, "Bronze");
    }

    #[test]
    fn test_new_match_record_freezes_deltas() {
        let record = NewMatchRecord::new("7001".to_string(), "7002".to_string(), 5, 2, 9, 7);
        assert_eq!(*record.winner_points_gained(), 9);
        assert_eq!(*record.loser_points_lost(), 7);
    }
}
