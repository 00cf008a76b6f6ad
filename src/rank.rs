//! Rank tiers and the rank-difference point formula.
//!
//! Everything in this module is pure: tiers are derived from points on
//! demand, and point deltas are a function of the two participants' points at
//! the instant the formula runs. Callers that need fresh deltas (the approved
//! match apply path) re-read points and call [`compute_deltas`] inside their
//! own transaction instead of caching an earlier result.

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::DbError;

/// Score the winner of a match must report.
pub const WIN_SCORE: i32 = 5;

/// Points the winner gains when both players sit in the same tier.
const BASE_GAIN: i32 = 5;

/// Points the loser drops when both players sit in the same tier.
const BASE_LOSS: i32 = 3;

/// Rank tier derived from a player's points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// 0-24 points.
    Bronze,
    /// 25-49 points.
    Silver,
    /// 50-99 points.
    Gold,
    /// 100+ points.
    Platinum,
}

impl Tier {
    /// Tier every player starts in and returns to on a season reset.
    pub const BASE: Tier = Tier::Bronze;

    /// Derives the tier for a point total. Boundaries are inclusive-lower.
    pub fn for_points(points: i32) -> Self {
        if points >= 100 {
            Tier::Platinum
        } else if points >= 50 {
            Tier::Gold
        } else if points >= 25 {
            Tier::Silver
        } else {
            Tier::Bronze
        }
    }

    /// Ordinal used by the delta formula (Bronze lowest).
    pub fn ordinal(self) -> i32 {
        match self {
            Tier::Bronze => 1,
            Tier::Silver => 2,
            Tier::Gold => 3,
            Tier::Platinum => 4,
        }
    }

    /// Minimum points required to hold this tier.
    pub fn min_points(self) -> i32 {
        match self {
            Tier::Bronze => 0,
            Tier::Silver => 25,
            Tier::Gold => 50,
            Tier::Platinum => 100,
        }
    }

    /// The next tier up, or `None` at Platinum.
    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Bronze => Some(Tier::Silver),
            Tier::Silver => Some(Tier::Gold),
            Tier::Gold => Some(Tier::Platinum),
            Tier::Platinum => None,
        }
    }

    /// Converts the tier to the string stored in the database.
    pub fn to_db_string(self) -> &'static str {
        match self {
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
        }
    }

    /// Parses a tier from the string stored in the database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the string is not a valid tier name.
    pub fn from_db_string(s: &str) -> Result<Self, DbError> {
        match s {
            "Bronze" => Ok(Tier::Bronze),
            "Silver" => Ok(Tier::Silver),
            "Gold" => Ok(Tier::Gold),
            "Platinum" => Ok(Tier::Platinum),
            _ => Err(DbError::new(format!("Invalid tier: '{}'", s))),
        }
    }
}

/// Point deltas for one approved match: what the winner gains and what the
/// loser drops before the zero floor is applied to the loser's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, new, Serialize, Deserialize)]
pub struct PointDeltas {
    gain: i32,
    loss: i32,
}

/// Computes the point deltas for a match given both players' current points.
///
/// Equal tiers pay the base (5, 3). A higher-tier winner gains less the wider
/// the gap, floored at 1. A lower-tier winner (upset) amplifies both sides by
/// twice the gap, so a high-tier player pays for losing to an underdog.
#[instrument]
pub fn compute_deltas(winner_points: i32, loser_points: i32) -> PointDeltas {
    let winner_tier = Tier::for_points(winner_points);
    let loser_tier = Tier::for_points(loser_points);
    let diff = (winner_tier.ordinal() - loser_tier.ordinal()).abs();

    if winner_tier == loser_tier {
        PointDeltas::new(BASE_GAIN, BASE_LOSS)
    } else if winner_tier.ordinal() > loser_tier.ordinal() {
        PointDeltas::new((BASE_GAIN - diff).max(1), BASE_LOSS)
    } else {
        PointDeltas::new(BASE_GAIN + diff * 2, BASE_LOSS + diff * 2)
    }
}
