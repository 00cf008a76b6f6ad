//! Database repository for player standings and the approved-match ledger.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::MigrationHarness;
use tracing::{debug, info, instrument, warn};

use crate::db::{
    AppliedMatch, DbError, MIGRATIONS, MatchRecord, NewMatchRecord, NewPlayer, Player, schema,
};
use crate::rank::{self, Tier};

/// Database repository for player and match ledger operations.
#[derive(Debug, Clone)]
pub struct LeagueRepository {
    db_path: String,
}

impl LeagueRepository {
    /// Creates a new repository connected to the database at the given path.
    ///
    /// Use `":memory:"` for an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is invalid.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        info!(path = %db_path, "Creating LeagueRepository");
        Ok(Self { db_path })
    }

    /// Establishes a database connection.
    ///
    /// Sets a busy timeout so writers queued behind the apply transaction
    /// wait for the lock instead of failing immediately.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))?;
        conn.batch_execute("PRAGMA busy_timeout = 10000;")?;
        Ok(conn)
    }

    /// Runs any pending embedded migrations, creating the schema on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        debug!(path = %self.db_path, "Running pending migrations");
        let mut conn = self.connection()?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migration failed: {}", e)))?;

        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Registers a new player at zero points in the base tier.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the external id is already registered or a
    /// database error occurs.
    #[instrument(skip(self))]
    pub fn register_player(
        &self,
        external_id: &str,
        display_name: &str,
    ) -> Result<Player, DbError> {
        debug!(external_id = %external_id, display_name = %display_name, "Registering player");
        let mut conn = self.connection()?;

        let new_player = NewPlayer::registration(external_id, display_name);

        let player = diesel::insert_into(schema::players::table)
            .values(&new_player)
            .returning(Player::as_returning())
            .get_result(&mut conn)?;

        info!(
            player_id = player.id(),
            external_id = %player.external_id(),
            display_name = %player.display_name(),
            "Player registered"
        );
        Ok(player)
    }

    /// Gets a player by external id. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn find_player(&self, external_id: &str) -> Result<Option<Player>, DbError> {
        debug!(external_id = %external_id, "Looking up player");
        let mut conn = self.connection()?;

        let player = schema::players::table
            .filter(schema::players::external_id.eq(external_id))
            .first::<Player>(&mut conn)
            .optional()?;

        if let Some(ref p) = player {
            debug!(player_id = p.id(), "Player found");
        } else {
            debug!("Player not found");
        }

        Ok(player)
    }

    /// Updates a player's display name. Returns `None` if not registered.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn rename_player(
        &self,
        external_id: &str,
        display_name: &str,
    ) -> Result<Option<Player>, DbError> {
        debug!(external_id = %external_id, display_name = %display_name, "Renaming player");
        let mut conn = self.connection()?;

        let player = diesel::update(
            schema::players::table.filter(schema::players::external_id.eq(external_id)),
        )
        .set(schema::players::display_name.eq(display_name))
        .returning(Player::as_returning())
        .get_result(&mut conn)
        .optional()?;

        if let Some(ref p) = player {
            info!(player_id = p.id(), display_name = %p.display_name(), "Player renamed");
        } else {
            debug!("Player not found");
        }

        Ok(player)
    }

    /// Deletes a player's registration row. The match ledger keeps every row
    /// that references the id. Returns `false` if no row existed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn unregister_player(&self, external_id: &str) -> Result<bool, DbError> {
        debug!(external_id = %external_id, "Unregistering player");
        let mut conn = self.connection()?;

        let deleted = diesel::delete(
            schema::players::table.filter(schema::players::external_id.eq(external_id)),
        )
        .execute(&mut conn)?;

        if deleted > 0 {
            info!(external_id = %external_id, "Player unregistered");
        } else {
            debug!("Player not found");
        }

        Ok(deleted > 0)
    }

    /// Lists all players ordered by points descending. Players on equal
    /// points keep registration order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn leaderboard(&self) -> Result<Vec<Player>, DbError> {
        debug!("Loading leaderboard");
        let mut conn = self.connection()?;

        let players = schema::players::table
            .order((schema::players::points.desc(), schema::players::id.asc()))
            .load::<Player>(&mut conn)?;

        info!(count = players.len(), "Leaderboard loaded");
        Ok(players)
    }

    /// Adjusts a player's points by a signed delta, flooring at zero, and
    /// rewrites the cached rank from the new total in the same statement.
    /// Returns `None` if not registered.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn apply_points_delta(
        &self,
        external_id: &str,
        delta: i32,
    ) -> Result<Option<Player>, DbError> {
        debug!(external_id = %external_id, delta = delta, "Adjusting points");
        let mut conn = self.connection()?;

        conn.immediate_transaction::<_, DbError, _>(|conn| {
            let Some(player) = schema::players::table
                .filter(schema::players::external_id.eq(external_id))
                .first::<Player>(conn)
                .optional()?
            else {
                debug!("Player not found");
                return Ok(None);
            };

            let updated = Self::write_points(conn, *player.id(), player.points() + delta)?;
            info!(
                player_id = updated.id(),
                points = updated.points(),
                rank = %updated.rank(),
                "Points adjusted"
            );
            Ok(Some(updated))
        })
    }

    /// Zeroes every player's points and resets the cached rank to the base
    /// tier. Registration rows are kept. Returns the number of rows touched.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn reset_players(&self) -> Result<usize, DbError> {
        debug!("Resetting all players");
        let mut conn = self.connection()?;

        let reset = Self::zero_players(&mut conn)?;

        info!(count = reset, "Players reset");
        Ok(reset)
    }

    /// Appends a row to the match ledger.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, record), fields(winner_id = %record.winner_id(), loser_id = %record.loser_id()))]
    pub fn insert_match(&self, record: NewMatchRecord) -> Result<MatchRecord, DbError> {
        debug!("Appending match record");
        let mut conn = self.connection()?;

        let inserted = diesel::insert_into(schema::matches::table)
            .values(&record)
            .returning(MatchRecord::as_returning())
            .get_result(&mut conn)?;

        info!(
            match_id = inserted.id(),
            winner_id = %inserted.winner_id(),
            loser_id = %inserted.loser_id(),
            "Match recorded"
        );
        Ok(inserted)
    }

    /// Lists the full match ledger, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_matches(&self) -> Result<Vec<MatchRecord>, DbError> {
        debug!("Listing all matches");
        let mut conn = self.connection()?;

        let matches = schema::matches::table
            .order((
                schema::matches::recorded_at.desc(),
                schema::matches::id.desc(),
            ))
            .load::<MatchRecord>(&mut conn)?;

        info!(count = matches.len(), "Matches loaded");
        Ok(matches)
    }

    /// Lists all matches a player took part in, as winner or loser, most
    /// recent first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_matches_for(&self, external_id: &str) -> Result<Vec<MatchRecord>, DbError> {
        debug!(external_id = %external_id, "Listing matches for player");
        let mut conn = self.connection()?;

        let matches = schema::matches::table
            .filter(
                schema::matches::winner_id
                    .eq(external_id)
                    .or(schema::matches::loser_id.eq(external_id)),
            )
            .order((
                schema::matches::recorded_at.desc(),
                schema::matches::id.desc(),
            ))
            .load::<MatchRecord>(&mut conn)?;

        info!(external_id = %external_id, count = matches.len(), "Player matches loaded");
        Ok(matches)
    }

    /// Deletes every ledger row and restarts the id sequence, so the next
    /// recorded match gets id 1. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn clear_matches(&self) -> Result<usize, DbError> {
        debug!("Clearing match ledger");
        let mut conn = self.connection()?;

        let cleared = conn.immediate_transaction::<_, DbError, _>(Self::wipe_ledger)?;

        info!(count = cleared, "Match ledger cleared");
        Ok(cleared)
    }

    /// Atomically applies one approved match.
    ///
    /// Reads both players' rows fresh, computes the point deltas from those
    /// points, floors the loser at zero, rewrites both cached ranks, and
    /// appends the ledger row, all inside one write-locking transaction.
    /// Returns `None` without touching anything if either participant is no
    /// longer registered.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs. The transaction is
    /// rolled back before the error surfaces.
    #[instrument(skip(self))]
    pub fn record_approved_match(
        &self,
        winner_external_id: &str,
        loser_external_id: &str,
        winner_score: i32,
        loser_score: i32,
    ) -> Result<Option<AppliedMatch>, DbError> {
        debug!(
            winner_id = %winner_external_id,
            loser_id = %loser_external_id,
            "Applying approved match"
        );
        let mut conn = self.connection()?;

        let applied = conn.immediate_transaction::<_, DbError, _>(|conn| {
            let Some(winner) = schema::players::table
                .filter(schema::players::external_id.eq(winner_external_id))
                .first::<Player>(conn)
                .optional()?
            else {
                warn!(external_id = %winner_external_id, "Winner no longer registered");
                return Ok(None);
            };
            let Some(loser) = schema::players::table
                .filter(schema::players::external_id.eq(loser_external_id))
                .first::<Player>(conn)
                .optional()?
            else {
                warn!(external_id = %loser_external_id, "Loser no longer registered");
                return Ok(None);
            };

            let deltas = rank::compute_deltas(*winner.points(), *loser.points());

            let updated_winner =
                Self::write_points(conn, *winner.id(), winner.points() + deltas.gain())?;
            let updated_loser =
                Self::write_points(conn, *loser.id(), loser.points() - deltas.loss())?;

            // The ledger keeps the formula loss even when the zero floor
            // absorbed part of it.
            let record = NewMatchRecord::new(
                winner_external_id.to_string(),
                loser_external_id.to_string(),
                winner_score,
                loser_score,
                *deltas.gain(),
                *deltas.loss(),
            );
            let inserted = diesel::insert_into(schema::matches::table)
                .values(&record)
                .returning(MatchRecord::as_returning())
                .get_result(conn)?;

            Ok(Some(AppliedMatch::new(inserted, updated_winner, updated_loser)))
        })?;

        if let Some(ref outcome) = applied {
            info!(
                match_id = outcome.record().id(),
                winner_points = outcome.winner().points(),
                loser_points = outcome.loser().points(),
                "Approved match applied"
            );
        }

        Ok(applied)
    }

    /// Wipes the ledger and zeroes every player in one transaction. Returns
    /// the number of players reset and the number of matches removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn reset_season(&self) -> Result<(usize, usize), DbError> {
        debug!("Resetting season");
        let mut conn = self.connection()?;

        let (players_reset, matches_cleared) =
            conn.immediate_transaction::<_, DbError, _>(|conn| {
                let matches_cleared = Self::wipe_ledger(conn)?;
                let players_reset = Self::zero_players(conn)?;
                Ok((players_reset, matches_cleared))
            })?;

        info!(
            players_reset = players_reset,
            matches_cleared = matches_cleared,
            "Season reset"
        );
        Ok((players_reset, matches_cleared))
    }

    /// Writes a player's points floored at zero and the rank derived from
    /// the floored total, in one statement.
    fn write_points(
        conn: &mut SqliteConnection,
        player_id: i32,
        points: i32,
    ) -> Result<Player, DbError> {
        let points = points.max(0);
        let tier = Tier::for_points(points);

        let player = diesel::update(schema::players::table.filter(schema::players::id.eq(player_id)))
            .set((
                schema::players::points.eq(points),
                schema::players::rank.eq(tier.to_db_string()),
            ))
            .returning(Player::as_returning())
            .get_result(conn)?;

        Ok(player)
    }

    /// Deletes every ledger row and restarts the AUTOINCREMENT sequence.
    fn wipe_ledger(conn: &mut SqliteConnection) -> Result<usize, DbError> {
        let cleared = diesel::delete(schema::matches::table).execute(conn)?;
        diesel::sql_query("DELETE FROM sqlite_sequence WHERE name = 'matches'").execute(conn)?;
        Ok(cleared)
    }

    /// Zeroes points and resets the cached rank for every player.
    fn zero_players(conn: &mut SqliteConnection) -> Result<usize, DbError> {
        let reset = diesel::update(schema::players::table)
            .set((
                schema::players::points.eq(0),
                schema::players::rank.eq(Tier::BASE.to_db_string()),
            ))
            .execute(conn)?;
        Ok(reset)
    }
}
