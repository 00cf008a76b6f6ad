//! Match submission, approval, and standings business logic layer.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::approval::{
    ApprovalCoordinator, ApprovalHandle, ApprovalId, ApprovalOutcome, Decision, PendingApproval,
    ResolveError,
};
use crate::config::{EngineConfig, ResponderPolicy};
use crate::cooldown::CooldownTracker;
use crate::db::{AppliedMatch, DbError, LeagueRepository, MatchRecord, Player};
use crate::rank::{Tier, WIN_SCORE};

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// A reported match result, as received from the gateway.
#[derive(Debug, Clone, Getters, new, Serialize, Deserialize)]
pub struct MatchSubmission {
    /// Who reported the result. Usually one of the participants.
    submitter_id: String,
    /// External id of the reported winner.
    winner_id: String,
    /// External id of the reported loser.
    loser_id: String,
    /// Score reported for the winner. Must be exactly the winning score.
    winner_score: i32,
    /// Score reported for the loser. Must be below the winning score.
    loser_score: i32,
}

/// Error raised by submission, registration, and query operations.
///
/// Every variant except `Db` is rejected before any state changes; `Db`
/// surfaces only after the repository rolled back.
#[derive(Debug, Clone, Display, Error)]
pub enum MatchError {
    /// Winner and loser are the same player.
    #[display("A match needs two different players")]
    SelfMatch,
    /// A reported score breaks the scoring rules.
    #[display("Invalid score: {}", reason)]
    InvalidScore {
        /// Which rule the scores broke.
        #[error(not(source))]
        reason: &'static str,
    },
    /// Winner and loser reported the same score.
    #[display("A match cannot end in a tie")]
    TiedScore,
    /// Display name is empty or too long.
    #[display("Display name must be 1 to {} characters", MAX_NAME_LEN)]
    InvalidName,
    /// The external id already has a registration.
    #[display("Player is already registered")]
    AlreadyRegistered,
    /// The external id has no registration.
    #[display("Player is not registered")]
    NotRegistered,
    /// The submitter is inside their quiet window.
    #[display("Cooldown active: wait {:.2} more seconds", remaining.as_secs_f64())]
    Cooldown {
        /// Time left before the submitter may try again.
        #[error(not(source))]
        remaining: Duration,
    },
    /// Persistence failure, surfaced after rollback.
    #[display("{}", _0)]
    Db(DbError),
}

impl From<DbError> for MatchError {
    fn from(error: DbError) -> Self {
        MatchError::Db(error)
    }
}

/// Terminal result of a submission that passed validation.
///
/// `Cancelled` and `Expired` are ordinary outcomes, not errors: the
/// submission flow finished, nothing was recorded.
#[derive(Debug, Clone, Serialize)]
pub enum SubmitOutcome {
    /// The responder approved; points, ranks, and the ledger are updated.
    Recorded(AppliedMatch),
    /// The responder rejected the result. Nothing was recorded.
    Cancelled,
    /// The approval window elapsed. Nothing was recorded.
    Expired,
}

/// A player's standing and ledger-derived record.
#[derive(Debug, Clone, Getters, new, Serialize)]
pub struct PlayerStats {
    external_id: String,
    display_name: String,
    points: i32,
    tier: Tier,
    wins: i32,
    losses: i32,
    total_matches: i32,
    /// Points still needed for the next tier, `None` at the top.
    points_to_next_tier: Option<i32>,
}

impl PlayerStats {
    /// Calculates win rate as a percentage (0.0-100.0).
    #[instrument(skip(self))]
    pub fn win_rate(&self) -> f64 {
        if self.total_matches == 0 {
            0.0
        } else {
            (self.wins as f64 / self.total_matches as f64) * 100.0
        }
    }
}

/// An open submission: validation passed, the approval session is live, and
/// the submitter's cooldown is stamped.
///
/// The gateway announces [`SubmissionTicket::pending`] to the responder and
/// then passes the ticket to [`MatchService::await_outcome`].
#[derive(Debug)]
pub struct SubmissionTicket {
    pending: PendingApproval,
    handle: ApprovalHandle,
}

impl SubmissionTicket {
    /// Snapshot of the opened approval session.
    pub fn pending(&self) -> &PendingApproval {
        &self.pending
    }
}

/// Service layer for the submission, approval, and standings operations.
///
/// Wraps [`LeagueRepository`] with the validation rules, the approval
/// rendezvous, and the per-submitter cooldown. Cloning is cheap; clones
/// share the same open sessions and cooldown stamps.
#[derive(Debug, Clone)]
pub struct MatchService {
    repository: LeagueRepository,
    coordinator: ApprovalCoordinator,
    cooldowns: CooldownTracker,
    config: EngineConfig,
}

impl MatchService {
    /// Creates a new match service backed by the given repository.
    #[instrument(skip(repository, config))]
    pub fn new(repository: LeagueRepository, config: EngineConfig) -> Self {
        info!(
            approval_timeout_secs = config.approval_timeout_secs(),
            submit_cooldown_secs = config.submit_cooldown_secs(),
            "Creating MatchService"
        );
        let cooldowns = CooldownTracker::new(config.submit_cooldown());
        Self {
            repository,
            coordinator: ApprovalCoordinator::new(),
            cooldowns,
            config,
        }
    }

    /// Returns the underlying repository.
    pub fn repository(&self) -> &LeagueRepository {
        &self.repository
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers a new player.
    ///
    /// # Errors
    ///
    /// [`MatchError::InvalidName`] for an empty or over-long name,
    /// [`MatchError::AlreadyRegistered`] when the external id has a row.
    #[instrument(skip(self))]
    pub fn register(&self, external_id: &str, display_name: &str) -> Result<Player, MatchError> {
        debug!(external_id, display_name, "Registering player");
        Self::validate_name(display_name)?;

        if self.repository.find_player(external_id)?.is_some() {
            debug!(external_id, "Already registered");
            return Err(MatchError::AlreadyRegistered);
        }

        Ok(self.repository.register_player(external_id, display_name)?)
    }

    /// Changes a player's display name. Past ledger rows are untouched.
    ///
    /// # Errors
    ///
    /// [`MatchError::InvalidName`] or [`MatchError::NotRegistered`].
    #[instrument(skip(self))]
    pub fn rename(&self, external_id: &str, display_name: &str) -> Result<Player, MatchError> {
        debug!(external_id, display_name, "Renaming player");
        Self::validate_name(display_name)?;

        self.repository
            .rename_player(external_id, display_name)?
            .ok_or(MatchError::NotRegistered)
    }

    /// Removes a player's registration. Their match history remains.
    ///
    /// # Errors
    ///
    /// [`MatchError::NotRegistered`] when there is nothing to remove.
    #[instrument(skip(self))]
    pub fn unregister(&self, external_id: &str) -> Result<(), MatchError> {
        debug!(external_id, "Unregistering player");
        if self.repository.unregister_player(external_id)? {
            Ok(())
        } else {
            Err(MatchError::NotRegistered)
        }
    }

    /// Validates a submission and opens its approval session.
    ///
    /// On success the submitter's cooldown is stamped and the returned
    /// ticket's session awaits the expected responder. A rejected
    /// submission stamps nothing and opens nothing.
    ///
    /// # Errors
    ///
    /// Checks run in a fixed order, first failure wins: [`MatchError::SelfMatch`],
    /// [`MatchError::InvalidScore`] (winner, then loser), [`MatchError::TiedScore`],
    /// [`MatchError::Cooldown`], [`MatchError::NotRegistered`].
    #[instrument(skip(self, submission), fields(submitter_id = %submission.submitter_id()))]
    pub fn open_submission(
        &self,
        submission: MatchSubmission,
    ) -> Result<SubmissionTicket, MatchError> {
        debug!(
            winner_id = %submission.winner_id(),
            loser_id = %submission.loser_id(),
            "Validating submission"
        );
        Self::validate_rules(&submission)?;

        if let Some(remaining) = self.cooldowns.remaining(submission.submitter_id()) {
            debug!(remaining_secs = remaining.as_secs_f64(), "Submitter on cooldown");
            return Err(MatchError::Cooldown { remaining });
        }

        if self.repository.find_player(submission.winner_id())?.is_none() {
            debug!(external_id = %submission.winner_id(), "Winner not registered");
            return Err(MatchError::NotRegistered);
        }
        if self.repository.find_player(submission.loser_id())?.is_none() {
            debug!(external_id = %submission.loser_id(), "Loser not registered");
            return Err(MatchError::NotRegistered);
        }

        let responder_id = self.expected_responder(&submission);
        let (pending, handle) = self.coordinator.open(
            submission.submitter_id(),
            submission.winner_id(),
            submission.loser_id(),
            *submission.winner_score(),
            *submission.loser_score(),
            responder_id,
        );
        self.cooldowns.record(submission.submitter_id());

        info!(
            approval_id = pending.approval_id(),
            responder_id = %pending.responder_id(),
            "Submission opened"
        );
        Ok(SubmissionTicket { pending, handle })
    }

    /// Waits out a ticket's approval session and applies the result.
    ///
    /// Approval triggers the atomic apply: both players re-read, deltas
    /// computed from those fresh points, both rows and the ledger written in
    /// one transaction. Cancellation and expiry finish without recording.
    ///
    /// # Errors
    ///
    /// [`MatchError::NotRegistered`] when a participant unregistered while
    /// the session was open (nothing is applied), or [`MatchError::Db`].
    #[instrument(skip(self, ticket), fields(approval_id = ticket.pending.approval_id()))]
    pub async fn await_outcome(&self, ticket: SubmissionTicket) -> Result<SubmitOutcome, MatchError> {
        let SubmissionTicket { pending, handle } = ticket;

        let outcome = self
            .coordinator
            .await_resolution(handle, self.config.approval_timeout())
            .await;

        match outcome {
            ApprovalOutcome::Approved => {
                let applied = self.repository.record_approved_match(
                    pending.winner_id(),
                    pending.loser_id(),
                    *pending.winner_score(),
                    *pending.loser_score(),
                )?;
                match applied {
                    Some(applied) => {
                        info!(
                            match_id = applied.record().id(),
                            winner_points = applied.winner().points(),
                            loser_points = applied.loser().points(),
                            "Match recorded"
                        );
                        Ok(SubmitOutcome::Recorded(applied))
                    }
                    None => {
                        warn!("Participant unregistered during approval window");
                        Err(MatchError::NotRegistered)
                    }
                }
            }
            ApprovalOutcome::Cancelled => {
                info!("Submission cancelled by responder");
                Ok(SubmitOutcome::Cancelled)
            }
            ApprovalOutcome::Expired => {
                info!("Submission expired unanswered");
                Ok(SubmitOutcome::Expired)
            }
        }
    }

    /// Runs a submission end to end: validate, open, await, apply.
    ///
    /// # Errors
    ///
    /// As [`Self::open_submission`] and [`Self::await_outcome`].
    #[instrument(skip(self, submission), fields(submitter_id = %submission.submitter_id()))]
    pub async fn submit(&self, submission: MatchSubmission) -> Result<SubmitOutcome, MatchError> {
        let ticket = self.open_submission(submission)?;
        self.await_outcome(ticket).await
    }

    /// Delivers a responder's decision for an open session.
    ///
    /// # Errors
    ///
    /// [`ResolveError`] when the resolution closes nothing; no state changes
    /// either way, and gateways may simply drop the error.
    #[instrument(skip(self))]
    pub fn resolve(
        &self,
        approval_id: ApprovalId,
        responder_id: &str,
        decision: Decision,
    ) -> Result<(), ResolveError> {
        self.coordinator.resolve(approval_id, responder_id, decision)
    }

    /// Checks whether an approval session is still open.
    #[instrument(skip(self))]
    pub fn is_pending(&self, approval_id: ApprovalId) -> bool {
        self.coordinator.is_pending(approval_id)
    }

    /// Looks up a player by external id.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Db`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn find_player(&self, external_id: &str) -> Result<Option<Player>, MatchError> {
        Ok(self.repository.find_player(external_id)?)
    }

    /// Returns all players, highest points first. Ties keep registration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Db`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn leaderboard(&self) -> Result<Vec<Player>, MatchError> {
        debug!("Loading leaderboard");
        Ok(self.repository.leaderboard()?)
    }

    /// Returns the full match ledger, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Db`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn history_all(&self) -> Result<Vec<MatchRecord>, MatchError> {
        debug!("Loading full history");
        Ok(self.repository.list_matches()?)
    }

    /// Returns a registered player's matches, most recent first.
    ///
    /// # Errors
    ///
    /// [`MatchError::NotRegistered`] when the id has no registration.
    #[instrument(skip(self))]
    pub fn history_for(&self, external_id: &str) -> Result<Vec<MatchRecord>, MatchError> {
        debug!(external_id, "Loading player history");
        if self.repository.find_player(external_id)?.is_none() {
            return Err(MatchError::NotRegistered);
        }
        Ok(self.repository.list_matches_for(external_id)?)
    }

    /// Returns a registered player's standing and win/loss record.
    ///
    /// # Errors
    ///
    /// [`MatchError::NotRegistered`] when the id has no registration.
    #[instrument(skip(self))]
    pub fn stats_for(&self, external_id: &str) -> Result<PlayerStats, MatchError> {
        debug!(external_id, "Computing player stats");
        let player = self
            .repository
            .find_player(external_id)?
            .ok_or(MatchError::NotRegistered)?;
        let matches = self.repository.list_matches_for(external_id)?;

        let total_matches = matches.len() as i32;
        let wins = matches
            .iter()
            .filter(|m| m.winner_id() == external_id)
            .count() as i32;
        let losses = total_matches - wins;

        let tier = player.tier();
        let points_to_next_tier = tier.next().map(|next| next.min_points() - player.points());

        let stats = PlayerStats::new(
            player.external_id().clone(),
            player.display_name().clone(),
            *player.points(),
            tier,
            wins,
            losses,
            total_matches,
            points_to_next_tier,
        );

        info!(
            external_id,
            points = stats.points(),
            tier = tier.to_db_string(),
            wins = wins,
            losses = losses,
            "Stats computed"
        );
        Ok(stats)
    }

    /// Wipes the ledger, restarts its id sequence, and zeroes every player.
    /// Registrations survive. Returns (players reset, matches cleared).
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Db`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn reset_season(&self) -> Result<(usize, usize), MatchError> {
        info!("Season reset requested");
        Ok(self.repository.reset_season()?)
    }

    /// Static submission rules, checked before anything is read or opened.
    fn validate_rules(submission: &MatchSubmission) -> Result<(), MatchError> {
        if submission.winner_id() == submission.loser_id() {
            return Err(MatchError::SelfMatch);
        }
        if *submission.winner_score() != WIN_SCORE {
            return Err(MatchError::InvalidScore {
                reason: "winner must score exactly 5",
            });
        }
        if *submission.loser_score() >= WIN_SCORE {
            return Err(MatchError::InvalidScore {
                reason: "loser must score below 5",
            });
        }
        // A tie could only be 5-5, which the loser rule already rejects.
        // The rule stays explicit so reordering the checks cannot lose it.
        if submission.winner_score() == submission.loser_score() {
            return Err(MatchError::TiedScore);
        }
        Ok(())
    }

    /// The participant whose decision closes the session: the other player
    /// when the submitter played, otherwise the configured policy picks.
    fn expected_responder<'a>(&self, submission: &'a MatchSubmission) -> &'a str {
        if submission.submitter_id() == submission.winner_id() {
            submission.loser_id()
        } else if submission.submitter_id() == submission.loser_id() {
            submission.winner_id()
        } else {
            match self.config.third_party_responder() {
                ResponderPolicy::Winner => submission.winner_id(),
                ResponderPolicy::Loser => submission.loser_id(),
            }
        }
    }

    fn validate_name(display_name: &str) -> Result<(), MatchError> {
        let length = display_name.chars().count();
        if length == 0 || length > MAX_NAME_LEN {
            return Err(MatchError::InvalidName);
        }
        Ok(())
    }
}
