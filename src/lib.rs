//! FightBack library - community match tracking and ranking
//!
//! Players register under an opaque external id, report match results against
//! each other, and climb a points ladder split into rank tiers. A reported
//! match counts only after the other participant approves it within a
//! timeout; approval triggers an atomic points-and-ledger update whose deltas
//! come from the rank-difference formula.
//!
//! # Architecture
//!
//! - **Service**: [`MatchService`] validates submissions, runs the approval
//!   rendezvous, and applies approved results
//! - **Approval**: [`ApprovalCoordinator`] holds open sessions as one-shot
//!   channels raced against the configured window
//! - **Storage**: [`LeagueRepository`] persists players and the match ledger
//!   in SQLite via diesel
//! - **Rank**: pure tier derivation and the point delta formula
//!
//! # Example
//!
//! ```no_run
//! use fightback::{Decision, EngineConfig, LeagueRepository, MatchService, MatchSubmission};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let repository = LeagueRepository::new("fightback.db".to_string())?;
//! repository.run_migrations()?;
//!
//! let service = MatchService::new(repository, EngineConfig::default());
//! service.register("7001", "Ken")?;
//! service.register("7002", "Ryu")?;
//!
//! // Ken reports a 5-2 win; Ryu has the approval window to respond.
//! let ticket = service.open_submission(MatchSubmission::new(
//!     "7001".to_string(),
//!     "7001".to_string(),
//!     "7002".to_string(),
//!     5,
//!     2,
//! ))?;
//! let approval_id = *ticket.pending().approval_id();
//!
//! // Normally another task resolves while this one awaits the outcome.
//! service.resolve(approval_id, "7002", Decision::Approve).ok();
//! let _outcome = service.await_outcome(ticket).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod approval;
mod config;
mod cooldown;
mod db;
mod rank;
mod service;

// Crate-level exports - Approval sessions
pub use approval::{
    ApprovalCoordinator, ApprovalHandle, ApprovalId, ApprovalOutcome, Decision, PendingApproval,
    ResolveError,
};

// Crate-level exports - Configuration
pub use config::{ConfigError, EngineConfig, ResponderPolicy};

// Crate-level exports - Cooldown tracking
pub use cooldown::CooldownTracker;

// Crate-level exports - Persistence
pub use db::{
    AppliedMatch, DbError, LeagueRepository, MatchRecord, NewMatchRecord, NewPlayer, Player,
};

// Crate-level exports - Rank model
pub use rank::{PointDeltas, Tier, WIN_SCORE, compute_deltas};

// Crate-level exports - Match service
pub use service::{
    MAX_NAME_LEN, MatchError, MatchService, MatchSubmission, PlayerStats, SubmissionTicket,
    SubmitOutcome,
};
