//! Database persistence layer for player standings and the match ledger.

use diesel_migrations::{EmbeddedMigrations, embed_migrations};

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::DbError;
pub use models::{AppliedMatch, MatchRecord, NewMatchRecord, NewPlayer, Player};
pub use repository::LeagueRepository;

/// Migrations compiled into the binary so deployments never need the files
/// on disk.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
