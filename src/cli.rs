//! Command-line interface for fightback maintenance.

use clap::{Parser, Subcommand};

/// FightBack - community match tracking and ranking
#[derive(Parser, Debug)]
#[command(name = "fightback")]
#[command(about = "Maintenance CLI for the match tracking database", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the database file (created if it doesn't exist)
    #[arg(long, default_value = "fightback.db")]
    pub db_path: String,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or upgrade the database schema
    Init,

    /// Register a player
    Register {
        /// Opaque external id of the player
        external_id: String,

        /// Display name (up to 20 characters)
        name: String,
    },

    /// Show all players ranked by points
    Leaderboard {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the match ledger, most recent first
    History {
        /// Restrict to matches involving this external id
        #[arg(long)]
        player: Option<String>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show one player's standing and win/loss record
    Stats {
        /// Opaque external id of the player
        external_id: String,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Wipe the match ledger and zero every player
    Reset {
        /// Confirm the irreversible reset
        #[arg(long)]
        yes: bool,
    },
}
