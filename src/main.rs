//! FightBack - maintenance CLI
//!
//! Administers the match tracking database: schema setup, player seeding,
//! standings queries, and season resets. Submissions and approvals need a
//! live gateway and are not driven from here.

#![warn(missing_docs)]

mod cli;

use std::collections::HashMap;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use fightback::{EngineConfig, LeagueRepository, MatchService};
use tracing_subscriber::EnvFilter;

/// Shown in place of a display name when the player left the league.
const LEFT_PLAYER: &str = "[Left Player]";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let service = build_service(&cli.db_path)?;

    match cli.command {
        Command::Init => run_init(&cli.db_path),
        Command::Register { external_id, name } => run_register(&service, &external_id, &name),
        Command::Leaderboard { json } => run_leaderboard(&service, json),
        Command::History { player, json } => run_history(&service, player.as_deref(), json),
        Command::Stats { external_id, json } => run_stats(&service, &external_id, json),
        Command::Reset { yes } => run_reset(&service, yes),
    }
}

/// Opens the database, bringing the schema up to date.
fn build_service(db_path: &str) -> Result<MatchService> {
    let repository = LeagueRepository::new(db_path.to_string())?;
    repository.run_migrations()?;
    Ok(MatchService::new(repository, EngineConfig::default()))
}

/// Confirm the schema setup that `build_service` already performed.
fn run_init(db_path: &str) -> Result<()> {
    println!("Database ready at {}", db_path);
    Ok(())
}

fn run_register(service: &MatchService, external_id: &str, name: &str) -> Result<()> {
    let player = service.register(external_id, name)?;
    println!(
        "Registered {} as '{}' ({}, {} points)",
        player.external_id(),
        player.display_name(),
        player.tier().to_db_string(),
        player.points()
    );
    Ok(())
}

fn run_leaderboard(service: &MatchService, json: bool) -> Result<()> {
    let players = service.leaderboard()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&players)?);
        return Ok(());
    }

    if players.is_empty() {
        println!("No players registered.");
        return Ok(());
    }

    for (position, player) in players.iter().enumerate() {
        println!(
            "{:>3}. {:<20} {:>5} pts  {}",
            position + 1,
            player.display_name(),
            player.points(),
            player.tier().to_db_string()
        );
    }
    Ok(())
}

fn run_history(service: &MatchService, player: Option<&str>, json: bool) -> Result<()> {
    let matches = match player {
        Some(external_id) => service.history_for(external_id)?,
        None => service.history_all()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No matches recorded.");
        return Ok(());
    }

    let names = display_names(service)?;
    for record in &matches {
        let winner = resolve_name(&names, record.winner_id());
        let loser = resolve_name(&names, record.loser_id());
        println!(
            "#{:<4} {} {}-{} {}  (+{}/-{})  {}",
            record.id(),
            winner,
            record.winner_score(),
            record.loser_score(),
            loser,
            record.winner_points_gained(),
            record.loser_points_lost(),
            record.recorded_at()
        );
    }
    Ok(())
}

fn run_stats(service: &MatchService, external_id: &str, json: bool) -> Result<()> {
    let stats = service.stats_for(external_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{} ({})", stats.display_name(), stats.external_id());
    println!(
        "Points: {}  Rank: {}",
        stats.points(),
        stats.tier().to_db_string()
    );
    println!(
        "Record: {} wins, {} losses in {} matches ({:.1}% win rate)",
        stats.wins(),
        stats.losses(),
        stats.total_matches(),
        stats.win_rate()
    );
    match (stats.points_to_next_tier(), stats.tier().next()) {
        (Some(needed), Some(next)) => {
            println!("Next rank: {} more points to {}", needed, next.to_db_string());
        }
        _ => println!("Top rank reached."),
    }
    Ok(())
}

fn run_reset(service: &MatchService, yes: bool) -> Result<()> {
    if !yes {
        println!("This wipes the match ledger and zeroes every player.");
        println!("Run again with --yes to confirm.");
        return Ok(());
    }

    let (players_reset, matches_cleared) = service.reset_season()?;
    println!(
        "Season reset: {} players zeroed, {} matches cleared.",
        players_reset, matches_cleared
    );
    Ok(())
}

/// Maps external ids to current display names for history rendering.
fn display_names(service: &MatchService) -> Result<HashMap<String, String>> {
    let players = service.leaderboard()?;
    Ok(players
        .into_iter()
        .map(|p| (p.external_id().clone(), p.display_name().clone()))
        .collect())
}

fn resolve_name<'a>(names: &'a HashMap<String, String>, external_id: &str) -> &'a str {
    names.get(external_id).map(String::as_str).unwrap_or(LEFT_PLAYER)
}
