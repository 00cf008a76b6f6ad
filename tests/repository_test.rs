//! Tests for player standings and match ledger repository operations.

use diesel::Connection;
use diesel::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tempfile::NamedTempFile;

use fightback::{LeagueRepository, NewMatchRecord, Tier};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Creates a temporary database file with schema applied, returns the file
/// handle (must stay in scope to keep the file alive) and a ready repository.
fn setup_test_db() -> (NamedTempFile, LeagueRepository) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let mut conn = SqliteConnection::establish(&db_path).expect("Failed to connect");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Migrations failed");

    let repo = LeagueRepository::new(db_path).expect("Failed to create repository");
    (db_file, repo)
}

#[test]
fn test_register_player() {
    let (_db, repo) = setup_test_db();
    let player = repo.register_player("7001", "Ken").expect("Register failed");

    assert!(*player.id() > 0);
    assert_eq!(player.external_id(), "7001");
    assert_eq!(player.display_name(), "Ken");
    assert_eq!(*player.points(), 0);
    assert_eq!(player.rank(), "Bronze");
    assert_eq!(player.tier(), Tier::Bronze);
}

#[test]
fn test_register_duplicate_external_id_fails() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("First register failed");
    let result = repo.register_player("7001", "Ken II");
    assert!(result.is_err(), "Duplicate external id should fail");
}

#[test]
fn test_find_player() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");

    let found = repo.find_player("7001").expect("Query failed");
    assert_eq!(found.expect("Should exist").display_name(), "Ken");

    let missing = repo.find_player("9999").expect("Query failed");
    assert!(missing.is_none());
}

#[test]
fn test_rename_player() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");

    let renamed = repo
        .rename_player("7001", "Ken Masters")
        .expect("Rename failed")
        .expect("Should exist");
    assert_eq!(renamed.display_name(), "Ken Masters");

    let missing = repo.rename_player("9999", "Ghost").expect("Rename failed");
    assert!(missing.is_none());
}

#[test]
fn test_unregister_player() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");

    assert!(repo.unregister_player("7001").expect("Unregister failed"));
    assert!(repo.find_player("7001").expect("Query failed").is_none());

    assert!(!repo.unregister_player("7001").expect("Unregister failed"));
}

#[test]
fn test_history_survives_unregistration() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");
    repo.register_player("7002", "Ryu").expect("Register failed");
    repo.record_approved_match("7001", "7002", 5, 2)
        .expect("Apply failed")
        .expect("Both registered");

    repo.unregister_player("7002").expect("Unregister failed");

    let matches = repo.list_matches_for("7002").expect("List failed");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].loser_id(), "7002");
}

#[test]
fn test_leaderboard_orders_by_points_then_registration() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");
    repo.register_player("7002", "Ryu").expect("Register failed");
    repo.register_player("7003", "Chun-Li").expect("Register failed");

    repo.apply_points_delta("7002", 10).expect("Adjust failed");
    repo.apply_points_delta("7003", 10).expect("Adjust failed");

    let board = repo.leaderboard().expect("Leaderboard failed");
    assert_eq!(board.len(), 3);
    // Ryu and Chun-Li tie on points; Ryu registered first.
    assert_eq!(board[0].external_id(), "7002");
    assert_eq!(board[1].external_id(), "7003");
    assert_eq!(board[2].external_id(), "7001");
}

#[test]
fn test_points_delta_floors_at_zero() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");

    let player = repo
        .apply_points_delta("7001", -5)
        .expect("Adjust failed")
        .expect("Should exist");
    assert_eq!(*player.points(), 0);

    let player = repo
        .apply_points_delta("7001", 7)
        .expect("Adjust failed")
        .expect("Should exist");
    assert_eq!(*player.points(), 7);

    let player = repo
        .apply_points_delta("7001", -10)
        .expect("Adjust failed")
        .expect("Should exist");
    assert_eq!(*player.points(), 0);

    let missing = repo.apply_points_delta("9999", 5).expect("Adjust failed");
    assert!(missing.is_none());
}

#[test]
fn test_points_delta_keeps_rank_cache_in_sync() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");

    let player = repo
        .apply_points_delta("7001", 30)
        .expect("Adjust failed")
        .expect("Should exist");
    assert_eq!(*player.points(), 30);
    assert_eq!(player.rank(), "Silver");
    assert_eq!(player.parse_rank().expect("Parse failed"), Tier::Silver);

    let player = repo
        .apply_points_delta("7001", 100)
        .expect("Adjust failed")
        .expect("Should exist");
    assert_eq!(player.rank(), "Platinum");
}

#[test]
fn test_insert_match_assigns_monotonic_ids() {
    let (_db, repo) = setup_test_db();

    for n in 1..=3 {
        let record = repo
            .insert_match(NewMatchRecord::new(
                "7001".to_string(),
                "7002".to_string(),
                5,
                n,
                5,
                3,
            ))
            .expect("Insert failed");
        assert_eq!(*record.id(), n);
    }
}

#[test]
fn test_list_matches_most_recent_first() {
    let (_db, repo) = setup_test_db();

    for n in 0..3 {
        repo.insert_match(NewMatchRecord::new(
            "7001".to_string(),
            "7002".to_string(),
            5,
            n,
            5,
            3,
        ))
        .expect("Insert failed");
    }

    let matches = repo.list_matches().expect("List failed");
    assert_eq!(matches.len(), 3);
    // Same-second timestamps fall back to id order, newest insert first.
    assert_eq!(*matches[0].id(), 3);
    assert_eq!(*matches[1].id(), 2);
    assert_eq!(*matches[2].id(), 1);
}

#[test]
fn test_list_matches_for_covers_both_roles() {
    let (_db, repo) = setup_test_db();

    repo.insert_match(NewMatchRecord::new(
        "7001".to_string(),
        "7002".to_string(),
        5,
        2,
        5,
        3,
    ))
    .expect("Insert failed");
    repo.insert_match(NewMatchRecord::new(
        "7003".to_string(),
        "7001".to_string(),
        5,
        4,
        5,
        3,
    ))
    .expect("Insert failed");
    repo.insert_match(NewMatchRecord::new(
        "7002".to_string(),
        "7003".to_string(),
        5,
        0,
        5,
        3,
    ))
    .expect("Insert failed");

    let ken = repo.list_matches_for("7001").expect("List failed");
    assert_eq!(ken.len(), 2);
    assert!(ken.iter().all(|m| m.involves("7001")));

    let nobody = repo.list_matches_for("9999").expect("List failed");
    assert!(nobody.is_empty());
}

#[test]
fn test_clear_matches_restarts_id_sequence() {
    let (_db, repo) = setup_test_db();

    for _ in 0..2 {
        repo.insert_match(NewMatchRecord::new(
            "7001".to_string(),
            "7002".to_string(),
            5,
            1,
            5,
            3,
        ))
        .expect("Insert failed");
    }

    let cleared = repo.clear_matches().expect("Clear failed");
    assert_eq!(cleared, 2);
    assert!(repo.list_matches().expect("List failed").is_empty());

    let record = repo
        .insert_match(NewMatchRecord::new(
            "7001".to_string(),
            "7002".to_string(),
            5,
            1,
            5,
            3,
        ))
        .expect("Insert failed");
    assert_eq!(*record.id(), 1);
}

#[test]
fn test_record_approved_match_equal_tiers() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");
    repo.register_player("7002", "Ryu").expect("Register failed");

    let applied = repo
        .record_approved_match("7001", "7002", 5, 3)
        .expect("Apply failed")
        .expect("Both registered");

    assert_eq!(*applied.winner().points(), 5);
    // Ryu had nothing to lose; the floor held him at zero.
    assert_eq!(*applied.loser().points(), 0);
    assert_eq!(*applied.record().winner_points_gained(), 5);
    assert_eq!(*applied.record().loser_points_lost(), 3);
    assert_eq!(applied.record().winner_id(), "7001");
    assert_eq!(*applied.record().winner_score(), 5);
    assert_eq!(*applied.record().loser_score(), 3);
}

#[test]
fn test_record_approved_match_upset_amplifies() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");
    repo.register_player("7002", "Ryu").expect("Register failed");
    repo.apply_points_delta("7001", 10).expect("Adjust failed");
    repo.apply_points_delta("7002", 60).expect("Adjust failed");

    // Bronze beats Gold: gap 2, so +9 / -7.
    let applied = repo
        .record_approved_match("7001", "7002", 5, 4)
        .expect("Apply failed")
        .expect("Both registered");

    assert_eq!(*applied.winner().points(), 19);
    assert_eq!(*applied.loser().points(), 53);
    assert_eq!(*applied.record().winner_points_gained(), 9);
    assert_eq!(*applied.record().loser_points_lost(), 7);
    assert_eq!(applied.loser().tier(), Tier::Gold);
}

#[test]
fn test_record_approved_match_refreshes_rank_cache() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");
    repo.register_player("7002", "Ryu").expect("Register failed");
    repo.apply_points_delta("7001", 22).expect("Adjust failed");

    let applied = repo
        .record_approved_match("7001", "7002", 5, 0)
        .expect("Apply failed")
        .expect("Both registered");

    // 22 + 5 crosses the Silver boundary; the stored rank follows.
    assert_eq!(*applied.winner().points(), 27);
    assert_eq!(applied.winner().rank(), "Silver");
}

#[test]
fn test_record_approved_match_missing_participant_changes_nothing() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");

    let applied = repo
        .record_approved_match("7001", "9999", 5, 2)
        .expect("Apply failed");
    assert!(applied.is_none());

    let ken = repo
        .find_player("7001")
        .expect("Query failed")
        .expect("Should exist");
    assert_eq!(*ken.points(), 0);
    assert!(repo.list_matches().expect("List failed").is_empty());
}

#[test]
fn test_reset_season_zeroes_players_and_wipes_ledger() {
    let (_db, repo) = setup_test_db();
    repo.register_player("7001", "Ken").expect("Register failed");
    repo.register_player("7002", "Ryu").expect("Register failed");
    repo.apply_points_delta("7001", 60).expect("Adjust failed");
    repo.record_approved_match("7001", "7002", 5, 1)
        .expect("Apply failed")
        .expect("Both registered");

    let (players_reset, matches_cleared) = repo.reset_season().expect("Reset failed");
    assert_eq!(players_reset, 2);
    assert_eq!(matches_cleared, 1);

    let board = repo.leaderboard().expect("Leaderboard failed");
    assert_eq!(board.len(), 2, "Registrations survive a reset");
    for player in &board {
        assert_eq!(*player.points(), 0);
        assert_eq!(player.rank(), "Bronze");
    }
    assert!(repo.list_matches().expect("List failed").is_empty());

    // The ledger id sequence starts over with the new season.
    let record = repo
        .record_approved_match("7001", "7002", 5, 0)
        .expect("Apply failed")
        .expect("Both registered");
    assert_eq!(*record.record().id(), 1);
}
