//! Integration tests for the game progression engine.
//!
//! These drive the engine through full game lifecycles with a scripted
//! provider playing the model, so every run is deterministic and no API
//! calls are made:
//! - Registration and start preconditions
//! - Day-by-day progression down to a winner
//! - Failure atomicity (a failed generation changes nothing)
//! - Notification broadcasts

use arena_core::testing::{
    character_json, death_event_json, event_json, sample_player, scripted_engine,
};
use arena_core::{
    EngineError, GameConfig, GameError, GameStatus, LifeStatus, NarratorError, PlayerId,
    ProviderError,
};

fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// =============================================================================
// REGISTRATION AND START
// =============================================================================

#[tokio::test]
async fn test_register_fails_at_capacity() {
    let (engine, _provider) = scripted_engine();
    let game = engine
        .create_game("Tiny Arena", GameConfig::new(2))
        .await
        .unwrap();

    for name in ["One", "Two"] {
        let player = engine.create_player(sample_player(name)).await.unwrap();
        engine.register(game.id, player.id).await.unwrap();
    }

    let third = engine.create_player(sample_player("Three")).await.unwrap();
    let err = engine.register(game.id, third.id).await;
    assert!(matches!(
        err,
        Err(EngineError::Game(GameError::CapacityExceeded { max: 2 }))
    ));
}

#[tokio::test]
async fn test_start_requires_two_players() {
    let (engine, provider) = scripted_engine();
    let game = engine
        .create_game("Lonely Arena", GameConfig::new(4))
        .await
        .unwrap();

    let err = engine.start(game.id).await;
    assert!(matches!(
        err,
        Err(EngineError::Game(GameError::InsufficientPlayers(0)))
    ));

    let solo = engine.create_player(sample_player("Solo")).await.unwrap();
    engine.register(game.id, solo.id).await.unwrap();
    let err = engine.start(game.id).await;
    assert!(matches!(
        err,
        Err(EngineError::Game(GameError::InsufficientPlayers(1)))
    ));

    // No provider call should have happened for either failure.
    assert_eq!(provider.remaining(), 0);
}

#[tokio::test]
async fn test_start_opens_day_one_with_event() {
    let (engine, provider) = scripted_engine();
    let game = engine
        .create_game("Opening Day", GameConfig::new(4))
        .await
        .unwrap();

    let alice = engine.create_player(sample_player("Alice")).await.unwrap();
    let bob = engine.create_player(sample_player("Bob")).await.unwrap();
    engine.register(game.id, alice.id).await.unwrap();
    engine.register(game.id, bob.id).await.unwrap();

    provider.push_text(event_json("environment", &["Alice", "Bob"]));
    let game = engine.start(game.id).await.unwrap();

    assert_eq!(game.status, GameStatus::InProgress);
    assert_eq!(game.current_day, 1);
    assert_eq!(game.events.len(), 1);
    assert_eq!(game.events[0].day, 1);
    assert_eq!(game.events[0].participants.len(), 2);
}

#[tokio::test]
async fn test_advance_requires_in_progress() {
    let (engine, _provider) = scripted_engine();
    let game = engine
        .create_game("Not Started", GameConfig::new(4))
        .await
        .unwrap();

    let err = engine.advance_day(game.id).await;
    assert!(matches!(
        err,
        Err(EngineError::Game(GameError::InvalidState(
            GameStatus::Pending
        )))
    ));
}

// =============================================================================
// FULL GAME LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_end_to_end_until_winner() {
    setup();
    let (engine, provider) = scripted_engine();
    let game = engine
        .create_game("The Big One", GameConfig::new(4))
        .await
        .unwrap();

    let alice = engine.create_player(sample_player("Alice")).await.unwrap();
    let bob = engine.create_player(sample_player("Bob")).await.unwrap();
    engine.register(game.id, alice.id).await.unwrap();
    engine.register(game.id, bob.id).await.unwrap();

    provider.push_text(event_json("environment", &["Alice", "Bob"]));
    let game_state = engine.start(game.id).await.unwrap();
    assert_eq!(game_state.status, GameStatus::InProgress);
    assert_eq!(game_state.current_day, 1);
    assert_eq!(game_state.events.len(), 1);

    // Day 1: Bob dies (one event payload plus one death scene).
    provider.push_text(death_event_json(&["Bob"]));
    provider.push_text("Bob was bested by a condiment.");
    let game_state = engine.advance_day(game.id).await.unwrap();

    assert_eq!(game_state.current_day, 2);
    assert_eq!(game_state.alive_count(), 1);
    let bob_membership = game_state.member(bob.id).unwrap();
    assert_eq!(bob_membership.status, LifeStatus::Deceased);
    assert_eq!(bob_membership.day_of_death, Some(1));
    assert_eq!(
        bob_membership.cause_of_death.as_deref(),
        Some("Bob was bested by a condiment.")
    );

    // Day 2: one player left, so the game completes with no new event.
    let events_before = game_state.events.len();
    let game_state = engine.advance_day(game.id).await.unwrap();

    assert_eq!(game_state.status, GameStatus::Completed);
    assert_eq!(game_state.winner, Some(alice.id));
    assert_eq!(game_state.events.len(), events_before);

    // Event log day numbers are non-decreasing.
    let days: Vec<u32> = game_state.events.iter().map(|e| e.day).collect();
    assert!(days.windows(2).all(|w| w[0] <= w[1]));

    // The winner's statistics reflect exactly one additional win.
    let alice = engine.get_player(alice.id).await.unwrap();
    assert_eq!(alice.statistics.games_played, 1);
    assert_eq!(alice.statistics.wins, 1);
    assert!((alice.statistics.avg_survival_days - 2.0).abs() < f64::EPSILON);

    // A completed game rejects further progression.
    let err = engine.advance_day(game.id).await;
    assert!(matches!(
        err,
        Err(EngineError::Game(GameError::InvalidState(
            GameStatus::Completed
        )))
    ));
    assert_eq!(provider.remaining(), 0);
}

#[tokio::test]
async fn test_multi_death_event() {
    let (engine, provider) = scripted_engine();
    let game = engine
        .create_game("Bad Day", GameConfig::new(4))
        .await
        .unwrap();

    for name in ["Ann", "Ben", "Cal"] {
        let player = engine.create_player(sample_player(name)).await.unwrap();
        engine.register(game.id, player.id).await.unwrap();
    }

    provider.push_text(event_json("other", &[]));
    engine.start(game.id).await.unwrap();

    // A single event kills two participants; each gets its own scene.
    provider.push_text(death_event_json(&["Ann", "Ben"]));
    provider.push_text("Ann discovered the floor was lava.");
    provider.push_text("Ben followed to check.");
    let game_state = engine.advance_day(game.id).await.unwrap();

    assert_eq!(game_state.alive_count(), 1);
    assert_eq!(
        game_state
            .members
            .iter()
            .filter(|m| m.status == LifeStatus::Deceased)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_no_survivors_completes_without_winner() {
    let (engine, provider) = scripted_engine();
    let game = engine
        .create_game("Total Wipeout", GameConfig::new(4))
        .await
        .unwrap();

    let alice = engine.create_player(sample_player("Alice")).await.unwrap();
    let bob = engine.create_player(sample_player("Bob")).await.unwrap();
    engine.register(game.id, alice.id).await.unwrap();
    engine.register(game.id, bob.id).await.unwrap();

    provider.push_text(event_json("other", &[]));
    engine.start(game.id).await.unwrap();

    provider.push_text(death_event_json(&["Alice", "Bob"]));
    provider.push_text("Alice zigged.");
    provider.push_text("Bob zagged.");
    engine.advance_day(game.id).await.unwrap();

    let game_state = engine.advance_day(game.id).await.unwrap();
    assert_eq!(game_state.status, GameStatus::Completed);
    assert_eq!(game_state.winner, None);

    // Nobody won, so nobody's statistics moved.
    let alice = engine.get_player(alice.id).await.unwrap();
    assert_eq!(alice.statistics.games_played, 0);
}

#[tokio::test]
async fn test_unknown_participants_are_dropped() {
    let (engine, provider) = scripted_engine();
    let game = engine
        .create_game("Ghost Hunt", GameConfig::new(4))
        .await
        .unwrap();

    let alice = engine.create_player(sample_player("Alice")).await.unwrap();
    let bob = engine.create_player(sample_player("Bob")).await.unwrap();
    engine.register(game.id, alice.id).await.unwrap();
    engine.register(game.id, bob.id).await.unwrap();

    provider.push_text(event_json("other", &[]));
    engine.start(game.id).await.unwrap();

    // The model invents "Charlie"; only Alice resolves.
    provider.push_text(event_json("combat", &["Alice", "Charlie"]));
    let game_state = engine.advance_day(game.id).await.unwrap();

    let last = game_state.events.last().unwrap();
    assert_eq!(last.participants, vec![alice.id]);
}

#[tokio::test]
async fn test_alliance_event_links_members() {
    let (engine, provider) = scripted_engine();
    let game = engine
        .create_game("Buddy System", GameConfig::new(4))
        .await
        .unwrap();

    let alice = engine.create_player(sample_player("Alice")).await.unwrap();
    let bob = engine.create_player(sample_player("Bob")).await.unwrap();
    engine.register(game.id, alice.id).await.unwrap();
    engine.register(game.id, bob.id).await.unwrap();

    provider.push_text(event_json("other", &[]));
    engine.start(game.id).await.unwrap();

    provider.push_text(event_json("alliance", &["Alice", "Bob"]));
    let game_state = engine.advance_day(game.id).await.unwrap();

    assert!(game_state
        .member(alice.id)
        .unwrap()
        .alliances
        .contains(&bob.id));
    assert!(game_state
        .member(bob.id)
        .unwrap()
        .alliances
        .contains(&alice.id));
}

// =============================================================================
// FAILURE ATOMICITY
// =============================================================================

#[tokio::test]
async fn test_failed_generation_leaves_game_unchanged() {
    let (engine, provider) = scripted_engine();
    let game = engine
        .create_game("Flaky Model", GameConfig::new(4))
        .await
        .unwrap();

    let alice = engine.create_player(sample_player("Alice")).await.unwrap();
    let bob = engine.create_player(sample_player("Bob")).await.unwrap();
    engine.register(game.id, alice.id).await.unwrap();
    engine.register(game.id, bob.id).await.unwrap();

    provider.push_text(event_json("other", &[]));
    let before = engine.start(game.id).await.unwrap();

    provider.push_error(ProviderError::Call("model on fire".to_string()));
    let err = engine.advance_day(game.id).await.unwrap_err();
    assert!(err.is_retryable());

    let after = engine.get_game(game.id).await.unwrap();
    assert_eq!(after.current_day, before.current_day);
    assert_eq!(after.events.len(), before.events.len());
    assert_eq!(after.alive_count(), 2);
}

#[tokio::test]
async fn test_failed_death_scene_discards_partial_deaths() {
    let (engine, provider) = scripted_engine();
    let game = engine
        .create_game("Half Measures", GameConfig::new(4))
        .await
        .unwrap();

    for name in ["Ann", "Ben", "Cal"] {
        let player = engine.create_player(sample_player(name)).await.unwrap();
        engine.register(game.id, player.id).await.unwrap();
    }
    provider.push_text(event_json("other", &[]));
    engine.start(game.id).await.unwrap();

    // The event parses, the first scene succeeds, the second fails.
    provider.push_text(death_event_json(&["Ann", "Ben"]));
    provider.push_text("Ann's parachute was a tablecloth.");
    provider.push_error(ProviderError::Call("timeout".to_string()));

    let err = engine.advance_day(game.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Generation(NarratorError::Generation(_))
    ));

    // Nothing was persisted: everyone is still alive.
    let after = engine.get_game(game.id).await.unwrap();
    assert_eq!(after.alive_count(), 3);
    assert_eq!(after.current_day, 1);
}

#[tokio::test]
async fn test_malformed_character_persists_nothing() {
    let (engine, provider) = scripted_engine();

    provider.push_text("not json at all {{{");
    let err = engine.generate_player().await;
    assert!(matches!(
        err,
        Err(EngineError::Generation(NarratorError::Parse(_)))
    ));

    assert!(engine.list_players().await.unwrap().is_empty());
}

// =============================================================================
// PLAYERS AND NOTIFICATIONS
// =============================================================================

#[tokio::test]
async fn test_generate_players_batch() {
    let (engine, provider) = scripted_engine();
    provider.push_text(character_json("Gen One"));
    provider.push_text(character_json("Gen Two"));

    let players = engine.generate_players(2).await.unwrap();
    assert_eq!(players.len(), 2);
    assert_eq!(engine.list_players().await.unwrap().len(), 2);

    for player in &players {
        let loaded = engine.get_player(player.id).await.unwrap();
        assert_eq!(loaded.origin, arena_core::Origin::Generated);
    }
}

#[tokio::test]
async fn test_get_player_not_found() {
    let (engine, _provider) = scripted_engine();
    let err = engine.get_player(PlayerId::new()).await;
    assert!(matches!(err, Err(EngineError::PlayerNotFound(_))));
}

#[tokio::test]
async fn test_mutations_broadcast_snapshots() {
    let (engine, provider) = scripted_engine();
    let game = engine
        .create_game("Spectated", GameConfig::new(4))
        .await
        .unwrap();
    let mut rx = engine.subscribe(game.id);

    let alice = engine.create_player(sample_player("Alice")).await.unwrap();
    let bob = engine.create_player(sample_player("Bob")).await.unwrap();
    engine.register(game.id, alice.id).await.unwrap();
    engine.register(game.id, bob.id).await.unwrap();

    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.members.len(), 1);
    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.members.len(), 2);

    provider.push_text(event_json("other", &[]));
    engine.start(game.id).await.unwrap();
    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.status, GameStatus::InProgress);
}
