//! Survival-game parody engine with an AI narrator.
//!
//! This crate provides:
//! - A game progression engine (roster, day counter, event log, winner
//!   determination) with per-game serialization
//! - A narrative adapter that turns untrusted model output into validated,
//!   identifier-safe game events
//! - Pluggable persistence and a broadcast notification channel
//!
//! # Quick Start
//!
//! ```ignore
//! use arena_core::{GameConfig, GameEngine, MemoryStore, Narrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(openai::OpenAi::from_env()?);
//!     let engine = GameEngine::new(Narrator::new(provider), Arc::new(MemoryStore::new()));
//!
//!     let game = engine.create_game("The 74th Annual", GameConfig::new(4)).await?;
//!     let players = engine.generate_players(2).await?;
//!     for player in &players {
//!         engine.register(game.id, player.id).await?;
//!     }
//!
//!     let mut game = engine.start(game.id).await?;
//!     while !game.status.is_terminal() {
//!         game = engine.advance_day(game.id).await?;
//!     }
//!     println!("winner: {:?}", game.winner);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod game;
pub mod narrator;
pub mod notify;
pub mod player;
pub mod provider;
pub mod store;
pub mod testing;

// Primary public API
pub use engine::{EngineError, GameEngine};
pub use game::{
    Difficulty, Event, EventCategory, EventFrequency, Game, GameConfig, GameError, GameId,
    GameStatus, LifeStatus, Membership,
};
pub use narrator::{
    EventContext, EventKind, GeneratedCharacter, NamedPlayer, NarrativeEvent, Narrator,
    NarratorConfig, NarratorError,
};
pub use notify::GameNotifier;
pub use player::{
    Attributes, GameOutcome, Origin, Personality, Player, PlayerId, Score, SpecialAbility,
    Statistics,
};
pub use provider::{Prompt, ProviderError, TextProvider};
pub use store::{FileStore, MemoryStore, Store, StoreError};

/// Current unix time in whole seconds.
pub(crate) fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
