//! Game progression engine.
//!
//! The engine is the single mutating entry point for games. Every
//! progression operation follows the same shape: take the per-game lock,
//! load a working copy from the store, mutate, save, then broadcast the new
//! snapshot. A failed narrator or store call drops the working copy, so the
//! persisted state never reflects a partial operation and the caller can
//! retry.
//!
//! Operations on different games are independent; the per-game lock is the
//! only serialization, and it is held across the narrator await so a second
//! `advance_day` on the same game cannot start mid-generation.

use crate::game::{Event, EventCategory, Game, GameConfig, GameError, GameId, GameStatus};
use crate::narrator::{EventContext, EventKind, NamedPlayer, Narrator, NarratorError};
use crate::notify::GameNotifier;
use crate::player::{GameOutcome, Origin, Player, PlayerId};
use crate::store::{Store, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("game {0} not found")]
    GameNotFound(GameId),

    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error("generation failed: {0}")]
    Generation(#[from] NarratorError),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl EngineError {
    /// Whether the caller may simply retry the same operation.
    ///
    /// Generation and storage failures leave the game unchanged; state
    /// machine violations will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Generation(_) | EngineError::Storage(_))
    }
}

/// The game progression engine.
pub struct GameEngine {
    narrator: Narrator,
    store: Arc<dyn Store>,
    notifier: GameNotifier,
    locks: Mutex<HashMap<GameId, Arc<Mutex<()>>>>,
}

impl GameEngine {
    pub fn new(narrator: Narrator, store: Arc<dyn Store>) -> Self {
        Self {
            narrator,
            store,
            notifier: GameNotifier::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to snapshot broadcasts for one game.
    pub fn subscribe(&self, game_id: GameId) -> tokio::sync::broadcast::Receiver<Game> {
        self.notifier.subscribe(game_id)
    }

    // ========================================================================
    // Game operations
    // ========================================================================

    /// Create and persist a new pending game.
    pub async fn create_game(
        &self,
        title: impl Into<String>,
        config: GameConfig,
    ) -> Result<Game, EngineError> {
        let game = Game::new(title, config);
        self.store.save_game(&game).await?;
        Ok(game)
    }

    /// Fetch a game snapshot.
    pub async fn get_game(&self, game_id: GameId) -> Result<Game, EngineError> {
        self.load_game(game_id).await
    }

    /// Add a player to a pending game's roster.
    pub async fn register(
        &self,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Game, EngineError> {
        let lock = self.game_lock(game_id).await;
        let _guard = lock.lock().await;

        let mut game = self.load_game(game_id).await?;
        let player = self
            .store
            .load_player(player_id)
            .await?
            .ok_or(EngineError::PlayerNotFound(player_id))?;

        game.add_member(player.id, player.name)?;
        self.store.save_game(&game).await?;
        self.notifier.publish(&game);
        Ok(game)
    }

    /// Start a pending game: day 1 opens with one narrated game-start event
    /// over the full roster.
    pub async fn start(&self, game_id: GameId) -> Result<Game, EngineError> {
        let lock = self.game_lock(game_id).await;
        let _guard = lock.lock().await;

        let mut game = self.load_game(game_id).await?;
        game.begin()?;

        let roster = named_roster(&game);
        let context = EventContext {
            kind: EventKind::GameStart,
            difficulty: game.config.difficulty,
        };
        let event = self
            .narrator
            .generate_event(&roster, game.current_day, &context)
            .await?;

        game.record_event(Event::new(
            game.current_day,
            event.description,
            event.participants,
            event.category,
        ))?;

        self.store.save_game(&game).await?;
        self.notifier.publish(&game);
        Ok(game)
    }

    /// Advance an in-progress game by one day.
    ///
    /// When at most one member is still alive this completes the game
    /// instead: the survivor (if any) becomes the winner and their final
    /// tallies are folded into the player aggregate. No event is generated
    /// on the completing call.
    pub async fn advance_day(&self, game_id: GameId) -> Result<Game, EngineError> {
        let lock = self.game_lock(game_id).await;
        let _guard = lock.lock().await;

        let mut game = self.load_game(game_id).await?;
        if game.status != GameStatus::InProgress {
            return Err(GameError::InvalidState(game.status).into());
        }

        let alive: Vec<NamedPlayer> = game
            .alive_members()
            .map(|m| NamedPlayer {
                id: m.player_id,
                name: m.player_name.clone(),
            })
            .collect();

        if alive.len() <= 1 {
            return self.finish_game(game, alive.first().map(|p| p.id)).await;
        }

        let context = EventContext {
            kind: EventKind::DayEvent { alive: alive.len() },
            difficulty: game.config.difficulty,
        };
        let event = self
            .narrator
            .generate_event(&alive, game.current_day, &context)
            .await?;

        match event.category {
            EventCategory::Death => {
                self.process_deaths(&mut game, &event.participants, event.cause.as_deref())
                    .await?;
            }
            EventCategory::Alliance => {
                game.form_alliances(&event.participants);
            }
            _ => {}
        }

        game.record_event(Event::new(
            game.current_day,
            event.description,
            event.participants,
            event.category,
        ))?;
        game.advance_day();

        self.store.save_game(&game).await?;
        self.notifier.publish(&game);
        Ok(game)
    }

    /// Mark every named participant deceased, each with its own narrated
    /// death scene. Already-deceased participants are skipped, so one event
    /// naming a player twice kills them once.
    async fn process_deaths(
        &self,
        game: &mut Game,
        participants: &[PlayerId],
        cause: Option<&str>,
    ) -> Result<(), EngineError> {
        let day = game.current_day;

        for &player_id in participants {
            if !game.is_alive(player_id) {
                continue;
            }
            let name = game
                .member(player_id)
                .map(|m| m.player_name.clone())
                .unwrap_or_default();
            let cause_hint = cause.unwrap_or("misadventure");

            let scene = self.narrator.generate_death_scene(&name, cause_hint).await?;
            game.mark_deceased(player_id, scene, day)?;
        }
        Ok(())
    }

    /// Complete a game, folding the winner's final tallies into their
    /// player aggregate. The player is saved before the game, matching the
    /// order a retried completion replays.
    async fn finish_game(
        &self,
        mut game: Game,
        winner: Option<PlayerId>,
    ) -> Result<Game, EngineError> {
        if let Some(winner_id) = winner {
            let kills = game.member(winner_id).map(|m| m.kills).unwrap_or(0);
            let mut player = self
                .store
                .load_player(winner_id)
                .await?
                .ok_or(EngineError::PlayerNotFound(winner_id))?;
            player.statistics.record_outcome(GameOutcome {
                won: true,
                kills,
                survival_days: game.current_day,
            });
            game.complete(Some(winner_id))?;
            self.store.save_player(&player).await?;
        } else {
            game.complete(None)?;
        }

        self.store.save_game(&game).await?;
        self.notifier.publish(&game);
        Ok(game)
    }

    // ========================================================================
    // Player operations
    // ========================================================================

    /// Persist a custom player.
    pub async fn create_player(&self, player: Player) -> Result<Player, EngineError> {
        self.store.save_player(&player).await?;
        Ok(player)
    }

    /// Generate and persist one AI player. A generation or parse failure
    /// persists nothing.
    pub async fn generate_player(&self) -> Result<Player, EngineError> {
        let character = self.narrator.generate_character().await?;

        let mut player = Player::new(
            character.name,
            Origin::Generated,
            character.description,
            character.attributes,
            character.personality,
        );
        player.backstory = character.backstory;
        player.special_ability = character.special_ability;

        self.store.save_player(&player).await?;
        Ok(player)
    }

    /// Generate and persist several AI players. Fails on the first bad
    /// generation; earlier players in the batch stay persisted.
    pub async fn generate_players(&self, count: usize) -> Result<Vec<Player>, EngineError> {
        let mut players = Vec::with_capacity(count);
        for _ in 0..count {
            players.push(self.generate_player().await?);
        }
        Ok(players)
    }

    /// Fetch a player.
    pub async fn get_player(&self, player_id: PlayerId) -> Result<Player, EngineError> {
        self.store
            .load_player(player_id)
            .await?
            .ok_or(EngineError::PlayerNotFound(player_id))
    }

    /// List all known players.
    pub async fn list_players(&self) -> Result<Vec<Player>, EngineError> {
        Ok(self.store.list_players().await?)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn load_game(&self, game_id: GameId) -> Result<Game, EngineError> {
        self.store
            .load_game(game_id)
            .await?
            .ok_or(EngineError::GameNotFound(game_id))
    }

    /// Fetch or create the mutex serializing operations on one game.
    ///
    /// The registry lock is held only long enough to clone the entry; the
    /// per-game lock itself is held across narrator awaits.
    async fn game_lock(&self, game_id: GameId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(game_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// The full roster (alive or not) as narrator input.
fn named_roster(game: &Game) -> Vec<NamedPlayer> {
    game.members
        .iter()
        .map(|m| NamedPlayer {
            id: m.player_id,
            name: m.player_name.clone(),
        })
        .collect()
}
