//! Persistence for game and player aggregates.
//!
//! The engine treats storage as a synchronous dependency behind the `Store`
//! trait: load-by-id and save per aggregate, with saves atomic per
//! aggregate. `MemoryStore` backs tests and embedded use; `FileStore` keeps
//! one JSON document per aggregate under a root directory.

use crate::game::{Game, GameId};
use crate::player::{Player, PlayerId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load and save operations for the two aggregate types.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load_game(&self, id: GameId) -> Result<Option<Game>, StoreError>;
    async fn save_game(&self, game: &Game) -> Result<(), StoreError>;
    async fn load_player(&self, id: PlayerId) -> Result<Option<Player>, StoreError>;
    async fn save_player(&self, player: &Player) -> Result<(), StoreError>;
    async fn list_players(&self) -> Result<Vec<Player>, StoreError>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// HashMap-backed store.
#[derive(Default)]
pub struct MemoryStore {
    games: RwLock<HashMap<GameId, Game>>,
    players: RwLock<HashMap<PlayerId, Player>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_game(&self, id: GameId) -> Result<Option<Game>, StoreError> {
        Ok(self.games.read().await.get(&id).cloned())
    }

    async fn save_game(&self, game: &Game) -> Result<(), StoreError> {
        self.games.write().await.insert(game.id, game.clone());
        Ok(())
    }

    async fn load_player(&self, id: PlayerId) -> Result<Option<Player>, StoreError> {
        Ok(self.players.read().await.get(&id).cloned())
    }

    async fn save_player(&self, player: &Player) -> Result<(), StoreError> {
        self.players
            .write()
            .await
            .insert(player.id, player.clone());
        Ok(())
    }

    async fn list_players(&self) -> Result<Vec<Player>, StoreError> {
        let mut players: Vec<Player> = self.players.read().await.values().cloned().collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(players)
    }
}

// ============================================================================
// File store
// ============================================================================

/// One JSON document per aggregate: `games/<id>.json`, `players/<id>.json`.
///
/// Saves write to a temp file and rename into place, so a crash mid-write
/// never leaves a torn document.
pub struct FileStore {
    games_dir: PathBuf,
    players_dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at the given directory, creating it if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        let games_dir = root.join("games");
        let players_dir = root.join("players");
        fs::create_dir_all(&games_dir).await?;
        fs::create_dir_all(&players_dir).await?;
        Ok(Self {
            games_dir,
            players_dir,
        })
    }

    fn game_path(&self, id: GameId) -> PathBuf {
        self.games_dir.join(format!("{id}.json"))
    }

    fn player_path(&self, id: PlayerId) -> PathBuf {
        self.players_dir.join(format!("{id}.json"))
    }
}

async fn write_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_optional<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, StoreError> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Store for FileStore {
    async fn load_game(&self, id: GameId) -> Result<Option<Game>, StoreError> {
        read_optional(&self.game_path(id)).await
    }

    async fn save_game(&self, game: &Game) -> Result<(), StoreError> {
        write_atomic(&self.game_path(game.id), game).await
    }

    async fn load_player(&self, id: PlayerId) -> Result<Option<Player>, StoreError> {
        read_optional(&self.player_path(id)).await
    }

    async fn save_player(&self, player: &Player) -> Result<(), StoreError> {
        write_atomic(&self.player_path(player.id), player).await
    }

    async fn list_players(&self) -> Result<Vec<Player>, StoreError> {
        let mut players = Vec::new();
        let mut entries = fs::read_dir(&self.players_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let content = fs::read_to_string(&path).await?;
                match serde_json::from_str::<Player>(&content) {
                    Ok(player) => players.push(player),
                    Err(e) => log::warn!("skipping unreadable player file {path:?}: {e}"),
                }
            }
        }

        players.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(players)
    }
}
