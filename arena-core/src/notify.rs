//! Broadcast channel pushing updated game snapshots to viewers.
//!
//! One broadcast channel per game id. Publishing is fire-and-forget: a send
//! with no subscribers is not an error, and slow subscribers simply miss
//! snapshots (broadcast lag). Nothing here can fail a mutation.

use crate::game::{Game, GameId};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// Per-game snapshot broadcaster.
#[derive(Default)]
pub struct GameNotifier {
    channels: Mutex<HashMap<GameId, broadcast::Sender<Game>>>,
}

impl GameNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to snapshots for one game.
    pub fn subscribe(&self, game_id: GameId) -> broadcast::Receiver<Game> {
        let mut channels = self.channels.lock().expect("notifier lock poisoned");
        channels
            .entry(game_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Push a snapshot to all subscribers of its game. Best-effort.
    pub fn publish(&self, game: &Game) {
        let mut channels = self.channels.lock().expect("notifier lock poisoned");
        if let Some(sender) = channels.get(&game.id) {
            if sender.send(game.clone()).is_err() {
                // All receivers dropped; reclaim the channel.
                log::debug!("dropping notification channel for game {}", game.id);
                channels.remove(&game.id);
            }
        }
    }
}
