//! Game aggregate: roster, event log, day counter, and status transitions.
//!
//! A game exclusively owns its memberships and event log; players are only
//! referenced by id. All transition rules live here as pure methods so they
//! can be tested without a narrator or store. The status progression is
//! linear and non-reversible: pending -> in-progress -> completed.

use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameId(pub Uuid);

impl GameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from game state transitions.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("operation not valid while game is {0:?}")]
    InvalidState(GameStatus),

    #[error("game is full ({max} players)")]
    CapacityExceeded { max: usize },

    #[error("at least 2 players are required to start, got {0}")]
    InsufficientPlayers(usize),

    #[error("player {0} is already registered")]
    AlreadyRegistered(PlayerId),

    #[error("player {0} is not in this game")]
    NotAMember(PlayerId),

    #[error("player {0} is already deceased")]
    AlreadyDeceased(PlayerId),
}

// ============================================================================
// Configuration
// ============================================================================

/// Narrative difficulty, passed through to event prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// How often viewers expect events; carried for the serving layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventFrequency {
    Low,
    #[default]
    Medium,
    High,
}

/// Per-game configuration, fixed at creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameConfig {
    pub max_players: usize,
    pub difficulty: Difficulty,
    pub event_frequency: EventFrequency,
}

impl GameConfig {
    pub fn new(max_players: usize) -> Self {
        Self {
            max_players,
            difficulty: Difficulty::default(),
            event_frequency: EventFrequency::default(),
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_event_frequency(mut self, frequency: EventFrequency) -> Self {
        self.event_frequency = frequency;
        self
    }
}

// ============================================================================
// Events and memberships
// ============================================================================

/// Category of a narrative event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Death,
    Alliance,
    Betrayal,
    Combat,
    Environment,
    #[serde(other)]
    Other,
}

/// One entry in a game's append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub day: u32,
    pub description: String,
    pub participants: Vec<PlayerId>,
    pub category: EventCategory,
    pub created_at: u64,
}

impl Event {
    pub fn new(
        day: u32,
        description: impl Into<String>,
        participants: Vec<PlayerId>,
        category: EventCategory,
    ) -> Self {
        Self {
            day,
            description: description.into(),
            participants,
            category,
            created_at: crate::unix_now(),
        }
    }
}

/// Whether a member is still in the running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeStatus {
    Alive,
    Deceased,
}

/// One player's participation in one game.
///
/// The player name is denormalized here so rosters can be turned into
/// prompts without loading every player aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub player_id: PlayerId,
    pub player_name: String,
    pub status: LifeStatus,
    #[serde(default)]
    pub cause_of_death: Option<String>,
    #[serde(default)]
    pub day_of_death: Option<u32>,
    pub kills: u32,
    #[serde(default)]
    pub alliances: HashSet<PlayerId>,
}

impl Membership {
    fn new(player_id: PlayerId, player_name: String) -> Self {
        Self {
            player_id,
            player_name,
            status: LifeStatus::Alive,
            cause_of_death: None,
            day_of_death: None,
            kills: 0,
            alliances: HashSet::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == LifeStatus::Alive
    }
}

// ============================================================================
// Game
// ============================================================================

/// Lifecycle status of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    Pending,
    InProgress,
    Completed,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        self == GameStatus::Completed
    }
}

/// A single game: roster, log, day counter, configuration, winner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub title: String,
    pub status: GameStatus,
    pub members: Vec<Membership>,
    pub events: Vec<Event>,
    pub current_day: u32,
    pub config: GameConfig,
    pub winner: Option<PlayerId>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Game {
    pub fn new(title: impl Into<String>, config: GameConfig) -> Self {
        let now = crate::unix_now();
        Self {
            id: GameId::new(),
            title: title.into(),
            status: GameStatus::Pending,
            members: Vec::new(),
            events: Vec::new(),
            current_day: 0,
            config,
            winner: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a player to the roster. Only legal while pending.
    pub fn add_member(
        &mut self,
        player_id: PlayerId,
        player_name: impl Into<String>,
    ) -> Result<(), GameError> {
        if self.status != GameStatus::Pending {
            return Err(GameError::InvalidState(self.status));
        }
        if self.members.len() >= self.config.max_players {
            return Err(GameError::CapacityExceeded {
                max: self.config.max_players,
            });
        }
        if self.member(player_id).is_some() {
            return Err(GameError::AlreadyRegistered(player_id));
        }
        self.members
            .push(Membership::new(player_id, player_name.into()));
        self.touch();
        Ok(())
    }

    /// Transition pending -> in-progress and open day 1.
    pub fn begin(&mut self) -> Result<(), GameError> {
        if self.status != GameStatus::Pending {
            return Err(GameError::InvalidState(self.status));
        }
        if self.members.len() < 2 {
            return Err(GameError::InsufficientPlayers(self.members.len()));
        }
        self.status = GameStatus::InProgress;
        self.current_day = 1;
        self.touch();
        Ok(())
    }

    /// Transition in-progress -> completed, recording the winner if any.
    pub fn complete(&mut self, winner: Option<PlayerId>) -> Result<(), GameError> {
        if self.status != GameStatus::InProgress {
            return Err(GameError::InvalidState(self.status));
        }
        self.status = GameStatus::Completed;
        self.winner = winner;
        self.touch();
        Ok(())
    }

    /// Append an event to the log. Only legal while in progress.
    pub fn record_event(&mut self, event: Event) -> Result<(), GameError> {
        if self.status != GameStatus::InProgress {
            return Err(GameError::InvalidState(self.status));
        }
        debug_assert!(
            self.events.last().map(|e| e.day <= event.day).unwrap_or(true),
            "event log day numbers must be non-decreasing"
        );
        self.events.push(event);
        self.touch();
        Ok(())
    }

    /// Mark a member deceased. Alive -> deceased happens at most once.
    pub fn mark_deceased(
        &mut self,
        player_id: PlayerId,
        cause: impl Into<String>,
        day: u32,
    ) -> Result<(), GameError> {
        let member = self
            .member_mut(player_id)
            .ok_or(GameError::NotAMember(player_id))?;
        if !member.is_alive() {
            return Err(GameError::AlreadyDeceased(player_id));
        }
        member.status = LifeStatus::Deceased;
        member.cause_of_death = Some(cause.into());
        member.day_of_death = Some(day);
        self.touch();
        Ok(())
    }

    /// Credit a kill to a member.
    pub fn record_kill(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        let member = self
            .member_mut(player_id)
            .ok_or(GameError::NotAMember(player_id))?;
        member.kills += 1;
        self.touch();
        Ok(())
    }

    /// Record mutual alliances between all given members.
    ///
    /// Unknown ids are ignored; the participant list has already been
    /// filtered against the roster by the narrator.
    pub fn form_alliances(&mut self, participants: &[PlayerId]) {
        for &a in participants {
            for &b in participants {
                if a != b {
                    if let Some(member) = self.member_mut(a) {
                        member.alliances.insert(b);
                    }
                }
            }
        }
        self.touch();
    }

    /// Advance the day counter by one.
    pub fn advance_day(&mut self) {
        self.current_day += 1;
        self.touch();
    }

    pub fn member(&self, player_id: PlayerId) -> Option<&Membership> {
        self.members.iter().find(|m| m.player_id == player_id)
    }

    fn member_mut(&mut self, player_id: PlayerId) -> Option<&mut Membership> {
        self.members.iter_mut().find(|m| m.player_id == player_id)
    }

    pub fn alive_members(&self) -> impl Iterator<Item = &Membership> {
        self.members.iter().filter(|m| m.is_alive())
    }

    pub fn alive_count(&self) -> usize {
        self.alive_members().count()
    }

    pub fn is_alive(&self, player_id: PlayerId) -> bool {
        self.member(player_id).map(|m| m.is_alive()).unwrap_or(false)
    }

    /// A game is over once at most one member remains alive.
    pub fn is_over(&self) -> bool {
        self.alive_count() <= 1
    }

    fn touch(&mut self) {
        self.updated_at = crate::unix_now();
    }
}
