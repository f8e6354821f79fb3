//! Player aggregate types.
//!
//! Players are shared across games: a game's roster references them by id,
//! and their cumulative statistics are folded in when a game completes.
//! All attribute and personality values are `Score`s, bounded to [1,10] at
//! construction time.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Scores
// ============================================================================

/// Error from constructing a `Score` outside its bounds.
#[derive(Debug, Error)]
#[error("score {0} is outside the valid range 1..=10")]
pub struct ScoreOutOfRange(pub u8);

/// An integer attribute or trait value, always within [1,10].
///
/// The bound is enforced at construction, so typed game state never needs
/// re-clamping. `clamp_from` exists for one purpose only: normalizing
/// untrusted generative output in the narrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Create a score, failing if the value is out of bounds.
    pub fn try_new(value: u8) -> Result<Self, ScoreOutOfRange> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ScoreOutOfRange(value))
        }
    }

    /// Round and clamp an arbitrary numeric value into bounds.
    ///
    /// Only for normalizing model output; validated state should use
    /// `try_new`.
    pub fn clamp_from(value: f64) -> Self {
        let rounded = if value.is_finite() {
            value.round()
        } else {
            f64::from(Self::MIN)
        };
        Self(rounded.clamp(f64::from(Self::MIN), f64::from(Self::MAX)) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = ScoreOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical and mental attributes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: Score,
    pub agility: Score,
    pub intelligence: Score,
    pub charisma: Score,
}

impl Attributes {
    pub fn new(strength: Score, agility: Score, intelligence: Score, charisma: Score) -> Self {
        Self {
            strength,
            agility,
            intelligence,
            charisma,
        }
    }
}

/// Personality traits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Personality {
    pub aggression: Score,
    pub loyalty: Score,
    pub strategy: Score,
}

impl Personality {
    pub fn new(aggression: Score, loyalty: Score, strategy: Score) -> Self {
        Self {
            aggression,
            loyalty,
            strategy,
        }
    }
}

// ============================================================================
// Players
// ============================================================================

/// How a player came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Generated,
    Custom,
}

/// A special ability descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialAbility {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cooldown: Option<u32>,
}

/// Cumulative cross-game statistics.
///
/// All counters are monotone non-decreasing; the survival-day average is
/// recomputed from the game count on every completed game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub games_played: u32,
    pub wins: u32,
    pub kills: u32,
    pub avg_survival_days: f64,
}

/// The outcome of one completed game, from a single player's perspective.
#[derive(Debug, Clone, Copy)]
pub struct GameOutcome {
    pub won: bool,
    pub kills: u32,
    pub survival_days: u32,
}

impl Statistics {
    /// Fold one completed game into the running totals.
    pub fn record_outcome(&mut self, outcome: GameOutcome) {
        let prior_total = self.avg_survival_days * f64::from(self.games_played);
        self.games_played += 1;
        if outcome.won {
            self.wins += 1;
        }
        self.kills += outcome.kills;
        self.avg_survival_days =
            (prior_total + f64::from(outcome.survival_days)) / f64::from(self.games_played);
    }

    /// Win rate as a percentage, 0.0 for players with no games.
    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.games_played) * 100.0
        }
    }
}

/// A player character, shared by reference across games.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub origin: Origin,
    pub description: String,
    pub attributes: Attributes,
    pub personality: Personality,
    #[serde(default)]
    pub backstory: Option<String>,
    #[serde(default)]
    pub special_ability: Option<SpecialAbility>,
    #[serde(default)]
    pub statistics: Statistics,
    pub created_at: u64,
}

impl Player {
    pub fn new(
        name: impl Into<String>,
        origin: Origin,
        description: impl Into<String>,
        attributes: Attributes,
        personality: Personality,
    ) -> Self {
        Self {
            id: PlayerId::new(),
            name: name.into(),
            origin,
            description: description.into(),
            attributes,
            personality,
            backstory: None,
            special_ability: None,
            statistics: Statistics::default(),
            created_at: crate::unix_now(),
        }
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = Some(backstory.into());
        self
    }

    pub fn with_special_ability(mut self, ability: SpecialAbility) -> Self {
        self.special_ability = Some(ability);
        self
    }
}
