//! AI narrator: the adapter between the engine and the text model.
//!
//! The model produces untrusted free text. This module is the only place
//! that defends the engine's typed invariants against it: stat values are
//! normalized into [1,10], event participants are rewritten from display
//! names to stable player ids, and anything unparseable is rejected before
//! the engine sees it.

use crate::game::{Difficulty, EventCategory};
use crate::player::{Attributes, Personality, PlayerId, Score, SpecialAbility};
use crate::provider::{Prompt, ProviderError, TextProvider};
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

const SYSTEM_PROMPT: &str =
    "You are a creative AI generating humorous but tasteful content for a survival-game parody. \
     Keep it entertaining but not offensive.";

/// Errors from the narrator.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("generation failed: {0}")]
    Generation(#[from] ProviderError),

    #[error("could not parse model output: {0}")]
    Parse(String),

    #[error("duplicate player name in roster: {0}")]
    DuplicateName(String),
}

/// Tuning knobs for model calls.
#[derive(Debug, Clone)]
pub struct NarratorConfig {
    /// Temperature for character and death-scene generation.
    pub temperature: f32,

    /// Temperature for event generation (slightly wilder).
    pub event_temperature: f32,

    /// Max tokens for character and event payloads.
    pub max_tokens: usize,

    /// Max tokens for death scenes.
    pub death_scene_max_tokens: usize,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            event_temperature: 0.9,
            max_tokens: 500,
            death_scene_max_tokens: 300,
        }
    }
}

/// A roster entry as the narrator sees it: stable id plus the display name
/// the model is allowed to use.
#[derive(Debug, Clone)]
pub struct NamedPlayer {
    pub id: PlayerId,
    pub name: String,
}

/// What kind of event is being requested.
#[derive(Debug, Clone, Copy)]
pub enum EventKind {
    GameStart,
    DayEvent { alive: usize },
}

/// Context for an event request.
#[derive(Debug, Clone, Copy)]
pub struct EventContext {
    pub kind: EventKind,
    pub difficulty: Difficulty,
}

/// A normalized, identifier-safe character payload.
#[derive(Debug, Clone)]
pub struct GeneratedCharacter {
    pub name: String,
    pub description: String,
    pub attributes: Attributes,
    pub personality: Personality,
    pub backstory: Option<String>,
    pub special_ability: Option<SpecialAbility>,
}

/// A validated narrative event with participants resolved to player ids.
#[derive(Debug, Clone)]
pub struct NarrativeEvent {
    pub description: String,
    pub category: EventCategory,
    pub participants: Vec<PlayerId>,
    /// Short cause phrase for death events, when the model supplied one.
    pub cause: Option<String>,
}

/// The narrator.
pub struct Narrator {
    provider: Arc<dyn TextProvider>,
    config: NarratorConfig,
}

impl Narrator {
    /// Create a narrator over the given text provider.
    pub fn new(provider: Arc<dyn TextProvider>) -> Self {
        Self {
            provider,
            config: NarratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: NarratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Generate a new character.
    ///
    /// Every attribute and trait in the result has been normalized: missing
    /// values are filled with a uniform random integer in [1,10], and all
    /// values are rounded and clamped into bounds. This runs on every
    /// generated character, not just malformed ones.
    pub async fn generate_character(&self) -> Result<GeneratedCharacter, NarratorError> {
        let prompt = Prompt::new(SYSTEM_PROMPT, character_prompt())
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let text = self.provider.complete_text(&prompt).await?;
        let cleaned = strip_code_fences(&text);
        let raw: RawCharacter = serde_json::from_str(cleaned)
            .map_err(|e| NarratorError::Parse(format!("character payload: {e}")))?;

        Ok(raw.normalize(&mut rand::thread_rng()))
    }

    /// Generate one event for the given roster and day.
    ///
    /// The model is queried with player names (it knows nothing of internal
    /// ids); every name in its response is rewritten to the matching id.
    /// Names absent from the roster are silently dropped. Names are matched
    /// case-insensitively, and must be unique within one call.
    pub async fn generate_event(
        &self,
        roster: &[NamedPlayer],
        day: u32,
        context: &EventContext,
    ) -> Result<NarrativeEvent, NarratorError> {
        let lookup = build_name_lookup(roster)?;

        let prompt = Prompt::new(SYSTEM_PROMPT, event_prompt(roster, day, context))
            .with_temperature(self.config.event_temperature)
            .with_max_tokens(self.config.max_tokens);

        let text = self.provider.complete_text(&prompt).await?;
        let cleaned = strip_code_fences(&text);
        let raw: RawEvent = serde_json::from_str(cleaned)
            .map_err(|e| NarratorError::Parse(format!("event payload: {e}")))?;

        let mut participants = Vec::new();
        for name in &raw.affected_players {
            match lookup.get(name.to_lowercase().as_str()) {
                Some(id) if !participants.contains(id) => participants.push(*id),
                Some(_) => {}
                None => log::debug!("dropping unknown participant name {name:?}"),
            }
        }
        if participants.is_empty() && !raw.affected_players.is_empty() {
            log::warn!(
                "event on day {day} resolved no participants out of {}",
                raw.affected_players.len()
            );
        }

        Ok(NarrativeEvent {
            description: raw.description,
            category: raw.category,
            participants,
            cause: raw.cause.filter(|c| !c.trim().is_empty()),
        })
    }

    /// Generate a free-text death scene. No structured parsing.
    pub async fn generate_death_scene(
        &self,
        player_name: &str,
        cause: &str,
    ) -> Result<String, NarratorError> {
        let prompt = Prompt::new(SYSTEM_PROMPT, death_scene_prompt(player_name, cause))
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.death_scene_max_tokens);

        let text = self.provider.complete_text(&prompt).await?;
        Ok(text.trim().to_string())
    }
}

// ============================================================================
// Prompt construction
// ============================================================================

fn character_prompt() -> String {
    "Generate a humorous character for a survival-game parody. Respond with a single JSON \
     object and nothing else, with these keys:\n\
     - \"name\": string\n\
     - \"description\": brief string\n\
     - \"attributes\": object with integer values 1-10 for \"strength\", \"agility\", \
     \"intelligence\", \"charisma\"\n\
     - \"personality\": object with integer values 1-10 for \"aggression\", \"loyalty\", \
     \"strategy\"\n\
     - \"special_ability\": object with \"name\" and \"description\"\n\
     - \"backstory\": funny string"
        .to_string()
}

fn event_prompt(roster: &[NamedPlayer], day: u32, context: &EventContext) -> String {
    let names: Vec<&str> = roster.iter().map(|p| p.name.as_str()).collect();
    let mut prompt = format!(
        "Generate a humorous event for day {day} of a survival-game parody. \
         Players involved: {}.\n",
        names.join(", ")
    );

    match context.kind {
        EventKind::GameStart => {
            prompt.push_str("This is the opening event as the game begins.\n");
        }
        EventKind::DayEvent { alive } => {
            prompt.push_str(&format!("{alive} players remain alive.\n"));
        }
    }
    prompt.push_str(&format!(
        "Difficulty is {}. Create an entertaining scenario that could involve alliances, \
         betrayals, or combat.\n",
        context.difficulty.name()
    ));
    prompt.push_str(
        "Respond with a single JSON object and nothing else, with these keys:\n\
         - \"description\": string\n\
         - \"type\": one of \"death\", \"alliance\", \"betrayal\", \"combat\", \
         \"environment\", \"other\"\n\
         - \"affected_players\": array of player names, using only the names listed above\n\
         - \"cause\": short phrase, only for death events",
    );
    prompt
}

fn death_scene_prompt(player_name: &str, cause: &str) -> String {
    format!(
        "Generate a dramatic and humorous death scene for {player_name} in a survival-game \
         parody.\nCause: {cause}\nInclude their final moments in an entertaining but not \
         grotesque way. Respond with the scene text only."
    )
}

// ============================================================================
// Response cleaning and parsing
// ============================================================================

/// Strip surrounding markdown code fences, if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    log::debug!("stripping code fences from model output");
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Build the name -> id table, lowercased for case-insensitive matching.
fn build_name_lookup(roster: &[NamedPlayer]) -> Result<HashMap<String, PlayerId>, NarratorError> {
    let mut lookup = HashMap::with_capacity(roster.len());
    for player in roster {
        if lookup
            .insert(player.name.to_lowercase(), player.id)
            .is_some()
        {
            return Err(NarratorError::DuplicateName(player.name.clone()));
        }
    }
    Ok(lookup)
}

/// Character payload as the model emits it. Stats are optional floats so a
/// sloppy model response still parses; normalization fixes them up.
#[derive(Debug, Deserialize)]
struct RawCharacter {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    attributes: RawAttributes,
    #[serde(default)]
    personality: RawPersonality,
    #[serde(default)]
    backstory: Option<String>,
    #[serde(default, alias = "specialAbility")]
    special_ability: Option<RawAbility>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAttributes {
    #[serde(default)]
    strength: Option<f64>,
    #[serde(default)]
    agility: Option<f64>,
    #[serde(default)]
    intelligence: Option<f64>,
    #[serde(default)]
    charisma: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPersonality {
    #[serde(default)]
    aggression: Option<f64>,
    #[serde(default)]
    loyalty: Option<f64>,
    #[serde(default)]
    strategy: Option<f64>,
}

/// Models sometimes emit the ability as a bare string instead of an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAbility {
    Full {
        #[serde(default)]
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        cooldown: Option<u32>,
    },
    Text(String),
}

impl RawCharacter {
    fn normalize(self, rng: &mut impl Rng) -> GeneratedCharacter {
        let mut fill = |value: Option<f64>| {
            Score::clamp_from(value.unwrap_or_else(|| f64::from(rng.gen_range(1..=10))))
        };

        let attributes = Attributes::new(
            fill(self.attributes.strength),
            fill(self.attributes.agility),
            fill(self.attributes.intelligence),
            fill(self.attributes.charisma),
        );
        let personality = Personality::new(
            fill(self.personality.aggression),
            fill(self.personality.loyalty),
            fill(self.personality.strategy),
        );

        GeneratedCharacter {
            name: self.name,
            description: self.description,
            attributes,
            personality,
            backstory: self.backstory.filter(|b| !b.trim().is_empty()),
            special_ability: self.special_ability.map(RawAbility::into_ability),
        }
    }
}

impl RawAbility {
    fn into_ability(self) -> SpecialAbility {
        match self {
            RawAbility::Full {
                name,
                description,
                cooldown,
            } => SpecialAbility {
                name,
                description,
                cooldown,
            },
            RawAbility::Text(name) => SpecialAbility {
                name,
                description: String::new(),
                cooldown: None,
            },
        }
    }
}

/// Event payload as the model emits it, keyed by player names.
#[derive(Debug, Deserialize)]
struct RawEvent {
    description: String,
    #[serde(rename = "type", alias = "category")]
    category: EventCategory,
    #[serde(default, alias = "participants")]
    affected_players: Vec<String>,
    #[serde(default)]
    cause: Option<String>,
}
