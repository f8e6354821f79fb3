//! Testing utilities.
//!
//! `ScriptedProvider` stands in for the text model: it returns queued raw
//! responses in order, so engine and narrator behavior is deterministic and
//! no API calls are made. Payload builders produce the JSON shapes the
//! narrator expects from the model.

use crate::engine::GameEngine;
use crate::narrator::Narrator;
use crate::player::{Attributes, Origin, Personality, Player, Score};
use crate::provider::{Prompt, ProviderError, TextProvider};
use crate::store::MemoryStore;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A text provider that replays scripted responses.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw text response.
    pub fn push_text(&self, text: impl Into<String>) {
        self.responses
            .lock()
            .expect("script lock poisoned")
            .push_back(Ok(text.into()));
    }

    /// Queue a provider failure.
    pub fn push_error(&self, error: ProviderError) {
        self.responses
            .lock()
            .expect("script lock poisoned")
            .push_back(Err(error));
    }

    /// Number of responses left in the script.
    pub fn remaining(&self) -> usize {
        self.responses.lock().expect("script lock poisoned").len()
    }
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    async fn complete_text(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
        self.responses
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::Call(
                    "no scripted response left".to_string(),
                ))
            })
    }
}

/// An engine over a memory store and a scripted provider.
pub fn scripted_engine() -> (GameEngine, Arc<ScriptedProvider>) {
    let provider = Arc::new(ScriptedProvider::new());
    let narrator = Narrator::new(provider.clone());
    let engine = GameEngine::new(narrator, Arc::new(MemoryStore::new()));
    (engine, provider)
}

/// A custom player with mid-range stats.
pub fn sample_player(name: &str) -> Player {
    let five = Score::try_new(5).expect("5 is in bounds");
    Player::new(
        name,
        Origin::Custom,
        format!("{name}, a perfectly average contestant"),
        Attributes::new(five, five, five, five),
        Personality::new(five, five, five),
    )
}

// ============================================================================
// Model payload builders
// ============================================================================

/// A complete, valid character payload.
pub fn character_json(name: &str) -> String {
    format!(
        r#"{{
            "name": "{name}",
            "description": "A contestant of dubious renown",
            "attributes": {{"strength": 4, "agility": 7, "intelligence": 6, "charisma": 5}},
            "personality": {{"aggression": 3, "loyalty": 8, "strategy": 6}},
            "special_ability": {{"name": "Dramatic Timing", "description": "Always arrives late"}},
            "backstory": "Once won a regional staring contest."
        }}"#
    )
}

/// An event payload of the given category naming the given players.
pub fn event_json(category: &str, names: &[&str]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("\"{n}\"")).collect();
    format!(
        r#"{{
            "description": "Something {category}-shaped happens.",
            "type": "{category}",
            "affected_players": [{}]
        }}"#,
        quoted.join(", ")
    )
}

/// A death event naming the given players, with a cause.
pub fn death_event_json(names: &[&str]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("\"{n}\"")).collect();
    format!(
        r#"{{
            "description": "Disaster strikes at the salad bar.",
            "type": "death",
            "affected_players": [{}],
            "cause": "aggressive vinaigrette"
        }}"#,
        quoted.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_provider_replays_in_order() {
        let provider = ScriptedProvider::new();
        provider.push_text("one");
        provider.push_text("two");

        let prompt = Prompt::new("sys", "user");
        assert_eq!(provider.complete_text(&prompt).await.unwrap(), "one");
        assert_eq!(provider.complete_text(&prompt).await.unwrap(), "two");

        // Exhausted scripts fail like a dead provider.
        assert!(provider.complete_text(&prompt).await.is_err());
    }

    #[test]
    fn test_payload_builders_are_valid_json() {
        for payload in [
            character_json("Pat"),
            event_json("combat", &["Pat", "Sam"]),
            death_event_json(&["Sam"]),
        ] {
            serde_json::from_str::<serde_json::Value>(&payload).unwrap();
        }
    }
}
