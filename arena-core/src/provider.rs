//! The generative text provider seam.
//!
//! The narrator never talks to a model API directly; it goes through this
//! trait so tests can substitute a scripted provider. The `openai` client
//! is the production implementation.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the underlying model call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("model call failed: {0}")]
    Call(String),

    #[error("model returned an empty response")]
    Empty,
}

/// A single prompt: system framing plus the user request.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.8,
            max_tokens: 500,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Request/response contract with a generative text model.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Send one prompt and return the raw model text.
    async fn complete_text(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

#[async_trait]
impl TextProvider for openai::OpenAi {
    async fn complete_text(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let request = openai::Request::new(vec![
            openai::Message::system(prompt.system.as_str()),
            openai::Message::user(prompt.user.as_str()),
        ])
        .with_temperature(prompt.temperature)
        .with_max_tokens(prompt.max_tokens);

        let response = self
            .complete(request)
            .await
            .map_err(|e| ProviderError::Call(e.to_string()))?;

        if response.content.trim().is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(response.content)
    }
}
