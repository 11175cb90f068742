//! The external story generator.
//!
//! The orchestrator only sees [`StoryGenerator`]; [`ClaudeGenerator`] is the
//! production implementation backed by the Anthropic Messages API.

use crate::session::{Role, Turn};
use async_trait::async_trait;
use claude::{Claude, Message, Request};
use log::debug;
use thiserror::Error;

/// Failures talking to the generator. All of them mean "no reply".
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator unreachable: {0}")]
    Unavailable(String),

    #[error("generator returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("generator misconfigured: {0}")]
    Config(String),

    #[error("generator returned no text")]
    EmptyResponse,
}

impl From<claude::Error> for GeneratorError {
    fn from(e: claude::Error) -> Self {
        match e {
            claude::Error::Api { status, message } => GeneratorError::Status { status, message },
            claude::Error::Network(msg) => GeneratorError::Unavailable(msg),
            claude::Error::Timeout => GeneratorError::Unavailable("request timed out".to_string()),
            claude::Error::Parse(msg) => {
                GeneratorError::Unavailable(format!("unreadable API response: {msg}"))
            }
            claude::Error::NoApiKey => GeneratorError::Config("API key not configured".to_string()),
            claude::Error::Config(msg) => GeneratorError::Config(msg),
        }
    }
}

/// Produces the next story passage from the whole conversation.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Return the raw model output for `turns`, instructed by `system`.
    async fn generate(&self, system: &str, turns: &[Turn]) -> Result<String, GeneratorError>;
}

/// Sampling settings for [`ClaudeGenerator`].
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Model override; the client's default when `None`.
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            temperature: Some(0.9),
        }
    }
}

/// [`StoryGenerator`] backed by Claude.
#[derive(Debug, Clone)]
pub struct ClaudeGenerator {
    client: Claude,
    config: GeneratorConfig,
}

impl ClaudeGenerator {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            config: GeneratorConfig::default(),
        }
    }

    /// Build from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, GeneratorError> {
        Ok(Self::new(Claude::from_env()?))
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    fn build_request(&self, system: &str, turns: &[Turn]) -> Request {
        let messages = turns
            .iter()
            .map(|turn| match turn.role {
                Role::User => Message::user(&turn.text),
                Role::Model => Message::assistant(&turn.text),
            })
            .collect();

        let mut request = Request::new(messages)
            .with_system(system)
            .with_max_tokens(self.config.max_tokens);

        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }

        if let Some(temp) = self.config.temperature {
            request = request.with_temperature(temp);
        }

        request
    }
}

#[async_trait]
impl StoryGenerator for ClaudeGenerator {
    async fn generate(&self, system: &str, turns: &[Turn]) -> Result<String, GeneratorError> {
        let request = self.build_request(system, turns);
        let response = self.client.complete(request).await?;

        debug!(
            "generator reply {} ({} in / {} out tokens, {:?})",
            response.id, response.usage.input_tokens, response.usage.output_tokens, response.stop_reason
        );

        let text = response.text();
        if text.trim().is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }
        Ok(text)
    }
}
