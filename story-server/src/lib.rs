//! HTTP backend for an AI-narrated text adventure.
//!
//! Wires a [`story_core::StoryOrchestrator`] to an axum router. The binary in
//! `main.rs` adds configuration loading, logging and the listener.

pub mod config;
pub mod routes;

pub use config::Config;
pub use routes::{router, ApiError, AppState};

use anyhow::Result;
use std::sync::Arc;
use story_core::{ClaudeGenerator, StoryOrchestrator};

/// Build the orchestrator described by `config`, talking to Claude with `api_key`.
pub fn build_orchestrator(config: &Config, api_key: &str) -> Result<StoryOrchestrator> {
    let generator = ClaudeGenerator::new(config.client(api_key)?)
        .with_config(config.generator_config());

    Ok(
        StoryOrchestrator::new(Arc::new(config.store()), Arc::new(generator))
            .with_config(config.orchestrator_config()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_orchestrator_applies_story_settings() {
        let mut config = Config::default();
        config.story.max_exchanges = 8;
        config.story.opening_prompt = Some("Begin in a lighthouse.".to_string());

        let orchestrator = build_orchestrator(&config, "test-key").unwrap();
        assert_eq!(orchestrator.config().max_exchanges, Some(8));
        assert_eq!(orchestrator.config().opening_prompt, "Begin in a lighthouse.");
        assert_eq!(orchestrator.session_count(), 0);
    }

    #[test]
    fn test_build_orchestrator_requires_key() {
        assert!(build_orchestrator(&Config::default(), "").is_err());
    }
}
