//! Server configuration.
//!
//! Settings come from an optional TOML file, then environment overrides, then
//! command line flags. Every field has a default, so an empty file (or no file)
//! is a valid configuration. The API key is never read from the file; it comes
//! from `ANTHROPIC_API_KEY` only.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [generator]
//! model = "claude-sonnet-4-20250514"
//! max_tokens = 1024
//! temperature = 0.9
//! timeout_secs = 60
//!
//! [sessions]
//! max_sessions = 10000     # 0 = unlimited
//! idle_timeout_secs = 3600 # 0 = never expire
//!
//! [story]
//! max_exchanges = 0        # 0 = leave the ending to the model
//! ```

use anyhow::{bail, Context, Result};
use claude::Claude;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use story_core::{GeneratorConfig, MemoryStore, OrchestratorConfig};
use tokio::fs;

/// Default config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "story.toml";

/// Environment variable overriding `server.bind`.
pub const ENV_BIND: &str = "STORY_BIND";

/// Environment variable overriding `generator.model`.
pub const ENV_MODEL: &str = "STORY_MODEL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub generator: GeneratorSettings,
    pub sessions: SessionSettings,
    pub story: StorySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorSettings {
    /// Model name; the client default when unset.
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Alternative API root, e.g. a proxy.
    pub base_url: Option<String>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            temperature: Some(0.9),
            timeout_secs: 60,
            connect_timeout_secs: 10,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    pub max_sessions: usize,
    pub idle_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            idle_timeout_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorySettings {
    pub max_exchanges: usize,
    pub system_prompt: Option<String>,
    pub opening_prompt: Option<String>,
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Load configuration from a TOML file.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Load the file if it exists, otherwise use defaults.
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let exists = fs::try_exists(path.as_ref())
            .await
            .with_context(|| format!("failed to check {}", path.as_ref().display()))?;
        if exists {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.trim().is_empty()) {
            self.server.bind = bind;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            self.generator.model = Some(model);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.bind.trim().is_empty() {
            bail!("server.bind must not be empty");
        }
        if self.generator.max_tokens == 0 {
            bail!("generator.max_tokens must be greater than 0");
        }
        if let Some(t) = self.generator.temperature {
            if !(0.0..=1.0).contains(&t) {
                bail!("generator.temperature must be between 0 and 1, got {t}");
            }
        }
        if self.generator.timeout_secs == 0 || self.generator.connect_timeout_secs == 0 {
            bail!("generator timeouts must be greater than 0");
        }
        Ok(())
    }

    /// Session store with the configured limits.
    pub fn store(&self) -> MemoryStore {
        let mut store = MemoryStore::new();
        if self.sessions.max_sessions > 0 {
            store = store.with_max_sessions(self.sessions.max_sessions);
        }
        if self.sessions.idle_timeout_secs > 0 {
            store = store.with_idle_timeout(Duration::from_secs(self.sessions.idle_timeout_secs));
        }
        store
    }

    /// Claude client for `api_key` with the configured endpoint and timeouts.
    pub fn client(&self, api_key: &str) -> Result<Claude> {
        let mut client = Claude::with_timeouts(
            api_key,
            Duration::from_secs(self.generator.timeout_secs),
            Duration::from_secs(self.generator.connect_timeout_secs),
        )?;
        if let Some(ref base_url) = self.generator.base_url {
            client = client.with_base_url(base_url);
        }
        Ok(client)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            model: self.generator.model.clone(),
            max_tokens: self.generator.max_tokens,
            temperature: self.generator.temperature,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut config = OrchestratorConfig::default();
        if let Some(ref prompt) = self.story.system_prompt {
            config = config.with_system_prompt(prompt);
        }
        if let Some(ref prompt) = self.story.opening_prompt {
            config = config.with_opening_prompt(prompt);
        }
        if self.story.max_exchanges > 0 {
            config = config.with_max_exchanges(self.story.max_exchanges);
        }
        config
    }
}
