//! StoryOrchestrator - turns start/continue requests into story replies.
//!
//! Per request: copy the transcript out of the store, append the user turn,
//! ask the generator, parse its reply, append the model turn and write the
//! transcript back once. If the generator fails or its reply does not parse,
//! nothing is written.

use crate::generator::{GeneratorError, StoryGenerator};
use crate::prompts::{OPENING_PROMPT, SYSTEM_PROMPT};
use crate::reply::{ReplyError, StoryReply};
use crate::session::{SessionId, SessionPhase, Transcript, Turn};
use crate::store::ConversationStore;
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("story generator unavailable: {0}")]
    UpstreamUnavailable(#[from] GeneratorError),

    #[error("story generator sent a malformed reply: {0}")]
    MalformedReply(#[from] ReplyError),
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Instruction sent with every call.
    pub system_prompt: String,

    /// Synthetic user turn that opens each story.
    pub opening_prompt: String,

    /// Force an ending once this many exchanges have happened.
    /// `None` leaves termination entirely to the generator.
    pub max_exchanges: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            opening_prompt: OPENING_PROMPT.to_string(),
            max_exchanges: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_opening_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.opening_prompt = prompt.into();
        self
    }

    /// Cap the number of exchanges; `0` leaves the cap off.
    pub fn with_max_exchanges(mut self, max: usize) -> Self {
        self.max_exchanges = (max > 0).then_some(max);
        self
    }
}

/// Drives the per-session story protocol.
pub struct StoryOrchestrator {
    store: Arc<dyn ConversationStore>,
    generator: Arc<dyn StoryGenerator>,
    config: OrchestratorConfig,
}

impl StoryOrchestrator {
    pub fn new(store: Arc<dyn ConversationStore>, generator: Arc<dyn StoryGenerator>) -> Self {
        Self {
            store,
            generator,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Begin (or restart) the story for `id` with a fresh transcript.
    pub async fn start(&self, id: &SessionId) -> Result<StoryReply, StoryError> {
        let mut transcript = Transcript::new();
        transcript.push(Turn::user(&self.config.opening_prompt));

        info!("session {id}: starting story");
        self.exchange(id, transcript).await
    }

    /// Continue the story for `id` with the player's chosen text.
    ///
    /// An ended story is not blocked; the exchange is appended like any other.
    /// Call [`start`](Self::start) to reset.
    pub async fn continue_story(
        &self,
        id: &SessionId,
        prompt: &str,
    ) -> Result<StoryReply, StoryError> {
        if prompt.trim().is_empty() {
            return Err(StoryError::InvalidRequest("prompt must not be empty".to_string()));
        }

        let mut transcript = self.store.get(id);
        if transcript.is_ended() {
            info!("session {id}: continuing after the story ended");
        }
        transcript.push(Turn::user(prompt));

        info!("session {id}: exchange {}", transcript.exchanges());
        self.exchange(id, transcript).await
    }

    /// Current phase of the session's story.
    pub fn phase(&self, id: &SessionId) -> SessionPhase {
        self.store.get(id).phase()
    }

    /// Snapshot of the session's transcript.
    pub fn transcript(&self, id: &SessionId) -> Transcript {
        self.store.get(id)
    }

    /// Forget a session entirely. Returns whether it existed.
    pub fn end_session(&self, id: &SessionId) -> bool {
        let removed = self.store.remove(id);
        if removed {
            info!("session {id}: removed");
        }
        removed
    }

    /// Number of sessions currently held.
    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Call the generator with `transcript` (whose last turn is the user's)
    /// and store the result on success.
    async fn exchange(
        &self,
        id: &SessionId,
        mut transcript: Transcript,
    ) -> Result<StoryReply, StoryError> {
        let raw = self
            .generator
            .generate(&self.config.system_prompt, transcript.turns())
            .await
            .inspect_err(|e| warn!("session {id}: generator failed: {e}"))?;

        let mut reply =
            StoryReply::parse(&raw).inspect_err(|e| warn!("session {id}: {e}"))?;

        if let Some(max) = self.config.max_exchanges {
            if !reply.is_ending && transcript.exchanges() >= max {
                info!("session {id}: exchange limit {max} reached, ending story");
                reply.is_ending = true;
                reply.choices.clear();
            }
        }

        transcript.push(Turn::model(&reply.story_text));
        transcript.set_ended(reply.is_ending);
        self.store.put(id.clone(), transcript);

        if reply.is_ending {
            info!("session {id}: story ended");
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::ScriptedGenerator;

    fn sid(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    fn setup(generator: ScriptedGenerator) -> (StoryOrchestrator, Arc<ScriptedGenerator>) {
        let generator = Arc::new(generator);
        let orchestrator = StoryOrchestrator::new(Arc::new(MemoryStore::new()), generator.clone());
        (orchestrator, generator)
    }

    #[tokio::test]
    async fn test_start_sends_opening_turn_and_system_prompt() {
        let (orch, gen) = setup(ScriptedGenerator::new().then_reply("Dawn.", &["Rise"], false));

        orch.start(&sid("s")).await.unwrap();

        let calls = gen.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system, SYSTEM_PROMPT);
        assert_eq!(calls[0].turns, vec![Turn::user(OPENING_PROMPT)]);
    }

    #[tokio::test]
    async fn test_start_resets_existing_story() {
        let (orch, _) = setup(
            ScriptedGenerator::new()
                .then_reply("One", &["a"], false)
                .then_reply("Two", &["b"], false)
                .then_reply("Fresh", &["c"], false),
        );
        let id = sid("s");
        orch.start(&id).await.unwrap();
        orch.continue_story(&id, "a").await.unwrap();
        assert_eq!(orch.transcript(&id).len(), 4);

        orch.start(&id).await.unwrap();
        let transcript = orch.transcript(&id);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.turns()[1].text, "Fresh");
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_before_any_call() {
        let (orch, gen) = setup(ScriptedGenerator::new());

        let err = orch.continue_story(&sid("s"), "   ").await.unwrap_err();

        assert!(matches!(err, StoryError::InvalidRequest(_)));
        assert!(gen.calls().is_empty());
        assert_eq!(orch.session_count(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_transcript_unchanged() {
        let (orch, _) = setup(
            ScriptedGenerator::new()
                .then_reply("Dawn.", &["Rise"], false)
                .then_fail(GeneratorError::Unavailable("timeout".to_string())),
        );
        let id = sid("s");
        orch.start(&id).await.unwrap();

        let err = orch.continue_story(&id, "Rise").await.unwrap_err();

        assert!(matches!(err, StoryError::UpstreamUnavailable(_)));
        assert_eq!(orch.transcript(&id).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_start_stores_nothing() {
        let (orch, _) = setup(ScriptedGenerator::new().then_raw("not json"));
        let id = sid("s");

        let err = orch.start(&id).await.unwrap_err();

        assert!(matches!(err, StoryError::MalformedReply(_)));
        assert_eq!(orch.phase(&id), SessionPhase::NotStarted);
        assert_eq!(orch.session_count(), 0);
    }

    #[tokio::test]
    async fn test_exchange_cap_forces_ending() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .then_reply("One", &["a"], false)
                .then_reply("Two", &["b", "c"], false),
        );
        let orch = StoryOrchestrator::new(Arc::new(MemoryStore::new()), generator)
            .with_config(OrchestratorConfig::default().with_max_exchanges(2));
        let id = sid("s");

        let first = orch.start(&id).await.unwrap();
        assert!(!first.is_ending);

        let second = orch.continue_story(&id, "a").await.unwrap();
        assert!(second.is_ending);
        assert!(second.choices.is_empty());
        assert_eq!(second.story_text, "Two");
        assert_eq!(orch.phase(&id), SessionPhase::Ended);
    }

    #[tokio::test]
    async fn test_no_cap_by_default() {
        let mut script = ScriptedGenerator::new();
        for n in 0..25 {
            script = script.then_reply(format!("Part {n}"), &["on"], false);
        }
        let (orch, _) = setup(script);
        let id = sid("s");

        orch.start(&id).await.unwrap();
        for _ in 0..24 {
            let reply = orch.continue_story(&id, "on").await.unwrap();
            assert!(!reply.is_ending);
        }
        assert_eq!(orch.phase(&id), SessionPhase::InProgress);
    }

    #[tokio::test]
    async fn test_end_session() {
        let (orch, _) = setup(ScriptedGenerator::new().then_reply("Dawn.", &[], false));
        let id = sid("s");
        orch.start(&id).await.unwrap();

        assert!(orch.end_session(&id));
        assert!(!orch.end_session(&id));
        assert_eq!(orch.phase(&id), SessionPhase::NotStarted);
    }

    #[tokio::test]
    async fn test_zero_exchange_cap_is_disabled() {
        let generator = Arc::new(ScriptedGenerator::new().then_reply("One", &["a"], false));
        let orch = StoryOrchestrator::new(Arc::new(MemoryStore::new()), generator)
            .with_config(OrchestratorConfig::default().with_max_exchanges(0));

        assert_eq!(orch.config().max_exchanges, None);
        let reply = orch.start(&sid("s")).await.unwrap();
        assert!(!reply.is_ending);
        assert_eq!(reply.choices, vec!["a".to_string()]);
    }

    #[test]
    fn test_config_builder() {
        let config = OrchestratorConfig::default()
            .with_system_prompt("be brief")
            .with_opening_prompt("go")
            .with_max_exchanges(5);

        assert_eq!(config.system_prompt, "be brief");
        assert_eq!(config.opening_prompt, "go");
        assert_eq!(config.max_exchanges, Some(5));
    }
}
