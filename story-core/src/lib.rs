//! Session-scoped story state for an AI narrator.
//!
//! This crate provides:
//! - A per-session transcript store with optional eviction
//! - Strict parsing of the narrator's JSON replies
//! - The story orchestrator that ties a session to the generator
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use story_core::{ClaudeGenerator, MemoryStore, SessionId, StoryOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = StoryOrchestrator::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(ClaudeGenerator::from_env()?),
//!     );
//!
//!     let id = SessionId::parse("my-session")?;
//!     let reply = orchestrator.start(&id).await?;
//!     println!("{}", reply.story_text);
//!
//!     let reply = orchestrator.continue_story(&id, &reply.choices[0]).await?;
//!     println!("{}", reply.story_text);
//!     Ok(())
//! }
//! ```

pub mod generator;
pub mod orchestrator;
pub mod prompts;
pub mod reply;
pub mod session;
pub mod store;
pub mod testing;

pub use generator::{ClaudeGenerator, GeneratorConfig, GeneratorError, StoryGenerator};
pub use orchestrator::{OrchestratorConfig, StoryError, StoryOrchestrator};
pub use reply::{ReplyError, StoryReply, MAX_CHOICES};
pub use session::{InvalidSessionId, Role, SessionId, SessionPhase, Transcript, Turn};
pub use store::{ConversationStore, MemoryStore};
pub use testing::ScriptedGenerator;
