//! Testing utilities.
//!
//! [`ScriptedGenerator`] stands in for the real model: it returns queued
//! outputs in order and records every call, so orchestrator behavior can be
//! checked without network access.

use crate::generator::{GeneratorError, StoryGenerator};
use crate::reply::StoryReply;
use crate::session::{Role, Turn};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// One queued generator outcome.
#[derive(Debug)]
enum Scripted {
    Raw(String),
    Fail(GeneratorError),
}

/// A generator call as the scripted generator saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system: String,
    pub turns: Vec<Turn>,
}

/// A [`StoryGenerator`] that plays back a script.
///
/// Once the script runs out it echoes the last user turn back as a
/// well-formed, non-ending reply.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a well-formed reply.
    pub fn then_reply(self, story: impl Into<String>, choices: &[&str], is_ending: bool) -> Self {
        let reply = StoryReply {
            story_text: story.into(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
            is_ending,
        };
        let raw = serde_json::to_string(&reply).unwrap_or_default();
        self.then_raw(raw)
    }

    /// Queue raw model output, well-formed or not.
    pub fn then_raw(self, raw: impl Into<String>) -> Self {
        self.push(Scripted::Raw(raw.into()));
        self
    }

    /// Queue a generator failure.
    pub fn then_fail(self, error: GeneratorError) -> Self {
        self.push(Scripted::Fail(error));
        self
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Outputs still queued.
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, item: Scripted) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(item);
    }

    /// Deterministic reply derived from the latest user turn.
    pub fn echo(turns: &[Turn]) -> StoryReply {
        let last = turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
            .unwrap_or_default();
        StoryReply {
            story_text: format!("You chose: {last}"),
            choices: vec!["Continue".to_string()],
            is_ending: false,
        }
    }
}

#[async_trait]
impl StoryGenerator for ScriptedGenerator {
    async fn generate(&self, system: &str, turns: &[Turn]) -> Result<String, GeneratorError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                system: system.to_string(),
                turns: turns.to_vec(),
            });

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(Scripted::Raw(raw)) => Ok(raw),
            Some(Scripted::Fail(error)) => Err(error),
            None => serde_json::to_string(&Self::echo(turns))
                .map_err(|e| GeneratorError::Unavailable(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plays_script_in_order() {
        let gen = ScriptedGenerator::new()
            .then_reply("First", &["a"], false)
            .then_raw("garbage")
            .then_fail(GeneratorError::EmptyResponse);

        let turns = [Turn::user("go")];
        let first = gen.generate("sys", &turns).await.unwrap();
        assert_eq!(StoryReply::parse(&first).unwrap().story_text, "First");
        assert_eq!(gen.generate("sys", &turns).await.unwrap(), "garbage");
        assert!(gen.generate("sys", &turns).await.is_err());
        assert_eq!(gen.remaining(), 0);
        assert_eq!(gen.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_echoes_when_script_is_empty() {
        let gen = ScriptedGenerator::new();
        let turns = [Turn::user("Open the door")];

        let raw = gen.generate("sys", &turns).await.unwrap();
        let reply = StoryReply::parse(&raw).unwrap();

        assert_eq!(reply.story_text, "You chose: Open the door");
        assert!(!reply.is_ending);
    }
}
