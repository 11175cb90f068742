//! Strict parsing of the narrator's structured reply.
//!
//! The model's output is untrusted text. It must be a single JSON object with
//! exactly `storyText`, `choices` and `isEnding`; anything else is rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Most choices a reply may offer.
pub const MAX_CHOICES: usize = 3;

/// One step of the story as returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoryReply {
    pub story_text: String,
    pub choices: Vec<String>,
    pub is_ending: bool,
}

/// The generator's output could not be read as a [`StoryReply`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("reply is not valid story JSON: {0}")]
    Json(String),

    #[error("reply offers {0} choices, at most 3 allowed")]
    TooManyChoices(usize),

    #[error("reply has empty storyText")]
    EmptyStory,
}

impl StoryReply {
    /// Parse raw generator output.
    pub fn parse(raw: &str) -> Result<Self, ReplyError> {
        let body = strip_code_fence(raw.trim());
        let reply: StoryReply =
            serde_json::from_str(body).map_err(|e| ReplyError::Json(e.to_string()))?;
        reply.validate()?;
        Ok(reply)
    }

    fn validate(&self) -> Result<(), ReplyError> {
        if self.choices.len() > MAX_CHOICES {
            return Err(ReplyError::TooManyChoices(self.choices.len()));
        }
        if self.story_text.trim().is_empty() {
            return Err(ReplyError::EmptyStory);
        }
        Ok(())
    }
}

/// Remove one surrounding Markdown code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string ("json") up to the first newline
    match inner.find('\n') {
        Some(pos) => inner[pos + 1..].trim(),
        None => inner.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{"storyText":"You wake up...","choices":["Look around","Check pockets","Call out"],"isEnding":false}"#;

    #[test]
    fn test_parse_valid_reply() {
        let reply = StoryReply::parse(GOOD).unwrap();
        assert_eq!(reply.story_text, "You wake up...");
        assert_eq!(reply.choices.len(), 3);
        assert!(!reply.is_ending);
    }

    #[test]
    fn test_parse_fenced_reply() {
        let fenced = format!("```json\n{GOOD}\n```");
        assert_eq!(StoryReply::parse(&fenced).unwrap(), StoryReply::parse(GOOD).unwrap());

        let bare_fence = format!("  ```\n{GOOD}\n```  ");
        assert!(StoryReply::parse(&bare_fence).is_ok());
    }

    #[test]
    fn test_ending_with_no_choices() {
        let reply =
            StoryReply::parse(r#"{"storyText":"The end.","choices":[],"isEnding":true}"#).unwrap();
        assert!(reply.is_ending);
        assert!(reply.choices.is_empty());
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            StoryReply::parse("Once upon a time..."),
            Err(ReplyError::Json(_))
        ));
    }

    #[test]
    fn test_rejects_missing_field() {
        let raw = r#"{"storyText":"x","choices":[]}"#;
        assert!(matches!(StoryReply::parse(raw), Err(ReplyError::Json(_))));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let raw = r#"{"storyText":"x","choices":[],"isEnding":false,"mood":"grim"}"#;
        assert!(matches!(StoryReply::parse(raw), Err(ReplyError::Json(_))));
    }

    #[test]
    fn test_rejects_wrong_types() {
        let raw = r#"{"storyText":"x","choices":"go left","isEnding":"no"}"#;
        assert!(matches!(StoryReply::parse(raw), Err(ReplyError::Json(_))));
    }

    #[test]
    fn test_rejects_too_many_choices() {
        let raw = r#"{"storyText":"x","choices":["a","b","c","d"],"isEnding":false}"#;
        assert_eq!(StoryReply::parse(raw), Err(ReplyError::TooManyChoices(4)));
    }

    #[test]
    fn test_rejects_empty_story() {
        let raw = r#"{"storyText":"  ","choices":["a"],"isEnding":false}"#;
        assert_eq!(StoryReply::parse(raw), Err(ReplyError::EmptyStory));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(StoryReply::parse(GOOD).unwrap()).unwrap();
        assert_eq!(json["storyText"], "You wake up...");
        assert_eq!(json["isEnding"], false);
        assert_eq!(json["choices"][0], "Look around");
    }
}
