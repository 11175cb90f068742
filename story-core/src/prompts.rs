//! Fixed narrator instructions.

/// System instruction sent with every generator call. Never stored as a turn.
pub const SYSTEM_PROMPT: &str = include_str!("prompts/narrator.txt");

/// Synthetic first user turn that opens every story.
pub const OPENING_PROMPT: &str = "Start a new adventure.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_describes_reply_shape() {
        for field in ["storyText", "choices", "isEnding"] {
            assert!(SYSTEM_PROMPT.contains(field), "missing {field}");
        }
    }
}
