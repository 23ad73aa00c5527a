//! Prompt construction from free-form text or chat transcripts.

use serde::{Deserialize, Serialize};

/// Typed chat roles — prevents invalid role strings at the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Flatten a request's input into a single prompt string.
///
/// A free-form prompt passes through untouched. A chat transcript becomes
/// role-tagged blocks with a trailing assistant cue, which is what text
/// completion engines expect.
pub fn build_prompt(prompt: Option<&str>, messages: &[ChatTurn]) -> String {
    if let Some(text) = prompt {
        if !text.is_empty() {
            return text.to_string();
        }
    }
    let mut out = String::new();
    for turn in messages {
        out.push_str(turn.role.as_str());
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out.push_str("assistant: ");
    out
}
