//! Conversation history windowing.
//!
//! Callers send prior turns with each query. Only a bounded window of them
//! reaches the prompt, each cut to a fixed number of characters.

use serde::{Deserialize, Serialize};

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TurnRole {
    User,
    /// Everything that is not `"user"`
    Assistant,
}

impl From<String> for TurnRole {
    fn from(value: String) -> Self {
        if value == "user" {
            Self::User
        } else {
            Self::Assistant
        }
    }
}

impl From<TurnRole> for String {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => "user".to_string(),
            TurnRole::Assistant => "assistant".to_string(),
        }
    }
}

impl TurnRole {
    /// Label used in the prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One prior exchange supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(rename = "type", default = "default_role")]
    pub role: TurnRole,
    #[serde(default)]
    pub content: String,
}

fn default_role() -> TurnRole {
    TurnRole::Assistant
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Formats the tail of a conversation into a prompt block.
#[derive(Debug, Clone, Copy)]
pub struct ConversationContext {
    max_turns: usize,
    max_chars_per_turn: usize,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            max_turns: 4,
            max_chars_per_turn: 150,
        }
    }
}

impl ConversationContext {
    pub fn new(max_turns: usize, max_chars_per_turn: usize) -> Self {
        Self {
            max_turns,
            max_chars_per_turn,
        }
    }

    /// Render the last `max_turns` turns, oldest first, one `Role: content`
    /// line each. Content is cut to `max_chars_per_turn` characters.
    ///
    /// Empty history yields an empty string.
    pub fn build(&self, history: &[ConversationTurn]) -> String {
        let start = history.len().saturating_sub(self.max_turns);

        history[start..]
            .iter()
            .map(|turn| {
                let content: String = turn.content.chars().take(self.max_chars_per_turn).collect();
                format!("{}: {content}\n", turn.role.label())
            })
            .collect()
    }
}
