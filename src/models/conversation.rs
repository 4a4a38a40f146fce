use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in a chat exchange.
///
/// Serializes as `{"role": "...", "content": "..."}`, the message shape both
/// supported chat APIs accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only conversation history.
///
/// Every `with_*` method consumes the conversation and returns it with one
/// more turn, so history is threaded by value through a classification and
/// never shared between items.
///
/// # Examples
///
/// ```
/// use taxon::{Conversation, Role};
///
/// let conversation = Conversation::new()
///     .with_system("You label content.")
///     .with_user("Summarize this.")
///     .with_assistant("It is about flooding.");
///
/// assert_eq!(conversation.len(), 3);
/// assert_eq!(conversation.turns()[2].role, Role::Assistant);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    #[must_use]
    pub fn with_system(self, content: impl Into<String>) -> Self {
        self.with_turn(Turn::new(Role::System, content))
    }

    #[must_use]
    pub fn with_user(self, content: impl Into<String>) -> Self {
        self.with_turn(Turn::new(Role::User, content))
    }

    #[must_use]
    pub fn with_assistant(self, content: impl Into<String>) -> Self {
        self.with_turn(Turn::new(Role::Assistant, content))
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_serializes_as_chat_message() {
        let json = serde_json::to_value(Turn::new(Role::User, "hello")).unwrap();

        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn cloned_history_diverges_independently() {
        let base = Conversation::new().with_user("first");
        let branch = base.clone().with_assistant("reply");

        assert_eq!(base.len(), 1);
        assert_eq!(branch.len(), 2);
    }

    #[test]
    fn role_display_matches_wire_name() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(
            serde_json::to_string(&Role::System).unwrap(),
            r#""system""#
        );
    }
}
