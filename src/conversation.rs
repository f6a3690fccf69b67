//! Conversation history: the ordered turns replayed into every analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::prompt::escape_line_breaks;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person submitting messages
    User,
    /// The analyzer's reply
    Assistant,
}

impl Role {
    /// Every role, in wire order.
    pub const ALL: [Role; 2] = [Role::User, Role::Assistant];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker
    pub role: Role,
    /// What was said
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// `role: content`, as it appears in a transcript. Line breaks in the
    /// content are escaped so the turn stays on one line.
    pub fn to_transcript_line(&self) -> String {
        format!("{}: {}", self.role, escape_line_breaks(&self.content))
    }
}

/// Append-only sequence of turns, owned by the caller.
///
/// Turns are never edited or removed once pushed. Analysis borrows the
/// history immutably; appending needs `&mut`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Append a user message and the assistant's reply, in that order.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Turn::user(user));
        self.turns.push(Turn::assistant(assistant));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Every turn as a transcript line, joined by newlines.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(Turn::to_transcript_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<Turn> for ConversationHistory {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

impl Extend<Turn> for ConversationHistory {
    fn extend<I: IntoIterator<Item = Turn>>(&mut self, iter: I) {
        self.turns.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_value(Role::User).unwrap(), json!("user"));
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert!(serde_json::from_value::<Role>(json!("system")).is_err());
    }

    #[test]
    fn test_record_exchange_order() {
        let mut history = ConversationHistory::new();
        history.record_exchange("Where were you?", "Verdict: unclear");
        history.push(Turn::user("I was at work"));

        assert_eq!(history.len(), 3);
        assert_eq!(history.turns()[0], Turn::user("Where were you?"));
        assert_eq!(history.turns()[1], Turn::assistant("Verdict: unclear"));
        assert_eq!(history.last(), Some(&Turn::user("I was at work")));
    }

    #[test]
    fn test_transcript() {
        let history: ConversationHistory = vec![Turn::user("hi"), Turn::assistant("hello")]
            .into_iter()
            .collect();
        assert_eq!(history.transcript(), "user: hi\nassistant: hello");
        assert_eq!(ConversationHistory::new().transcript(), "");

        let multiline: ConversationHistory =
            vec![Turn::assistant("flagged\n\nVerdict: 🟨 Unclear / Mixed")]
                .into_iter()
                .collect();
        assert_eq!(
            multiline.transcript(),
            "assistant: flagged\\n\\nVerdict: 🟨 Unclear / Mixed"
        );
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let mut history = ConversationHistory::new();
        history.record_exchange("a", "b");

        let value = serde_json::to_value(&history).unwrap();
        assert_eq!(
            value,
            json!([
                {"role": "user", "content": "a"},
                {"role": "assistant", "content": "b"}
            ])
        );

        let back: ConversationHistory = serde_json::from_value(value).unwrap();
        assert_eq!(back, history);
    }

    #[test]
    fn test_iteration() {
        let mut history = ConversationHistory::new();
        history.extend([Turn::user("1"), Turn::assistant("2")]);

        let roles: Vec<Role> = history.iter().map(|t| t.role).collect();
        assert_eq!(roles, Role::ALL.to_vec());

        let mut count = 0;
        for _ in &history {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
