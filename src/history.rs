//! Conversation history: the ordered log of completed turns.

use chrono::Local;
use serde::Serialize;
use uuid::Uuid;

/// Number of most recent entries supplied to the response service as context.
pub const CONTEXT_WINDOW: usize = 5;

/// How the user's side of a turn was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMethod {
    Voice,
}

/// One completed turn. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationEntry {
    id: Uuid,
    timestamp: String,
    user_text: String,
    assistant_text: String,
    method: InputMethod,
}

impl ConversationEntry {
    /// Create a spoken turn stamped with the current local time.
    pub fn voice(user_text: impl Into<String>, assistant_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            method: InputMethod::Voice,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    pub fn assistant_text(&self) -> &str {
        &self.assistant_text
    }

    pub fn method(&self) -> InputMethod {
        self.method
    }
}

/// Append-only conversation log. Only [`clear`](Self::clear) removes entries.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    entries: Vec<ConversationEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: ConversationEntry) {
        self.entries.push(entry);
    }

    /// The last `min(k, len)` entries, oldest first.
    pub fn recent_window(&self, k: usize) -> &[ConversationEntry] {
        let start = self.entries.len().saturating_sub(k);
        &self.entries[start..]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full ordered history, for display.
    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_of(n: usize) -> ConversationHistory {
        let mut history = ConversationHistory::new();
        for i in 0..n {
            history.append(ConversationEntry::voice(format!("q{i}"), format!("a{i}")));
        }
        history
    }

    #[test]
    fn test_append_preserves_order() {
        let history = history_of(3);
        let users: Vec<_> = history.entries().iter().map(|e| e.user_text()).collect();
        assert_eq!(users, vec!["q0", "q1", "q2"]);
        assert_eq!(history.len(), 3);
        assert!(!history.is_empty());
    }

    #[test]
    fn test_recent_window_bounds() {
        let history = history_of(8);
        let window = history.recent_window(CONTEXT_WINDOW);
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].user_text(), "q3");
        assert_eq!(window[4].user_text(), "q7");

        let small = history_of(2);
        assert_eq!(small.recent_window(CONTEXT_WINDOW).len(), 2);
        assert!(ConversationHistory::new().recent_window(5).is_empty());
        assert!(history.recent_window(0).is_empty());
    }

    #[test]
    fn test_recent_window_does_not_mutate() {
        let history = history_of(6);
        let before = history.entries().to_vec();
        let _ = history.recent_window(2);
        let _ = history.recent_window(10);
        assert_eq!(history.entries(), before.as_slice());
    }

    #[test]
    fn test_clear_empties() {
        let mut history = history_of(4);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }

    #[test]
    fn test_entry_fields() {
        let entry = ConversationEntry::voice("hello", "Hello! How can I help you?");
        assert_eq!(entry.method(), InputMethod::Voice);
        assert_eq!(entry.timestamp().len(), 8);
        assert_ne!(entry.id(), ConversationEntry::voice("a", "b").id());
    }
}
