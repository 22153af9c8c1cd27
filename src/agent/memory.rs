//! Rolling conversation memory for the agent.

use serde::{Deserialize, Serialize};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelToolCall {
    /// Provider-assigned id linking the call to its result.
    pub id: String,
    pub name: String,
    /// Raw JSON arguments.
    pub arguments: String,
}

/// One remembered message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryEntry {
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default)]
        tool_calls: Vec<ModelToolCall>,
    },
    ToolResult {
        call_id: String,
        content: String,
    },
}

impl MemoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        MemoryEntry::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        MemoryEntry::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    fn is_user(&self) -> bool {
        matches!(self, MemoryEntry::User { .. })
    }
}

/// Ordered prior turns supplied to the model on every call.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    entries: Vec<MemoryEntry>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: MemoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Position to roll back to if the current exchange fails.
    pub fn checkpoint(&self) -> usize {
        self.entries.len()
    }

    pub fn rollback(&mut self, checkpoint: usize) {
        self.entries.truncate(checkpoint);
    }

    /// Drop the oldest exchanges until at most `max_entries` remain.
    ///
    /// Cuts only at user messages so a tool call is never separated from
    /// its result. The newest exchange is always kept whole.
    pub fn trim(&mut self, max_entries: usize) {
        if self.entries.len() <= max_entries {
            return;
        }
        let overflow = self.entries.len() - max_entries;
        let cut = self
            .entries
            .iter()
            .enumerate()
            .skip(overflow)
            .find(|(_, e)| e.is_user())
            .map(|(i, _)| i)
            .or_else(|| self.entries.iter().rposition(MemoryEntry::is_user))
            .unwrap_or(0);
        self.entries.drain(..cut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(memory: &mut ConversationMemory, n: usize, with_tool: bool) {
        memory.push(MemoryEntry::user(format!("question {}", n)));
        if with_tool {
            memory.push(MemoryEntry::Assistant {
                content: None,
                tool_calls: vec![ModelToolCall {
                    id: format!("call_{}", n),
                    name: "get_product_info".to_string(),
                    arguments: "{}".to_string(),
                }],
            });
            memory.push(MemoryEntry::ToolResult {
                call_id: format!("call_{}", n),
                content: "result".to_string(),
            });
        }
        memory.push(MemoryEntry::assistant(format!("answer {}", n)));
    }

    #[test]
    fn test_rollback_restores_checkpoint() {
        let mut memory = ConversationMemory::new();
        exchange(&mut memory, 1, false);
        let checkpoint = memory.checkpoint();
        exchange(&mut memory, 2, true);
        memory.rollback(checkpoint);
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.entries()[1], MemoryEntry::assistant("answer 1"));
    }

    #[test]
    fn test_trim_cuts_at_user_messages() {
        let mut memory = ConversationMemory::new();
        for n in 0..5 {
            exchange(&mut memory, n, n % 2 == 0);
        }
        memory.trim(6);
        assert!(memory.len() <= 6);
        assert!(memory.entries()[0].is_user());
        assert!(!matches!(memory.entries()[0], MemoryEntry::ToolResult { .. }));
    }

    #[test]
    fn test_trim_keeps_latest_exchange_whole() {
        let mut memory = ConversationMemory::new();
        exchange(&mut memory, 1, false);
        exchange(&mut memory, 2, true);
        memory.trim(2);
        assert_eq!(memory.len(), 4);
        assert_eq!(memory.entries()[0], MemoryEntry::user("question 2"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut memory = ConversationMemory::new();
        memory.clear();
        assert!(memory.is_empty());
        exchange(&mut memory, 1, false);
        memory.clear();
        memory.clear();
        assert!(memory.is_empty());
    }
}
