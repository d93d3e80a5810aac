//! Append-only conversation log.

use std::collections::{HashMap, HashSet};

use super::{Message, Role};
use crate::error::{AgentError, Result};

/// Ordered, append-only message log for one invocation.
///
/// Every tool result must answer a still-unresolved call of the most recent
/// assistant message. Appended messages are never mutated.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    /// Call ids of the latest assistant message that have no result yet.
    pending: Vec<String>,
    /// Call id -> index of the tool result that answered it.
    results: HashMap<String, usize>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a conversation by appending `messages` in order.
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Result<Self> {
        let mut conversation = Self::new();
        for message in messages {
            conversation.append(message)?;
        }
        Ok(conversation)
    }

    /// Append a message, enforcing tool-call correlation.
    pub fn append(&mut self, message: Message) -> Result<()> {
        match message.role {
            Role::ToolResult => {
                let id = message.tool_call_id.as_deref().ok_or_else(|| {
                    AgentError::Protocol("tool result is missing tool_call_id".to_string())
                })?;
                let position = self.pending.iter().position(|p| p == id).ok_or_else(|| {
                    AgentError::Protocol(format!(
                        "tool result '{}' does not match an unresolved call of the latest assistant message",
                        id
                    ))
                })?;
                self.pending.remove(position);
                self.results.insert(id.to_string(), self.messages.len());
            }
            Role::Assistant => {
                let mut seen = HashSet::new();
                for call in &message.tool_calls {
                    if call.id.is_empty() {
                        return Err(AgentError::Protocol(format!(
                            "tool call to '{}' has an empty id",
                            call.tool_name
                        )));
                    }
                    if !seen.insert(call.id.as_str()) {
                        return Err(AgentError::Protocol(format!(
                            "duplicate tool call id '{}' in one assistant message",
                            call.id
                        )));
                    }
                }
                self.pending = message.tool_calls.iter().map(|c| c.id.clone()).collect();
            }
            Role::System | Role::User => {}
        }

        self.messages.push(message);
        Ok(())
    }

    /// Immutable copy of the log, as sent to the model.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Unanswered call ids of the latest assistant message.
    pub fn pending_calls(&self) -> &[String] {
        &self.pending
    }

    /// The tool result previously recorded for `call_id`, if any.
    pub fn recorded_result(&self, call_id: &str) -> Option<&Message> {
        self.results.get(call_id).map(|&idx| &self.messages[idx])
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolCallRequest;
    use crate::tools::ToolResult;
    use serde_json::json;

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, "websearch", json!({"query": "x"}))
    }

    #[test]
    fn test_tool_result_must_match_pending_call() {
        let mut conv = Conversation::new();
        conv.append(Message::user("hi")).unwrap();
        conv.append(Message::assistant_with_calls("", vec![call("a"), call("b")]))
            .unwrap();

        assert!(conv
            .append(Message::tool_result("zzz", "websearch", ToolResult::success("r")))
            .is_err());

        conv.append(Message::tool_result("b", "websearch", ToolResult::success("r")))
            .unwrap();
        assert_eq!(conv.pending_calls(), &["a".to_string()]);

        // Already answered.
        assert!(conv
            .append(Message::tool_result("b", "websearch", ToolResult::success("again")))
            .is_err());
    }

    #[test]
    fn test_results_only_match_the_latest_assistant_message() {
        let mut conv = Conversation::new();
        conv.append(Message::assistant_with_calls("", vec![call("old")]))
            .unwrap();
        conv.append(Message::assistant_with_calls("", vec![call("new")]))
            .unwrap();

        assert!(conv
            .append(Message::tool_result("old", "websearch", ToolResult::success("r")))
            .is_err());
    }

    #[test]
    fn test_tool_result_without_assistant_rejected() {
        let mut conv = Conversation::new();
        conv.append(Message::user("hi")).unwrap();
        let err = conv
            .append(Message::tool_result("1", "websearch", ToolResult::success("r")))
            .unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_duplicate_or_empty_call_ids_rejected() {
        let mut conv = Conversation::new();
        assert!(conv
            .append(Message::assistant_with_calls("", vec![call("x"), call("x")]))
            .is_err());
        assert!(conv
            .append(Message::assistant_with_calls("", vec![call("")]))
            .is_err());
        assert!(conv.is_empty());
    }

    #[test]
    fn test_recorded_result_lookup() {
        let conv = Conversation::from_messages(vec![
            Message::user("q"),
            Message::assistant_with_calls("", vec![call("1")]),
            Message::tool_result("1", "websearch", ToolResult::success("found")),
        ])
        .unwrap();

        assert_eq!(conv.recorded_result("1").unwrap().content, "found");
        assert!(conv.recorded_result("2").is_none());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut conv = Conversation::new();
        conv.append(Message::user("one")).unwrap();
        let snapshot = conv.snapshot();
        conv.append(Message::assistant("two")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(conv.len(), 2);
    }
}
