//! Chat model seam.
//!
//! The agent loop and the question-answering tools only see [`ChatModel`];
//! [`OpenAiModel`] talks to any OpenAI-compatible endpoint.

mod openai;
#[cfg(test)]
pub mod scripted;

pub use openai::OpenAiModel;

use async_trait::async_trait;

use crate::conversation::{Message, ToolCallRequest};
use crate::error::{AgentError, Result};
use crate::tools::ToolDescriptor;

/// One assistant turn as returned by the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantTurn {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }
}

/// A stateless chat model: full history in, one assistant turn out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<AssistantTurn>;

    /// Model name for logs and diagnostics.
    fn name(&self) -> &str;
}

/// Single-prompt completion without tools.
pub async fn answer(model: &dyn ChatModel, prompt: String) -> Result<String> {
    let turn = model.complete(&[Message::user(prompt)], &[]).await?;
    if turn.content.trim().is_empty() {
        return Err(AgentError::Model("model returned an empty answer".to_string()));
    }
    Ok(turn.content)
}
