//! Request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{AgentRun, RunStatus};
use crate::conversation::Message;
use crate::tools::{CredentialContext, CredentialFields, ToolDescriptor};

/// Credentials accepted either at the top level of a body or nested under
/// `credentials`; nested fields win.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestCredentials {
    #[serde(flatten)]
    pub top_level: CredentialFields,
    #[serde(default)]
    pub credentials: Option<CredentialFields>,
}

impl RequestCredentials {
    pub fn context(&self) -> CredentialContext {
        CredentialContext::from_request(self.top_level.clone(), self.credentials.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub credentials: RequestCredentials,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub messages: Vec<Message>,
    pub output: String,
    pub status: RunStatus,
    pub steps: usize,
}

impl From<AgentRun> for AgentResponse {
    fn from(run: AgentRun) -> Self {
        Self {
            messages: run.messages,
            output: run.output,
            status: run.status,
            steps: run.steps,
        }
    }
}

/// Single question with optional loose chat history.
#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    pub question: String,
    #[serde(default)]
    pub chat_history: Option<Vec<Value>>,
    #[serde(flatten)]
    pub credentials: RequestCredentials,
}

#[derive(Debug, Serialize)]
pub struct CrawlResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDescriptor>,
}

/// Direct tool execution, outside the agent loop.
#[derive(Debug, Deserialize)]
pub struct ToolCallBody {
    #[serde(default)]
    pub arguments: Value,
    #[serde(flatten)]
    pub credentials: RequestCredentials,
}

/// Page HTML captured by the browser extension.
#[derive(Debug, Deserialize)]
pub struct ValidatePageRequest {
    pub html: String,
}

#[derive(Debug, Serialize)]
pub struct ValidatePageResponse {
    pub is_safe: bool,
}

/// Convert loose `{role, content}` history entries into messages.
///
/// Only user and assistant turns survive; `bot` and `ai` count as assistant.
/// `speaker` and `message` are accepted in place of `role` and `content`.
pub fn history_messages(entries: &[Value]) -> Vec<Message> {
    entries
        .iter()
        .filter_map(|entry| {
            let role = entry
                .get("role")
                .or_else(|| entry.get("speaker"))
                .and_then(Value::as_str)?
                .trim()
                .to_lowercase();
            let content = entry
                .get("content")
                .or_else(|| entry.get("message"))
                .and_then(Value::as_str)?
                .trim();
            if content.is_empty() {
                return None;
            }
            match role.as_str() {
                "user" => Some(Message::user(content)),
                "assistant" | "bot" | "ai" => Some(Message::assistant(content)),
                _ => None,
            }
        })
        .collect()
}
