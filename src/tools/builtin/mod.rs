//! Concrete capabilities: web search, page/repo/video Q&A, Google APIs, attendance.

pub mod attendance;
pub mod calendar;
pub mod github;
pub mod gmail;
pub mod search;
pub mod vtt;
pub mod website;
pub mod youtube;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{FieldSpec, ToolDescriptor};
use crate::error::{AgentError, Result};

/// Arguments shared by the question-answering tools.
#[derive(Debug, Deserialize)]
pub(crate) struct QuestionArgs {
    pub url: String,
    pub question: String,
    #[serde(default)]
    pub chat_history: Option<Vec<Value>>,
}

/// Add the `url` / `question` / `chat_history` fields.
pub(crate) fn question_fields(descriptor: ToolDescriptor, url_help: &str, question_help: &str) -> ToolDescriptor {
    descriptor
        .field(FieldSpec::url("url", url_help).required())
        .field(FieldSpec::string("question", question_help).required().min_length(1))
        .field(FieldSpec::array(
            "chat_history",
            "Optional chat history as a list of {role, content} maps.",
        ))
}

/// One `role: content` line per entry.
pub(crate) fn format_chat_history(history: Option<&[Value]>) -> String {
    let Some(entries) = history else {
        return String::new();
    };

    entries
        .iter()
        .map(|entry| match entry {
            Value::Object(map) => {
                let role = first_text(map.get("role"), map.get("speaker")).unwrap_or("role");
                let content = first_text(map.get("content"), map.get("message")).unwrap_or("");
                format!("{}: {}", role, content)
            }
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_text<'a>(a: Option<&'a Value>, b: Option<&'a Value>) -> Option<&'a str> {
    a.and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| b.and_then(Value::as_str).filter(|s| !s.is_empty()))
}

/// Cut `text` to at most `max` characters, marking the cut with "...".
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

/// Turn a non-2xx response into a tool error carrying the upstream message.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    service: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("detail"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_chars(body.trim(), 200));

    Err(AgentError::Tool(if detail.is_empty() {
        format!("{} returned HTTP {}", service, status.as_u16())
    } else {
        format!("{} returned HTTP {}: {}", service, status.as_u16(), detail)
    }))
}

/// Descriptor field for a bounded `max_results` count.
pub(crate) fn max_results_field(default: i64, max: i64, help: &str) -> FieldSpec {
    FieldSpec::integer("max_results", help)
        .default_value(json!(default))
        .range(1, max)
}
