//! HTTP handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::dto::{
    history_messages, AgentRequest, AgentResponse, CrawlRequest, CrawlResponse, ToolCallBody,
    ToolsResponse, ValidatePageRequest, ValidatePageResponse,
};
use super::error::ApiError;
use super::AppState;
use crate::conversation::Message;
use crate::tools::{CredentialContext, ToolResult};

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Tools available to a request without credentials.
pub async fn tools(State(state): State<AppState>) -> Result<Json<ToolsResponse>, ApiError> {
    let tools = state.orchestrator.tools(&CredentialContext::new())?;
    Ok(Json(ToolsResponse { tools }))
}

/// Full-transparency endpoint: message list in, message list out.
pub async fn agent(
    State(state): State<AppState>,
    payload: Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Json<AgentResponse>, ApiError> {
    let Json(request) = payload?;
    if request.messages.is_empty() {
        return Err(ApiError::bad_request("messages must not be empty"));
    }

    let credentials = request.credentials.context();
    info!("POST /agent with {} message(s)", request.messages.len());

    let run = state
        .orchestrator
        .run(request.messages, &credentials, &CancellationToken::new(), None)
        .await?;
    Ok(Json(run.into()))
}

/// Single-question endpoint returning only the answer text.
pub async fn crawl(
    State(state): State<AppState>,
    payload: Result<Json<CrawlRequest>, JsonRejection>,
) -> Result<Json<CrawlResponse>, ApiError> {
    let Json(request) = payload?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let mut history = request
        .chat_history
        .as_deref()
        .map(history_messages)
        .unwrap_or_default();
    history.push(Message::user(question));

    let credentials = request.credentials.context();
    let run = state
        .orchestrator
        .run(history, &credentials, &CancellationToken::new(), None)
        .await?;
    Ok(Json(CrawlResponse { answer: run.output }))
}

/// Run one tool directly. Tool failures are `ok: false` bodies, not HTTP errors.
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<ToolCallBody>, JsonRejection>,
) -> Result<Json<ToolResult>, ApiError> {
    let Json(request) = payload?;
    let credentials = request.credentials.context();
    if let Some(reason) = state.orchestrator.unreachable_tool(&name, &credentials)? {
        return Err(ApiError::not_found(reason));
    }

    info!("POST /tools/{}", name);
    let result = state
        .orchestrator
        .call_tool(&name, request.arguments, &credentials)
        .await?;
    Ok(Json(result))
}

/// Screen page HTML for prompt injection.
pub async fn validate_website(
    State(state): State<AppState>,
    payload: Result<Json<ValidatePageRequest>, JsonRejection>,
) -> Result<Json<ValidatePageResponse>, ApiError> {
    let Json(request) = payload?;
    let is_safe = state.orchestrator.check_page(&request.html).await?;
    Ok(Json(ValidatePageResponse { is_safe }))
}
