//! HTTP and WebSocket server command.

use anyhow::Result;

use crate::api::{self, AppState};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> Result<()> {
    preflight::check(Operation::Serve, &settings)?;

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let model = settings.llm.model.clone();
    let max_steps = settings.agent.max_steps;

    let state = AppState::new(Orchestrator::new(settings)?);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Agentic Browser API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Model", &model);
    Output::kv("Max steps", &max_steps.to_string());
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Tools", "GET  /tools");
    Output::kv("Tool call", "POST /tools/{name}");
    Output::kv("Agent", "POST /agent (/api/genai/react)");
    Output::kv("Question", "POST /crawl (/api/genai/agent)");
    Output::kv("Page check", "POST /validate-website");
    Output::kv("WebSocket", "GET  /ws");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    api::serve(listener, state).await?;

    Ok(())
}
