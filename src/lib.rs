//! Agentic Browser - tool-calling LLM agent service
//!
//! Answers questions by letting a chat model call tools: web search, website
//! and GitHub readers, YouTube transcripts, and, when the caller supplies
//! credentials, Gmail, Google Calendar and a student-portal attendance lookup.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `conversation` - Messages and the append-only conversation log
//! - `model` - Chat model seam and the OpenAI-compatible adapter
//! - `tools` - Tool descriptors, per-request registries, the executor and built-in tools
//! - `agent` - The orchestration loop
//! - `guard` - Prompt-injection screening of page HTML
//! - `orchestrator` - Service facade shared by every transport
//! - `api` - HTTP and WebSocket transport
//! - `rpc` - Stdio JSON-RPC transport
//!
//! # Example
//!
//! ```rust,no_run
//! use agentic_browser::config::Settings;
//! use agentic_browser::conversation::Message;
//! use agentic_browser::orchestrator::Orchestrator;
//! use agentic_browser::tools::CredentialContext;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(Settings::load()?)?;
//!     let run = orchestrator
//!         .run(
//!             vec![Message::user("What changed in the latest Rust release?")],
//!             &CredentialContext::new(),
//!             &CancellationToken::new(),
//!             None,
//!         )
//!         .await?;
//!     println!("{}", run.output);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod guard;
pub mod model;
pub mod openai;
pub mod orchestrator;
pub mod rpc;
pub mod tools;

pub use error::{AgentError, Result};
