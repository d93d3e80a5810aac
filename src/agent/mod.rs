//! Orchestration loop.
//!
//! Alternates model calls and tool dispatch over a per-invocation
//! [`ToolRegistry`](crate::tools::ToolRegistry) until the model answers,
//! the step ceiling is reached, or the caller cancels.

mod runner;

pub use runner::{Agent, AgentEvent, AgentRun, RunStatus, ToolCallRecord};
