//! Error types for the agent service.

use thiserror::Error;

/// Library-level error type for agent operations.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conversation protocol violation: {0}")]
    Protocol(String),

    #[error("Duplicate tool name in registry: {0}")]
    DuplicateTool(String),

    #[error("Model invocation failed: {0}")]
    Model(String),

    #[error("{0}")]
    Tool(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AgentError {
    /// Whether the error was caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AgentError::InvalidInput(_) | AgentError::Protocol(_))
    }
}

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
