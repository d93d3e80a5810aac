//! Pre-flight checks before starting the agent.
//!
//! Validates that the model endpoint is usable before a run or a server
//! starts, instead of failing on the first request.

use crate::config::Settings;
use crate::error::{AgentError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// One-shot run in the terminal: needs model credentials.
    Ask,
    /// HTTP/WebSocket or stdio server: needs model credentials.
    Serve,
    /// Listing tools makes no outbound calls.
    ListTools,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ask | Operation::Serve => check_api_key(settings)?,
        Operation::ListTools => {}
    }
    Ok(())
}

/// A key is required unless a custom endpoint is configured (local models often need none).
fn check_api_key(settings: &Settings) -> Result<()> {
    let custom_endpoint = settings
        .llm
        .api_base
        .as_deref()
        .is_some_and(|b| !b.trim().is_empty());
    if custom_endpoint || settings.llm.resolved_api_key().is_some() {
        return Ok(());
    }
    Err(AgentError::Config(
        "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...' or llm.api_key in the config file".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_tools_has_no_requirements() {
        assert!(check(Operation::ListTools, &Settings::default()).is_ok());
    }

    #[test]
    fn test_configured_key_passes() {
        let mut settings = Settings::default();
        settings.llm.api_key = Some("sk-test".to_string());
        assert!(check(Operation::Ask, &settings).is_ok());
    }

    #[test]
    fn test_custom_endpoint_needs_no_key() {
        let mut settings = Settings::default();
        settings.llm.api_base = Some("http://localhost:11434/v1".to_string());
        assert!(check(Operation::Serve, &settings).is_ok());
    }
}
