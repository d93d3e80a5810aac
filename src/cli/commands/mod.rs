//! CLI command implementations.

mod ask;
mod config;
mod doctor;
mod rpc;
mod serve;
mod tools;

pub use ask::run_ask;
pub use config::run_config;
pub use doctor::run_doctor;
pub use rpc::run_rpc;
pub use serve::run_serve;
pub use tools::run_tools;

use anyhow::{Context, Result};

use crate::cli::CredentialArgs;
use crate::tools::CredentialContext;

impl CredentialArgs {
    /// Build the credential context, reading the portal session file if given.
    pub fn context(&self) -> Result<CredentialContext> {
        let mut context = CredentialContext::new();
        if let Some(token) = self.google_token.as_deref() {
            context = context.with_google_token(token);
        }
        if let Some(path) = &self.portal_session {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read portal session {}", path.display()))?;
            let session: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            context = context.with_portal_session(session);
        }
        Ok(context)
    }
}
