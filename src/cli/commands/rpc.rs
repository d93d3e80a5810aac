//! Stdio JSON-RPC command implementation.

use anyhow::Result;
use std::sync::Arc;

use crate::cli::preflight::{self, Operation};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rpc::RpcServer;

/// Run the JSON-RPC server. Stdout carries protocol frames only.
pub async fn run_rpc(settings: Settings) -> Result<()> {
    preflight::check(Operation::Serve, &settings)?;
    let server = RpcServer::new(Arc::new(Orchestrator::new(settings)?));
    server.run().await?;
    Ok(())
}
