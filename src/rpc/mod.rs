//! Stdio JSON-RPC 2.0 transport.
//!
//! One request per line on stdin, one response per line on stdout.
//! Methods: `initialize`, `tools/list`, `tools/call`, `agent/run`.

mod protocol;
mod server;

pub use server::RpcServer;
