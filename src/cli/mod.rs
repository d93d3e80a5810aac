//! CLI module for the agent service.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Tool-calling LLM agent with HTTP, WebSocket and stdio transports.
///
/// The agent answers questions by calling web search, website, GitHub and
/// YouTube tools, plus Gmail, Calendar and attendance tools when the caller
/// supplies the matching credentials.
#[derive(Parser, Debug)]
#[command(name = "agentic-browser")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Credentials supplied on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Google OAuth access token enabling the Gmail and Calendar tools
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub google_token: Option<String>,

    /// JSON file holding a portal login response, enabling the attendance tool
    #[arg(long)]
    pub portal_session: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Start the HTTP and WebSocket server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Serve JSON-RPC 2.0 over stdin/stdout
    Rpc,

    /// Ask the agent a question in the terminal
    Ask {
        /// The question to ask
        question: String,

        #[command(flatten)]
        credentials: CredentialArgs,

        /// Override agent.max_steps for this run
        #[arg(long)]
        max_steps: Option<usize>,
    },

    /// List the tools a request with these credentials would see
    Tools {
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask_with_credentials() {
        let cli = Cli::try_parse_from([
            "agentic-browser",
            "-vv",
            "ask",
            "what is new?",
            "--google-token",
            "tok",
            "--max-steps",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Ask {
                question,
                credentials,
                max_steps,
            } => {
                assert_eq!(question, "what is new?");
                assert_eq!(credentials.google_token.as_deref(), Some("tok"));
                assert_eq!(max_steps, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["agentic-browser", "serve"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Serve {
                host: None,
                port: None
            }
        ));
    }
}
