//! Service facade shared by every transport.
//!
//! Built once at startup from [`Settings`]; owns the long-lived handles
//! (HTTP pool, chat model, toolbox, agent) and turns one decoded request
//! into one agent run or one direct tool call.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::agent::{Agent, AgentEvent, AgentRun};
use crate::config::{Prompts, Settings};
use crate::conversation::{Message, ToolCallRequest};
use crate::error::Result;
use crate::guard;
use crate::model::{ChatModel, OpenAiModel};
use crate::tools::{CredentialContext, ToolDescriptor, ToolExecutor, ToolResult, Toolbox};

/// The main entry point for running the agent.
pub struct Orchestrator {
    toolbox: Toolbox,
    agent: Agent,
    executor: ToolExecutor,
}

impl Orchestrator {
    /// Create an orchestrator talking to the configured OpenAI-compatible model.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiModel::new(&settings.llm)?);
        info!("Using model {}", model.name());

        std::fs::create_dir_all(settings.temp_dir())?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("agentic-browser/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_parts(http, model, settings, prompts))
    }

    /// Assemble from explicit parts (tests and embedders).
    pub fn with_parts(
        http: reqwest::Client,
        model: Arc<dyn ChatModel>,
        settings: Settings,
        prompts: Prompts,
    ) -> Self {
        let agent = Agent::new(Arc::clone(&model), &settings.agent);
        let executor = ToolExecutor::new(settings.agent.tool_timeout());
        let toolbox = Toolbox::new(http, model, Arc::new(settings), Arc::new(prompts));
        Self {
            toolbox,
            agent,
            executor,
        }
    }

    /// Replace the toolbox (tests and embedders).
    pub fn with_toolbox(mut self, toolbox: Toolbox) -> Self {
        self.toolbox = toolbox;
        self
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = agent;
        self
    }

    pub fn settings(&self) -> &Settings {
        self.toolbox.settings()
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Tools a request with these credentials would see, in catalog order.
    pub fn tools(&self, credentials: &CredentialContext) -> Result<Vec<ToolDescriptor>> {
        Ok(self.toolbox.build_registry(credentials)?.descriptors())
    }

    /// Run the agent over `history` with a registry built for `credentials`.
    #[instrument(skip_all, fields(messages = history.len(), credentials = ?credentials))]
    pub async fn run(
        &self,
        history: Vec<Message>,
        credentials: &CredentialContext,
        cancel: &CancellationToken,
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<AgentRun> {
        let registry = self.toolbox.build_registry(credentials)?;
        self.agent.run(&registry, history, cancel, events).await
    }

    /// Why `name` is out of reach for these credentials, or `None` if it is callable.
    pub fn unreachable_tool(&self, name: &str, credentials: &CredentialContext) -> Result<Option<String>> {
        let registry = self.toolbox.build_registry(credentials)?;
        Ok(registry
            .get(name)
            .is_none()
            .then(|| registry.unknown_tool_message(name)))
    }

    /// Execute one tool directly, outside the loop.
    #[instrument(skip(self, arguments, credentials))]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
        credentials: &CredentialContext,
    ) -> Result<ToolResult> {
        let registry = self.toolbox.build_registry(credentials)?;
        let call = ToolCallRequest::new(format!("direct_{}", uuid::Uuid::new_v4().simple()), name, arguments);
        Ok(self.executor.execute_call(&registry, &call).await)
    }

    /// Screen page HTML for prompt injection. `true` means safe.
    pub async fn check_page(&self, html: &str) -> Result<bool> {
        guard::check_page(
            self.toolbox.model().as_ref(),
            self.toolbox.prompts(),
            html,
            self.settings().website.max_chars,
        )
        .await
    }
}
