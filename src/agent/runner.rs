//! Agent runner with tool calling loop.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AgentSettings;
use crate::conversation::{Conversation, Message, Role, ToolCallRequest};
use crate::error::{AgentError, Result};
use crate::model::ChatModel;
use crate::tools::{ToolExecutor, ToolRegistry, ToolResult};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    MaxStepsExceeded,
    Cancelled,
}

/// Progress signal emitted at each state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// About to ask the model for the next step.
    Planning { step: usize },
    /// Dispatching one tool call.
    ExecutingTool { step: usize, tool: String },
    /// The model produced a final answer.
    Validating { step: usize },
}

impl AgentEvent {
    pub fn stage(&self) -> String {
        match self {
            AgentEvent::Planning { .. } => "planning".to_string(),
            AgentEvent::ExecutingTool { tool, .. } => format!("executing_tool:{}", tool),
            AgentEvent::Validating { .. } => "validating".to_string(),
        }
    }

    pub fn step(&self) -> usize {
        match self {
            AgentEvent::Planning { step }
            | AgentEvent::ExecutingTool { step, .. }
            | AgentEvent::Validating { step } => *step,
        }
    }

    pub fn tool(&self) -> Option<&str> {
        match self {
            AgentEvent::ExecutingTool { tool, .. } => Some(tool),
            _ => None,
        }
    }
}

/// Result of one orchestration.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    /// Full conversation, including the injected system prompt.
    pub messages: Vec<Message>,
    /// Final answer text.
    pub output: String,
    pub status: RunStatus,
    /// Model calls made.
    pub steps: usize,
}

impl AgentRun {
    /// Tool calls paired with their results, in conversation order.
    pub fn tool_calls(&self) -> Vec<ToolCallRecord> {
        let mut records = Vec::new();
        for message in &self.messages {
            for call in &message.tool_calls {
                let result = self
                    .messages
                    .iter()
                    .rev()
                    .find(|m| {
                        m.role == Role::ToolResult && m.tool_call_id.as_deref() == Some(&call.id)
                    });
                records.push(ToolCallRecord {
                    name: call.tool_name.clone(),
                    arguments: call.arguments.to_string(),
                    ok: result.and_then(|m| m.ok).unwrap_or(false),
                    result: result.map(|m| m.content.clone()).unwrap_or_default(),
                });
            }
        }
        records
    }
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    pub ok: bool,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

/// Drives the model/tool state machine for one invocation at a time.
///
/// The agent holds only process-wide handles; registries and conversations
/// are passed per run and never shared.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    executor: ToolExecutor,
    max_steps: usize,
    system_prompt: String,
}

enum Dispatch {
    Execute,
    Replay(ToolResult),
}

impl Agent {
    /// Create a new agent from loop settings.
    pub fn new(model: Arc<dyn ChatModel>, settings: &AgentSettings) -> Self {
        Self {
            model,
            executor: ToolExecutor::new(settings.tool_timeout()),
            max_steps: settings.max_steps.max(1),
            system_prompt: settings.system_prompt.clone(),
        }
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Set maximum model calls per run.
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.executor = ToolExecutor::new(timeout);
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Run until the model answers without tool calls, the step ceiling is
    /// hit, or `cancel` fires.
    ///
    /// Tool failures never end the run; they are fed back to the model.
    /// Only invalid history and model failures return `Err`.
    pub async fn run(
        &self,
        registry: &ToolRegistry,
        history: Vec<Message>,
        cancel: &CancellationToken,
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<AgentRun> {
        if history.is_empty() {
            return Err(AgentError::InvalidInput(
                "at least one message is required".to_string(),
            ));
        }

        let mut seed = Vec::with_capacity(history.len() + 1);
        if history[0].role != Role::System && !self.system_prompt.is_empty() {
            seed.push(Message::system(self.system_prompt.clone()));
        }
        seed.extend(history);

        let mut conversation = Conversation::from_messages(seed)?;
        if !conversation.pending_calls().is_empty() {
            return Err(AgentError::Protocol(format!(
                "history ends with unanswered tool calls: {}",
                conversation.pending_calls().join(", ")
            )));
        }

        let catalog = registry.descriptors();
        let emit = |event: AgentEvent| {
            if let Some(tx) = events {
                let _ = tx.send(event);
            }
        };

        let mut steps = 0;
        let mut partial = String::new();

        loop {
            if cancel.is_cancelled() {
                return Ok(cancelled(conversation, steps));
            }

            if steps >= self.max_steps {
                warn!("Agent exceeded maximum steps ({})", self.max_steps);
                let mut output = format!(
                    "I could not complete the request within {} steps.",
                    self.max_steps
                );
                if !partial.is_empty() {
                    output.push_str("\n\nPartial answer:\n");
                    output.push_str(&partial);
                }
                conversation.append(Message::assistant(output.clone()))?;
                return Ok(AgentRun {
                    messages: conversation.into_messages(),
                    output,
                    status: RunStatus::MaxStepsExceeded,
                    steps,
                });
            }

            steps += 1;
            debug!("Agent step {}", steps);
            emit(AgentEvent::Planning { step: steps });

            let snapshot = conversation.snapshot();
            let turn = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(cancelled(conversation, steps)),
                turn = self.model.complete(&snapshot, &catalog) => turn?,
            };

            if turn.tool_calls.is_empty() {
                emit(AgentEvent::Validating { step: steps });
                conversation.append(Message::assistant(turn.content.clone()))?;
                info!("Agent finished after {} step(s)", steps);
                return Ok(AgentRun {
                    messages: conversation.into_messages(),
                    output: turn.content,
                    status: RunStatus::Completed,
                    steps,
                });
            }

            if !turn.content.trim().is_empty() {
                partial = turn.content.clone();
            }

            let calls = normalize_calls(turn.tool_calls);
            let plan: Vec<Dispatch> = calls
                .iter()
                .map(|call| match conversation.recorded_result(&call.id) {
                    Some(previous) => {
                        debug!("Replaying recorded result for call {}", call.id);
                        Dispatch::Replay(ToolResult {
                            ok: previous.ok.unwrap_or(true),
                            text: previous.content.clone(),
                        })
                    }
                    None => Dispatch::Execute,
                })
                .collect();

            conversation.append(Message::assistant_with_calls(turn.content, calls.clone()))?;

            let batch = calls.iter().zip(plan).map(|(call, dispatch)| {
                if matches!(dispatch, Dispatch::Execute) {
                    info!("Agent calling tool: {} ({})", call.tool_name, call.id);
                    emit(AgentEvent::ExecutingTool {
                        step: steps,
                        tool: call.tool_name.clone(),
                    });
                }
                async move {
                    match dispatch {
                        Dispatch::Replay(result) => result,
                        Dispatch::Execute => self.executor.execute_call(registry, call).await,
                    }
                }
            });

            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // Every call of the last assistant turn gets a result.
                    for call in &calls {
                        conversation.append(Message::tool_result(
                            &call.id,
                            &call.tool_name,
                            ToolResult::failure("Cancelled before the tool finished."),
                        ))?;
                    }
                    return Ok(cancelled(conversation, steps));
                }
                results = join_all(batch) => results,
            };

            for (call, result) in calls.iter().zip(results) {
                if !result.ok {
                    debug!("Tool {} failed: {}", call.tool_name, result.text);
                }
                conversation.append(Message::tool_result(&call.id, &call.tool_name, result))?;
            }
        }
    }
}

fn cancelled(conversation: Conversation, steps: usize) -> AgentRun {
    info!("Agent run cancelled after {} step(s)", steps);
    AgentRun {
        messages: conversation.into_messages(),
        output: "The request was cancelled.".to_string(),
        status: RunStatus::Cancelled,
        steps,
    }
}

/// Give every call a non-empty id; later duplicates within one turn are dropped.
fn normalize_calls(calls: Vec<ToolCallRequest>) -> Vec<ToolCallRequest> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.trim().is_empty() {
                call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
            }
            call
        })
        .filter(|call| {
            let fresh = seen.insert(call.id.clone());
            if !fresh {
                warn!("Dropping duplicate tool call id {}", call.id);
            }
            fresh
        })
        .collect()
}
