//! Ask command implementation.

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentEvent, RunStatus};
use crate::cli::preflight::{self, Operation};
use crate::cli::{CredentialArgs, Output};
use crate::config::Settings;
use crate::conversation::Message;
use crate::orchestrator::Orchestrator;

/// Run the agent once on `question` and print the answer.
pub async fn run_ask(
    question: &str,
    credentials: &CredentialArgs,
    max_steps: Option<usize>,
    mut settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'agentic-browser doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    if let Some(max) = max_steps {
        settings.agent.max_steps = max;
    }
    let credentials = credentials.context()?;
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Thinking...");
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AgentEvent>();
    let progress = spinner.clone();
    let forward = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let msg = match &event {
                AgentEvent::Planning { step } => format!("Thinking (step {})...", step),
                AgentEvent::ExecutingTool { tool, .. } => format!("Running {}...", tool),
                AgentEvent::Validating { .. } => "Finishing...".to_string(),
            };
            progress.set_message(msg);
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let outcome = orchestrator
        .run(vec![Message::user(question)], &credentials, &cancel, Some(&event_tx))
        .await;
    drop(event_tx);
    let _ = forward.await;
    spinner.finish_and_clear();

    let run = match outcome {
        Ok(run) => run,
        Err(e) => {
            Output::error(&format!("Agent failed: {}", e));
            return Err(e.into());
        }
    };

    println!("\n{}\n", run.output);

    let calls = run.tool_calls();
    if !calls.is_empty() {
        Output::header(&format!("Tool calls ({})", calls.len()));
        for call in &calls {
            Output::tool_call(call.ok, &call.to_string(), &call.result);
        }
        println!();
    }

    match run.status {
        RunStatus::Completed => Output::info(&format!("Completed in {} step(s)", run.steps)),
        RunStatus::MaxStepsExceeded => {
            Output::warning(&format!("Stopped after {} step(s) without a final answer", run.steps))
        }
        RunStatus::Cancelled => Output::warning("Cancelled"),
    }

    Ok(())
}
