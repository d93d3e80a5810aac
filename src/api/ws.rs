//! WebSocket transport: one agent run at a time per socket, with progress events.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dto::{history_messages, RequestCredentials};
use super::AppState;
use crate::agent::{AgentEvent, RunStatus};
use crate::conversation::Message;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientFrame {
    ExecuteAgent(ExecuteAgent),
    Stop,
}

#[derive(Debug, Deserialize)]
struct ExecuteAgent {
    goal: String,
    #[serde(default)]
    chat_history: Option<Vec<Value>>,
    #[serde(flatten)]
    credentials: RequestCredentials,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ServerFrame {
    Progress {
        stage: String,
        step: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
    },
    Completed {
        result: String,
        steps_taken: usize,
    },
    Cancelled {
        steps_taken: usize,
    },
    Error {
        error: String,
    },
}

impl ServerFrame {
    fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            error: message.into(),
        }
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, ServerFrame::Progress { .. })
    }
}

impl From<&AgentEvent> for ServerFrame {
    fn from(event: &AgentEvent) -> Self {
        ServerFrame::Progress {
            stage: event.stage(),
            step: event.step(),
            tool: event.tool().map(str::to_string),
        }
    }
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket upgrade requested");
    ws.on_upgrade(move |socket: WebSocket| async move {
        let (sender, receiver) = socket.split();
        drive(state, sender, receiver).await;
    })
}

async fn send_frame<S>(sink: &mut S, frame: &ServerFrame) -> bool
where
    S: Sink<WsMessage> + Unpin,
{
    let payload = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialise frame: {}", e);
            return true;
        }
    };
    sink.send(WsMessage::Text(payload.into())).await.is_ok()
}

/// Pump one socket until the client goes away.
async fn drive<S, R, E>(state: AppState, mut sink: S, mut stream: R)
where
    S: Sink<WsMessage> + Unpin,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: std::fmt::Display,
{
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerFrame>();
    let mut active: Option<CancellationToken> = None;

    loop {
        tokio::select! {
            Some(frame) = out_rx.recv() => {
                if frame.is_terminal() {
                    active = None;
                }
                if !send_frame(&mut sink, &frame).await {
                    break;
                }
            }
            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("WebSocket closed by client");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                };

                let frame: ClientFrame = match serde_json::from_str(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        if !send_frame(&mut sink, &ServerFrame::error(format!("invalid frame: {}", e))).await {
                            break;
                        }
                        continue;
                    }
                };

                match frame {
                    ClientFrame::Stop => match &active {
                        Some(cancel) => {
                            debug!("Stop requested");
                            cancel.cancel();
                        }
                        None => {
                            if !send_frame(&mut sink, &ServerFrame::error("no run in progress")).await {
                                break;
                            }
                        }
                    },
                    ClientFrame::ExecuteAgent(request) => {
                        if active.is_some() {
                            if !send_frame(&mut sink, &ServerFrame::error("a run is already in progress")).await {
                                break;
                            }
                            continue;
                        }
                        if request.goal.trim().is_empty() {
                            if !send_frame(&mut sink, &ServerFrame::error("goal must not be empty")).await {
                                break;
                            }
                            continue;
                        }
                        let cancel = CancellationToken::new();
                        active = Some(cancel.clone());
                        tokio::spawn(execute(state.clone(), request, cancel, out_tx.clone()));
                    }
                }
            }
        }
    }

    if let Some(cancel) = active {
        cancel.cancel();
    }
}

/// Run one goal, forwarding progress and finishing with exactly one terminal frame.
async fn execute(
    state: AppState,
    request: ExecuteAgent,
    cancel: CancellationToken,
    out: mpsc::UnboundedSender<ServerFrame>,
) {
    let mut history = request
        .chat_history
        .as_deref()
        .map(history_messages)
        .unwrap_or_default();
    history.push(Message::user(request.goal.trim()));
    let credentials = request.credentials.context();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AgentEvent>();
    let progress_out = out.clone();
    let forward = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let _ = progress_out.send(ServerFrame::from(&event));
        }
    });

    let outcome = state
        .orchestrator
        .run(history, &credentials, &cancel, Some(&event_tx))
        .await;
    drop(event_tx);
    let _ = forward.await;

    let terminal = match outcome {
        Ok(run) if run.status == RunStatus::Cancelled => ServerFrame::Cancelled {
            steps_taken: run.steps,
        },
        Ok(run) => ServerFrame::Completed {
            result: run.output,
            steps_taken: run.steps,
        },
        Err(e) => ServerFrame::error(e.to_string()),
    };
    let _ = out.send(terminal);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolCallRequest;
    use crate::model::scripted::ScriptedModel;
    use crate::model::AssistantTurn;
    use crate::orchestrator::testing::orchestrator;
    use futures::channel::mpsc as fmpsc;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct Client {
        to_server: fmpsc::UnboundedSender<Result<WsMessage, std::convert::Infallible>>,
        from_server: fmpsc::UnboundedReceiver<WsMessage>,
    }

    impl Client {
        fn send(&self, frame: Value) {
            self.to_server
                .unbounded_send(Ok(WsMessage::Text(frame.to_string().into())))
                .unwrap();
        }

        async fn next(&mut self) -> Value {
            let message = tokio::time::timeout(Duration::from_secs(5), self.from_server.next())
                .await
                .unwrap()
                .unwrap();
            let WsMessage::Text(text) = message else {
                panic!("expected text frame");
            };
            serde_json::from_str(text.as_str()).unwrap()
        }

        /// Read frames until a terminal one, returning all of them.
        async fn until_terminal(&mut self) -> Vec<Value> {
            let mut frames = Vec::new();
            loop {
                let frame = self.next().await;
                let done = frame["event"] != "progress";
                frames.push(frame);
                if done {
                    return frames;
                }
            }
        }
    }

    fn connect(model: Arc<ScriptedModel>) -> Client {
        let (to_server, server_in) = fmpsc::unbounded();
        let (server_out, from_server) = fmpsc::unbounded();
        let state = AppState::new(orchestrator(model));
        tokio::spawn(drive(state, server_out, server_in));
        Client {
            to_server,
            from_server,
        }
    }

    #[tokio::test]
    async fn test_progress_then_completed() {
        let model = Arc::new(ScriptedModel::new(vec![
            AssistantTurn::calls(vec![ToolCallRequest::new("1", "echo", json!({"text": "x"}))]),
            AssistantTurn::text("done"),
        ]));
        let mut client = connect(model);
        client.send(json!({"event": "execute_agent", "data": {"goal": "do it"}}));

        let frames = client.until_terminal().await;
        let stages: Vec<&str> = frames
            .iter()
            .filter_map(|f| f["data"]["stage"].as_str())
            .collect();
        assert_eq!(stages, vec!["planning", "executing_tool:echo", "planning", "validating"]);
        assert_eq!(
            frames.last().unwrap(),
            &json!({"event": "completed", "data": {"result": "done", "steps_taken": 2}})
        );
        assert_eq!(frames[1]["data"]["tool"], "echo");
    }

    #[tokio::test]
    async fn test_stop_cancels_run() {
        let model = Arc::new(ScriptedModel::repeating(AssistantTurn::calls(vec![
            ToolCallRequest::new("1", "echo", json!({"text": "slow"})),
        ])));
        let mut client = connect(model);
        client.send(json!({"event": "execute_agent", "data": {"goal": "loop"}}));

        let first = client.next().await;
        assert_eq!(first["data"]["stage"], "planning");
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.send(json!({"event": "stop"}));

        let frames = client.until_terminal().await;
        assert_eq!(frames.last().unwrap()["event"], "cancelled");
    }

    #[tokio::test]
    async fn test_second_run_rejected_while_busy() {
        let model = Arc::new(ScriptedModel::repeating(AssistantTurn::calls(vec![
            ToolCallRequest::new("1", "echo", json!({"text": "slow"})),
        ])));
        let mut client = connect(model);
        client.send(json!({"event": "execute_agent", "data": {"goal": "one"}}));
        assert_eq!(client.next().await["data"]["stage"], "planning");

        client.send(json!({"event": "execute_agent", "data": {"goal": "two"}}));
        let mut rejected = false;
        for _ in 0..4 {
            let frame = client.next().await;
            if frame["event"] == "error" {
                assert_eq!(frame["data"]["error"], "a run is already in progress");
                rejected = true;
                break;
            }
        }
        assert!(rejected);
        client.send(json!({"event": "stop"}));
    }

    #[tokio::test]
    async fn test_model_error_frame() {
        let mut client = connect(Arc::new(ScriptedModel::failing("provider outage")));
        client.send(json!({"event": "execute_agent", "data": {"goal": "q"}}));
        let frames = client.until_terminal().await;
        let last = frames.last().unwrap();
        assert_eq!(last["event"], "error");
        assert!(last["data"]["error"].as_str().unwrap().contains("provider outage"));
    }

    #[tokio::test]
    async fn test_invalid_frames() {
        let mut client = connect(Arc::new(ScriptedModel::new(vec![])));
        client.send(json!({"event": "dance"}));
        assert_eq!(client.next().await["event"], "error");

        client.send(json!({"event": "stop"}));
        assert_eq!(
            client.next().await["data"]["error"],
            "no run in progress"
        );

        client.send(json!({"event": "execute_agent", "data": {"goal": " "}}));
        assert_eq!(client.next().await["data"]["error"], "goal must not be empty");
    }
}
