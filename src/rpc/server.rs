//! JSON-RPC server over any line-oriented reader/writer.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::*;
use crate::error::{AgentError, Result};
use crate::orchestrator::Orchestrator;
use crate::tools::CredentialContext;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "agentic-browser";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

impl CredentialParams {
    fn context(self) -> CredentialContext {
        CredentialContext::from_request(self.top_level, self.credentials)
    }
}

pub struct RpcServer {
    orchestrator: Arc<Orchestrator>,
}

impl RpcServer {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Serve stdin/stdout until stdin closes.
    pub async fn run(&self) -> Result<()> {
        info!("JSON-RPC server reading from stdin");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve requests from `reader`, writing one response line per request.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(line).await {
                let mut payload = serde_json::to_string(&response)?;
                payload.push('\n');
                writer.write_all(payload.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        info!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle one raw line. Notifications (no id) get no response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                return Some(JsonRpcResponse::error(None, PARSE_ERROR, "Parse error"));
            }
        };

        let id = request.id.clone();
        debug!("rpc method {}", request.method);
        let response = self.handle_request(request).await;
        id.map(|_| response)
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id;
        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(),
            "initialized" | "notifications/initialized" => Ok(json!({})),
            "tools/list" => self.tools_list(request.params),
            "tools/call" => self.tools_call(request.params).await,
            "agent/run" => self.agent_run(request.params).await,
            other => {
                return JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    &format!("Method not found: {}", other),
                )
            }
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(RpcFailure { code, message }) => JsonRpcResponse::error(id, code, &message),
        }
    }

    fn initialize(&self) -> std::result::Result<Value, RpcFailure> {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };
        Ok(serde_json::to_value(result)?)
    }

    fn tools_list(&self, params: Option<Value>) -> std::result::Result<Value, RpcFailure> {
        let params: ToolsListParams = match params {
            Some(p) => parse_params(p)?,
            None => ToolsListParams::default(),
        };
        let tools = self
            .orchestrator
            .tools(&params.credentials.context())?
            .into_iter()
            .map(|d| {
                Ok(Tool {
                    input_schema: serde_json::to_value(&d.input_schema)?,
                    name: d.name,
                    description: d.description,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::to_value(ToolsListResult { tools })?)
    }

    async fn tools_call(&self, params: Option<Value>) -> std::result::Result<Value, RpcFailure> {
        let params: ToolCallParams = parse_params(params.ok_or_else(missing_params)?)?;
        let result = self
            .orchestrator
            .call_tool(&params.name, params.arguments, &params.credentials.context())
            .await?;
        Ok(serde_json::to_value(ToolCallResult::from(result))?)
    }

    async fn agent_run(&self, params: Option<Value>) -> std::result::Result<Value, RpcFailure> {
        let params: AgentRunParams = parse_params(params.ok_or_else(missing_params)?)?;
        let run = self
            .orchestrator
            .run(
                params.messages,
                &params.credentials.context(),
                &CancellationToken::new(),
                None,
            )
            .await?;
        Ok(serde_json::to_value(run)?)
    }
}

struct RpcFailure {
    code: i32,
    message: String,
}

impl From<AgentError> for RpcFailure {
    fn from(err: AgentError) -> Self {
        let code = if err.is_client_error() {
            INVALID_PARAMS
        } else {
            AGENT_ERROR
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RpcFailure {
    fn from(err: serde_json::Error) -> Self {
        AgentError::from(err).into()
    }
}

fn missing_params() -> RpcFailure {
    RpcFailure {
        code: INVALID_PARAMS,
        message: "Missing params".to_string(),
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> std::result::Result<T, RpcFailure> {
    serde_json::from_value(params).map_err(|e| RpcFailure {
        code: INVALID_PARAMS,
        message: format!("Invalid params: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolCallRequest;
    use crate::model::scripted::ScriptedModel;
    use crate::model::AssistantTurn;
    use crate::orchestrator::testing::orchestrator;

    fn server(model: Arc<ScriptedModel>) -> RpcServer {
        RpcServer::new(Arc::new(orchestrator(model)))
    }

    async fn call(server: &RpcServer, request: Value) -> Value {
        let response = server.handle_line(&request.to_string()).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = server(Arc::new(ScriptedModel::new(vec![])));
        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;
        assert_eq!(response["result"]["serverInfo"]["name"], "agentic-browser");
        assert_eq!(response["id"], 1);
    }

    #[tokio::test]
    async fn test_parse_error_and_unknown_method() {
        let server = server(Arc::new(ScriptedModel::new(vec![])));
        let parse = server.handle_line("{not json").await.unwrap();
        assert_eq!(parse.error.unwrap().code, PARSE_ERROR);

        let unknown = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "nope"})).await;
        assert_eq!(unknown["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let server = server(Arc::new(ScriptedModel::new(vec![])));
        let line = json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string();
        assert!(server.handle_line(&line).await.is_none());
    }

    #[tokio::test]
    async fn test_tools_list_depends_on_credentials() {
        let server = server(Arc::new(ScriptedModel::new(vec![])));
        let bare = call(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
        assert_eq!(bare["result"]["tools"].as_array().unwrap().len(), 1);
        assert_eq!(bare["result"]["tools"][0]["inputSchema"]["type"], "object");

        let with_token = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list",
                   "params": {"credentials": {"google_access_token": "tok"}}}),
        )
        .await;
        assert!(with_token["result"]["tools"].as_array().unwrap().len() > 1);
    }

    #[tokio::test]
    async fn test_tools_call() {
        let server = server(Arc::new(ScriptedModel::new(vec![])));
        let ok = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                   "params": {"name": "echo", "arguments": {"text": "hey"}}}),
        )
        .await;
        assert_eq!(ok["result"]["content"][0]["text"], "hey");
        assert!(ok["result"].get("isError").is_none());

        let bad = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "echo", "arguments": {}}}),
        )
        .await;
        assert_eq!(bad["result"]["isError"], true);

        let missing = call(&server, json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call"})).await;
        assert_eq!(missing["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_agent_run() {
        let model = Arc::new(ScriptedModel::new(vec![
            AssistantTurn::calls(vec![ToolCallRequest::new("c1", "echo", json!({"text": "r"}))]),
            AssistantTurn::text("final"),
        ]));
        let server = server(model);
        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": "run-1", "method": "agent/run",
                   "params": {"messages": [{"role": "user", "content": "go"}]}}),
        )
        .await;
        assert_eq!(response["id"], "run-1");
        assert_eq!(response["result"]["output"], "final");
        assert_eq!(response["result"]["status"], "completed");
        assert_eq!(response["result"]["steps"], 2);
    }

    #[tokio::test]
    async fn test_agent_run_errors() {
        let server = server(Arc::new(ScriptedModel::failing("down")));
        let empty = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "agent/run", "params": {"messages": []}}),
        )
        .await;
        assert_eq!(empty["error"]["code"], INVALID_PARAMS);

        let failed = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 2, "method": "agent/run",
                   "params": {"messages": [{"role": "user", "content": "q"}]}}),
        )
        .await;
        assert_eq!(failed["error"]["code"], AGENT_ERROR);
    }

    #[tokio::test]
    async fn test_serve_writes_one_line_per_request() {
        let server = server(Arc::new(ScriptedModel::new(vec![])));
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n"
        );
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["id"], 2);
    }
}
