//! Uniform execution contract: validate, dispatch, normalize.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{RegisteredTool, ToolOutput, ToolRegistry, ToolResult};
use crate::conversation::ToolCallRequest;

/// Runs tool calls. Every path ends in a [`ToolResult`].
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve the call in `registry` and execute it.
    pub async fn execute_call(&self, registry: &ToolRegistry, call: &ToolCallRequest) -> ToolResult {
        match registry.get(&call.tool_name) {
            Some(tool) => self.execute(tool, &call.arguments).await,
            None => {
                warn!("Model requested unknown tool: {}", call.tool_name);
                ToolResult::failure(registry.unknown_tool_message(&call.tool_name))
            }
        }
    }

    /// Validate `arguments` and run the tool on its own task under the timeout.
    pub async fn execute(&self, tool: &RegisteredTool, arguments: &Value) -> ToolResult {
        let descriptor = &tool.descriptor;

        let args = match descriptor.input_schema.validate(arguments) {
            Ok(args) => args,
            Err(e) => {
                debug!("Rejected arguments for {}: {}", descriptor.name, e);
                return ToolResult::failure(format!(
                    "Invalid arguments for {}: {}",
                    descriptor.name, e
                ));
            }
        };

        let capability = Arc::clone(&tool.capability);
        let mut handle = tokio::spawn(async move { capability.invoke(args).await });
        let _abort = AbortOnDrop(handle.abort_handle());

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Err(_) => {
                handle.abort();
                warn!("Tool {} timed out after {:?}", descriptor.name, self.timeout);
                ToolResult::failure(format!(
                    "Failed to {}: timed out after {:?}",
                    descriptor.action, self.timeout
                ))
            }
            Ok(Err(join_error)) => {
                warn!("Tool {} task failed: {}", descriptor.name, join_error);
                let cause = if join_error.is_panic() {
                    "the tool crashed"
                } else {
                    "the tool task was cancelled"
                };
                ToolResult::failure(format!("Failed to {}: {}", descriptor.action, cause))
            }
            Ok(Ok(Err(e))) => {
                debug!("Tool {} failed: {}", descriptor.name, e);
                ToolResult::failure(format!("Failed to {}: {}", descriptor.action, e))
            }
            Ok(Ok(Ok(output))) => normalize(output, &descriptor.action),
        }
    }
}

/// Stops the tool task when the caller stops waiting for it.
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn normalize(output: ToolOutput, action: &str) -> ToolResult {
    match output {
        ToolOutput::Text(text) if text.trim().is_empty() => {
            ToolResult::success("The tool completed but returned no content.")
        }
        ToolOutput::Text(text) => ToolResult::success(text),
        ToolOutput::Structured(Value::Null) => {
            ToolResult::failure(format!("Failed to {}: the tool returned no data", action))
        }
        ToolOutput::Structured(Value::String(text)) => normalize(ToolOutput::Text(text), action),
        ToolOutput::Structured(value) => {
            let sorted = sort_keys(value);
            match serde_json::to_string_pretty(&sorted) {
                Ok(text) => ToolResult::success(text),
                Err(e) => ToolResult::failure(format!("Failed to {}: {}", action, e)),
            }
        }
    }
}

/// Rebuild objects with keys in lexical order, whatever map backend serde_json uses.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AgentError, Result};
    use crate::tools::{Capability, FieldSpec, ToolDescriptor, ValidatedArgs};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(ToolOutput);

    #[async_trait]
    impl Capability for Fixed {
        async fn invoke(&self, _args: ValidatedArgs) -> Result<ToolOutput> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Capability for Failing {
        async fn invoke(&self, _args: ValidatedArgs) -> Result<ToolOutput> {
            Err(AgentError::Tool("upstream returned 503".to_string()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Capability for Panicking {
        async fn invoke(&self, _args: ValidatedArgs) -> Result<ToolOutput> {
            panic!("boom")
        }
    }

    struct Slow;

    #[async_trait]
    impl Capability for Slow {
        async fn invoke(&self, _args: ValidatedArgs) -> Result<ToolOutput> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".into())
        }
    }

    struct Counting(AtomicUsize);

    #[async_trait]
    impl Capability for Counting {
        async fn invoke(&self, _args: ValidatedArgs) -> Result<ToolOutput> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("counted".into())
        }
    }

    fn tool(capability: Arc<dyn Capability>) -> RegisteredTool {
        RegisteredTool {
            descriptor: ToolDescriptor::new("lookup", "test tool")
                .action("look up the thing")
                .field(FieldSpec::string("query", "q").required()),
            capability,
        }
    }

    fn executor() -> ToolExecutor {
        ToolExecutor::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_text_output_passes_through() {
        let result = executor()
            .execute(&tool(Arc::new(Fixed("hello".into()))), &json!({"query": "x"}))
            .await;
        assert_eq!(result, ToolResult::success("hello"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_capability() {
        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let result = executor().execute(&tool(counter.clone()), &json!({})).await;

        assert!(!result.ok);
        assert!(result.text.contains("\"query\" is a required property"));
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_capability_error_becomes_failure_text() {
        let result = executor()
            .execute(&tool(Arc::new(Failing)), &json!({"query": "x"}))
            .await;
        assert_eq!(
            result,
            ToolResult::failure("Failed to look up the thing: upstream returned 503")
        );
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let result = executor()
            .execute(&tool(Arc::new(Panicking)), &json!({"query": "x"}))
            .await;
        assert!(!result.ok);
        assert!(!result.text.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_reported() {
        let started = std::time::Instant::now();
        let result = executor()
            .execute(&tool(Arc::new(Slow)), &json!({"query": "x"}))
            .await;
        assert!(!result.ok);
        assert_eq!(
            result.text,
            "Failed to look up the thing: timed out after 200ms"
        );
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    struct Flagging(Arc<std::sync::atomic::AtomicBool>);

    #[async_trait]
    impl Capability for Flagging {
        async fn invoke(&self, _args: ValidatedArgs) -> Result<ToolOutput> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.0.store(true, Ordering::SeqCst);
            Ok("finished".into())
        }
    }

    #[tokio::test]
    async fn test_abandoned_call_stops_tool_task() {
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let tool = tool(Arc::new(Flagging(finished.clone())));
        let executor = ToolExecutor::new(Duration::from_secs(5));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            executor.execute(&tool, &json!({"query": "x"})),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_structured_output_has_sorted_keys() {
        let output = ToolOutput::Structured(json!({"b": 1, "a": {"z": true, "c": null}}));
        let result = executor()
            .execute(&tool(Arc::new(Fixed(output))), &json!({"query": "x"}))
            .await;
        assert!(result.ok);
        let a = result.text.find("\"a\"").unwrap();
        let b = result.text.find("\"b\"").unwrap();
        let c = result.text.find("\"c\"").unwrap();
        let z = result.text.find("\"z\"").unwrap();
        assert!(a < b && c < z);
    }

    #[tokio::test]
    async fn test_null_output_is_failure() {
        let result = executor()
            .execute(
                &tool(Arc::new(Fixed(ToolOutput::Structured(Value::Null)))),
                &json!({"query": "x"}),
            )
            .await;
        assert!(!result.ok);
        assert!(result.text.starts_with("Failed to look up the thing"));
    }

    #[tokio::test]
    async fn test_unknown_tool_call() {
        let registry = ToolRegistry::new();
        let call = ToolCallRequest::new("1", "missing", json!({}));
        let result = executor().execute_call(&registry, &call).await;
        assert_eq!(result, ToolResult::failure("Unknown tool: missing"));
    }
}
