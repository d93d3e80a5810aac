//! Tools the model can call.
//!
//! A tool is a [`ToolDescriptor`] (what the model sees) bound to a
//! [`Capability`] (what actually runs). Registries are built per invocation
//! by the [`Toolbox`], which decides which credentialed tools to expose.

pub mod builtin;
mod credentials;
mod executor;
mod registry;
mod schema;
mod toolbox;

pub use credentials::{CredentialContext, CredentialFields, Secret};
pub use executor::ToolExecutor;
pub use registry::{RegisteredTool, ToolRegistry};
pub use schema::{FieldSpec, FieldType, InputSchema, SchemaError, ValidatedArgs};
pub use toolbox::Toolbox;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Outcome of one tool call. Always producible; failures are text too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResult {
    pub ok: bool,
    pub text: String,
}

impl ToolResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            ok: true,
            text: text.into(),
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: text.into(),
        }
    }
}

/// Raw value produced by a capability, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Structured(Value),
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Structured(value)
    }
}

/// Something a tool call can run.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn invoke(&self, args: ValidatedArgs) -> Result<ToolOutput>;
}

/// Metadata for a tool as presented to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    /// Verb phrase used in failure text ("Failed to <action>: ...").
    #[serde(skip)]
    pub action: String,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: InputSchema::new(),
            action: format!("run {}", name),
        }
    }

    pub fn action(mut self, action: &str) -> Self {
        self.action = action.to_string();
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.input_schema = self.input_schema.field(field);
        self
    }
}
