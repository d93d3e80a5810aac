//! Per-invocation tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Capability, ToolDescriptor};
use crate::error::{AgentError, Result};

/// A descriptor bound to the capability that executes it.
#[derive(Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub capability: Arc<dyn Capability>,
}

impl RegisteredTool {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

/// Ordered, name-unique set of tools for one invocation.
///
/// Also remembers conditional tools that were left out, so an unknown-tool
/// result can tell the model which credential is missing.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
    withheld: HashMap<String, String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        capability: Arc<dyn Capability>,
    ) -> Result<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(AgentError::DuplicateTool(descriptor.name));
        }
        self.withheld.remove(&descriptor.name);
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            descriptor,
            capability,
        });
        Ok(())
    }

    /// Record a tool that is not available and why.
    pub fn withhold(&mut self, name: &str, reason: &str) {
        if !self.index.contains_key(name) {
            self.withheld.insert(name.to_string(), reason.to_string());
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Catalog sent to the model: descriptors only, in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Failure text for a call naming a tool this registry does not hold.
    pub fn unknown_tool_message(&self, name: &str) -> String {
        match self.withheld.get(name) {
            Some(reason) => format!("Unknown tool: {} ({})", name, reason),
            None => format!("Unknown tool: {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolOutput, ValidatedArgs};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Capability for Noop {
        async fn invoke(&self, _args: ValidatedArgs) -> Result<ToolOutput> {
            Ok("ok".into())
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("a", "first"), Arc::new(Noop))
            .unwrap();
        let err = registry
            .register(ToolDescriptor::new("a", "again"), Arc::new(Noop))
            .unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_order_is_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["c", "a", "b"] {
            registry
                .register(ToolDescriptor::new(name, ""), Arc::new(Noop))
                .unwrap();
        }
        assert_eq!(registry.names(), vec!["c", "a", "b"]);
        assert_eq!(registry.get("a").unwrap().name(), "a");
    }

    #[test]
    fn test_unknown_tool_message_uses_withheld_reason() {
        let mut registry = ToolRegistry::new();
        registry.withhold("gmail_send", "no Google access token was supplied for this request");

        assert_eq!(
            registry.unknown_tool_message("gmail_send"),
            "Unknown tool: gmail_send (no Google access token was supplied for this request)"
        );
        assert_eq!(registry.unknown_tool_message("nope"), "Unknown tool: nope");
    }

    #[test]
    fn test_registering_clears_withheld_entry() {
        let mut registry = ToolRegistry::new();
        registry.withhold("x", "missing");
        registry
            .register(ToolDescriptor::new("x", ""), Arc::new(Noop))
            .unwrap();
        registry.withhold("x", "missing");
        assert_eq!(registry.unknown_tool_message("x"), "Unknown tool: x");
    }
}
