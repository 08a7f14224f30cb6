// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool registry and handler trait.
//!
//! - [`ToolHandler`] trait that all tools implement
//! - [`ToolRegistry`] mapping names to handlers and dispatching calls

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::definition::ToolDefinition;
use crate::error::ToolError;

/// Trait that all tool handlers must implement.
///
/// # Example
///
/// ```rust,ignore
/// struct Echo;
///
/// #[async_trait]
/// impl ToolHandler for Echo {
///     fn definition(&self) -> ToolDefinition {
///         ToolDefinition::new("echo", "Returns its input")
///     }
///
///     async fn execute(&self, input: Value) -> Result<Value, ToolError> {
///         Ok(input)
///     }
/// }
/// ```
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Get the tool definition (name, description, input schema).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given input parameters.
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

/// Registry of available tools, ordered by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under the name from its definition.
    pub fn register<T: ToolHandler + 'static>(&mut self, handler: T) -> &mut Self {
        let name = handler.definition().name;
        self.handlers.insert(name, Arc::new(handler));
        self
    }

    /// Register a shared handler under an explicit name.
    pub fn register_as(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) -> &mut Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Swap the handler registered as `name`, returning the previous one.
    ///
    /// Does nothing and returns `None` if no tool has that name.
    pub fn replace(
        &mut self,
        name: &str,
        handler: Arc<dyn ToolHandler>,
    ) -> Option<Arc<dyn ToolHandler>> {
        self.handlers
            .get_mut(name)
            .map(|slot| std::mem::replace(slot, handler))
    }

    /// Get a handler by tool name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// `(name, handler)` pairs in sorted order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Arc<dyn ToolHandler>)> {
        self.handlers.iter().map(|(name, handler)| (name.as_str(), handler))
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.handlers.values().map(|h| h.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatch a tool call and return its output.
    pub async fn dispatch(&self, tool_name: &str, input: Value) -> Result<Value, ToolError> {
        let handler = self
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;

        debug!(tool = %tool_name, "Executing tool");
        let start = Instant::now();
        let result = handler.execute(input).await;
        debug!(
            tool = %tool_name,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            success = result.is_ok(),
            "Tool execution finished"
        );
        result
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockTool {
        name: String,
    }

    #[async_trait]
    impl ToolHandler for MockTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(&self.name, "A mock tool")
        }

        async fn execute(&self, _input: Value) -> Result<Value, ToolError> {
            Ok(serde_json::json!({"result": self.name, "status": "success"}))
        }
    }

    fn mock(name: &str) -> MockTool {
        MockTool {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_registry_register() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("search")).register(mock("_internal_helper"));

        assert!(registry.contains("search"));
        assert!(!registry.contains("calculate"));
        assert_eq!(registry.names(), vec!["_internal_helper", "search"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_replace() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("search"));

        let previous = registry.replace("search", Arc::new(mock("other")));
        assert!(previous.is_some());
        assert_eq!(registry.get("search").unwrap().definition().name, "other");
        assert!(registry.replace("missing", Arc::new(mock("x"))).is_none());
        assert!(!registry.contains("missing"));
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("test_tool"));

        let output = registry
            .dispatch("test_tool", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(output["status"], "success");
    }

    #[tokio::test]
    async fn test_registry_dispatch_not_found() {
        let registry = ToolRegistry::new();
        let result = registry.dispatch("nonexistent", serde_json::json!({})).await;
        assert!(matches!(result.unwrap_err(), ToolError::NotFound(_)));
    }
}
