// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A tool handler wrapped with call instrumentation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::definition::ToolDefinition;
use super::registry::ToolHandler;
use crate::error::ToolError;
use crate::instrument::{tool_descriptor, Instrumentation, ToolInputAttributes, ToolOutputAttributes};
use crate::sink::Sink;
use crate::telemetry::CallKind;

/// Delegates to an inner handler, measuring each execution as `tool.<name>`.
pub struct InstrumentedTool {
    inner: Arc<dyn ToolHandler>,
    instrumentation: Instrumentation<Value, Value>,
}

impl InstrumentedTool {
    /// Wrap `inner` as the tool `name`, reporting to the global sink.
    pub fn new(name: &str, inner: Arc<dyn ToolHandler>) -> Self {
        Self::build(name, inner, None, None)
    }

    /// Wrap `inner` with an explicit service and sink.
    pub fn with_sink(
        name: &str,
        inner: Arc<dyn ToolHandler>,
        service: Option<&str>,
        sink: Arc<Sink>,
    ) -> Self {
        Self::build(name, inner, service, Some(sink))
    }

    fn build(
        name: &str,
        inner: Arc<dyn ToolHandler>,
        service: Option<&str>,
        sink: Option<Arc<Sink>>,
    ) -> Self {
        let mut descriptor = tool_descriptor(name);
        if let Some(service) = service {
            descriptor = descriptor.with_service(service);
        }
        let mut instrumentation = Instrumentation::new(descriptor, CallKind::Tool)
            .with_input_extractor(ToolInputAttributes)
            .with_output_extractor(ToolOutputAttributes);
        if let Some(sink) = sink {
            instrumentation = instrumentation.with_sink(sink);
        }
        Self {
            inner,
            instrumentation,
        }
    }

    /// The uninstrumented handler.
    pub fn inner(&self) -> &Arc<dyn ToolHandler> {
        &self.inner
    }

    pub fn instrumentation(&self) -> &Instrumentation<Value, Value> {
        &self.instrumentation
    }
}

#[async_trait]
impl ToolHandler for InstrumentedTool {
    fn definition(&self) -> ToolDefinition {
        self.inner.definition()
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let inner = Arc::clone(&self.inner);
        self.instrumentation
            .call_async(input, |input| async move { inner.execute(input).await })
            .await
    }
}

impl std::fmt::Debug for InstrumentedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedTool")
            .field("tool", &self.inner.definition().name)
            .field("instrumentation", &self.instrumentation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedSinkConfig;
    use crate::sink::MemoryClient;
    use crate::telemetry::{SpanStatus, ERROR_MESSAGE};

    struct Divide;

    #[async_trait]
    impl ToolHandler for Divide {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("divide", "Divide a by b")
        }

        async fn execute(&self, input: Value) -> Result<Value, ToolError> {
            let a = input["a"].as_f64().unwrap_or(0.0);
            let b = input["b"].as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Err(ToolError::ExecutionFailed("division by zero".to_string()));
            }
            Ok(serde_json::json!({"result": a / b, "status": "success"}))
        }
    }

    fn wrapped() -> (InstrumentedTool, Arc<MemoryClient>) {
        let client = Arc::new(MemoryClient::new());
        let sink = Arc::new(Sink::with_client(ResolvedSinkConfig::default(), client.clone()));
        let tool = InstrumentedTool::with_sink("divide", Arc::new(Divide), Some("math-agent"), sink);
        (tool, client)
    }

    #[tokio::test]
    async fn test_success_records_status_and_ids() {
        let (tool, client) = wrapped();
        let output = tool
            .execute(serde_json::json!({"toolUseId": "t-9", "name": "divide", "a": 6, "b": 3}))
            .await
            .unwrap();
        assert_eq!(output["result"], 2.0);
        assert_eq!(tool.definition().name, "divide");

        let span = &client.spans()[0];
        assert_eq!(span.operation, "tool.divide");
        assert_eq!(span.service, "math-agent");
        assert_eq!(span.attribute("tool.id").and_then(|v| v.as_str()), Some("t-9"));
        assert_eq!(span.attribute("tool.status").and_then(|v| v.as_str()), Some("success"));
        assert_eq!(client.counter("tool.calls"), 1);
    }

    #[tokio::test]
    async fn test_error_is_returned_unchanged() {
        let (tool, client) = wrapped();
        let err = tool
            .execute(serde_json::json!({"a": 1, "b": 0}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(ref m) if m == "division by zero"));

        let span = &client.spans()[0];
        assert_eq!(span.status, SpanStatus::Error);
        assert_eq!(span.attribute("tool.status").and_then(|v| v.as_str()), Some("error"));
        assert_eq!(
            span.attribute(ERROR_MESSAGE).and_then(|v| v.as_str()),
            Some("Execution failed: division by zero")
        );
    }
}
