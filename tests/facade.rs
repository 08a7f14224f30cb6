// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tests for the instrumented agent facade.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use agentmeter::agent::{Agent, AgentResponse, InstrumentedAgent, ScriptedAgent};
use agentmeter::config::{ResolvedSinkConfig, SinkOptions};
use agentmeter::sink::{MemoryClient, Sink};
use agentmeter::telemetry::{CallKind, SpanStatus};
use agentmeter::tools::{ToolDefinition, ToolHandler, ToolRegistry};
use agentmeter::{AgentError, ToolError};

fn memory_sink() -> (Arc<Sink>, Arc<MemoryClient>) {
    let client = Arc::new(MemoryClient::new());
    let sink = Arc::new(Sink::with_client(ResolvedSinkConfig::default(), client.clone()));
    (sink, client)
}

struct Search;

#[async_trait]
impl ToolHandler for Search {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("search", "Search the knowledge base")
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let query = input["query"].as_str().unwrap_or_default();
        Ok(json!({"hits": [format!("doc about {query}")], "status": "success"}))
    }
}

struct InternalHelper;

#[async_trait]
impl ToolHandler for InternalHelper {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("_internal_helper", "Not for the model")
    }

    async fn execute(&self, _input: Value) -> Result<Value, ToolError> {
        Ok(json!({"status": "success"}))
    }
}

/// Searches for the prompt, then calls its private helper.
struct ResearchAgent {
    tools: ToolRegistry,
}

impl ResearchAgent {
    fn new(helper: Arc<dyn ToolHandler>) -> Self {
        let mut tools = ToolRegistry::new();
        tools.register(Search);
        tools.register_as("_internal_helper", helper);
        Self { tools }
    }

    fn version(&self) -> &'static str {
        "2.3"
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    async fn invoke(&self, prompt: &str) -> Result<AgentResponse, AgentError> {
        let hits = self
            .tools
            .dispatch(
                "search",
                json!({"toolUseId": "use-1", "name": "search", "query": prompt}),
            )
            .await?;
        self.tools.dispatch("_internal_helper", json!({})).await?;
        Ok(AgentResponse::text(hits["hits"][0].as_str().unwrap_or_default())
            .with_metadata("research-model", None))
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }
}

#[test]
fn test_agent_members_reachable_through_facade() {
    let (sink, _client) = memory_sink();
    let agent = InstrumentedAgent::attach_with_sink(
        ScriptedAgent::new(),
        SinkOptions::new("calc-agent", "test"),
        sink,
    );

    assert_eq!(agent.version(), "1.0");
    assert_eq!(agent.model(), "scripted-1");
    assert!(!agent.system_prompt().is_empty());
}

#[test]
fn test_only_public_tools_are_wrapped() {
    let (sink, _client) = memory_sink();
    let helper: Arc<dyn ToolHandler> = Arc::new(InternalHelper);
    let agent = InstrumentedAgent::attach_with_sink(
        ResearchAgent::new(Arc::clone(&helper)),
        SinkOptions::new("research-agent", "test"),
        sink,
    );

    assert_eq!(agent.wrapped_tools(), ["search".to_string()]);
    assert_eq!(agent.version(), "2.3");

    let kept = agent.tools().get("_internal_helper").unwrap();
    assert!(Arc::ptr_eq(&kept, &helper));
    assert_eq!(agent.tools().len(), 2);
}

#[tokio::test]
async fn test_tool_spans_recorded_through_registry() {
    let (sink, client) = memory_sink();
    let agent = InstrumentedAgent::attach_with_sink(
        ResearchAgent::new(Arc::new(InternalHelper)),
        SinkOptions::new("research-agent", "test"),
        sink,
    );

    let response = agent.invoke("rust").await.unwrap();
    assert_eq!(response.text, "doc about rust");

    let spans = client.spans();
    let operations: Vec<&str> = spans.iter().map(|s| s.operation.as_str()).collect();
    assert_eq!(operations, ["tool.search", "agent_call"]);

    let tool_span = &spans[0];
    assert_eq!(tool_span.kind, CallKind::Tool);
    assert_eq!(tool_span.service, "research-agent");
    assert_eq!(tool_span.attribute("tool.id").and_then(|v| v.as_str()), Some("use-1"));
    assert_eq!(tool_span.attribute("tool.name").and_then(|v| v.as_str()), Some("search"));

    let agent_span = &spans[1];
    assert_eq!(agent_span.resource, "ResearchAgent");
    assert_eq!(
        agent_span.attribute("agent.model").and_then(|v| v.as_str()),
        Some("research-model")
    );
    assert_eq!(
        agent_span.attribute("agent.input_length").and_then(|v| v.as_i64()),
        Some(4)
    );
    assert_eq!(client.counter("tool.calls"), 1);
}

#[tokio::test]
async fn test_scripted_arithmetic_records_tool_then_agent_span() {
    let (sink, client) = memory_sink();
    let agent = InstrumentedAgent::attach_with_sink(
        ScriptedAgent::new(),
        SinkOptions::new("calc-agent", "test"),
        sink,
    );

    let response = agent.invoke("What is (2 + 3) * 4?").await.unwrap();
    assert_eq!(response.text, "(2 + 3) * 4 = 20");

    let spans = client.spans();
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].operation, "tool.calculate");
    assert_eq!(
        spans[0].attribute("tool.status").and_then(|v| v.as_str()),
        Some("success")
    );
    assert_eq!(spans[1].operation, "agent_call");
    assert!(spans.iter().all(|s| s.status == SpanStatus::Success));

    let stats = client.timing_stats("agent.response_time").unwrap();
    assert_eq!(stats.count, 1);
}

#[tokio::test]
async fn test_facade_is_itself_an_agent() {
    let (sink, client) = memory_sink();
    let agent: Box<dyn Agent> = Box::new(InstrumentedAgent::attach_with_sink(
        ScriptedAgent::new(),
        SinkOptions::new("calc-agent", "test"),
        sink,
    ));

    let response = agent.invoke("hi").await.unwrap();
    assert_eq!(response.text, "You said: hi");
    assert_eq!(client.spans().len(), 1);
}
