// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Drop-in instrumented replacement for an agent.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::types::AgentResponse;
use super::Agent;
use crate::config::{ResolvedSinkConfig, SinkOptions};
use crate::error::AgentError;
use crate::instrument::{
    short_type_name, AgentInputAttributes, AgentOutputAttributes, Instrumentation,
    AGENT_OPERATION,
};
use crate::sink::{self, Sink};
use crate::telemetry::{CallKind, OperationDescriptor};
use crate::tools::{is_private_tool, InstrumentedTool, ToolHandler, ToolRegistry};

/// An agent whose invocations and public tools are measured.
///
/// Invocations are reported as `agent_call`; every tool whose name does not
/// start with `_` is reported as `tool.<name>`. Everything else on the agent
/// is reachable through `Deref`.
///
/// Tools registered after [`attach`](Self::attach) are not instrumented.
pub struct InstrumentedAgent<A: Agent> {
    agent: A,
    invocation: Instrumentation<str, AgentResponse>,
    sink: Arc<Sink>,
    config: ResolvedSinkConfig,
    wrapped_tools: Vec<String>,
}

impl<A: Agent> InstrumentedAgent<A> {
    /// Configure the process-wide sink with `options` and wrap `agent`.
    pub fn attach(agent: A, options: SinkOptions) -> Self {
        Self::attach_with_sink(agent, options, sink::global())
    }

    /// Configure `sink` with `options` and wrap `agent`, reporting to it.
    pub fn attach_with_sink(agent: A, options: SinkOptions, sink: Arc<Sink>) -> Self {
        let config = sink.initialize(&options);
        Self::wrap(agent, config, sink)
    }

    /// Configure `sink` from an already resolved configuration (for example
    /// one loaded from config files) and wrap `agent`.
    pub fn attach_with_config(agent: A, config: ResolvedSinkConfig, sink: Arc<Sink>) -> Self {
        let config = sink.initialize_resolved(config);
        Self::wrap(agent, config, sink)
    }

    fn wrap(mut agent: A, config: ResolvedSinkConfig, sink: Arc<Sink>) -> Self {
        let service = config.service.clone();

        let wrapped_tools = wrap_tools(agent.tools_mut(), &service, &sink);

        let descriptor = OperationDescriptor::new(AGENT_OPERATION)
            .with_resource(short_type_name::<A>())
            .with_service(service.as_str());
        let invocation = Instrumentation::new(descriptor, CallKind::Agent)
            .with_input_extractor(AgentInputAttributes)
            .with_output_extractor(AgentOutputAttributes)
            .with_sink(Arc::clone(&sink));

        info!(
            agent = %short_type_name::<A>(),
            service = %service,
            env = %config.env,
            tools = wrapped_tools.len(),
            "Instrumented agent attached"
        );

        Self {
            agent,
            invocation,
            sink,
            config,
            wrapped_tools,
        }
    }

    /// Answer one prompt, measured as `agent_call`.
    pub async fn invoke(&self, prompt: &str) -> Result<AgentResponse, AgentError> {
        let agent = &self.agent;
        self.invocation
            .call_async_ref(prompt, |prompt| agent.invoke(prompt))
            .await
    }

    /// Names of the tools that were instrumented at attach time.
    pub fn wrapped_tools(&self) -> &[String] {
        &self.wrapped_tools
    }

    pub fn sink(&self) -> &Arc<Sink> {
        &self.sink
    }

    /// Settings the sink was configured with at attach time.
    pub fn config(&self) -> &ResolvedSinkConfig {
        &self.config
    }

    /// Ship any buffered measurements.
    pub async fn flush(&self) {
        self.sink.flush().await;
    }

    /// Unwrap the agent. Its tools stay instrumented.
    pub fn into_inner(self) -> A {
        self.agent
    }
}

/// Replace each public tool with an instrumented one; returns their names.
fn wrap_tools(tools: &mut ToolRegistry, service: &str, sink: &Arc<Sink>) -> Vec<String> {
    let targets: Vec<(String, Arc<dyn ToolHandler>)> = tools
        .entries()
        .filter(|(name, _)| !is_private_tool(name))
        .map(|(name, handler)| (name.to_string(), Arc::clone(handler)))
        .collect();

    targets
        .into_iter()
        .map(|(name, handler)| {
            let wrapped =
                InstrumentedTool::with_sink(&name, handler, Some(service), Arc::clone(sink));
            tools.replace(&name, Arc::new(wrapped));
            debug!(tool = %name, "Instrumented tool");
            name
        })
        .collect()
}

#[async_trait]
impl<A: Agent> Agent for InstrumentedAgent<A> {
    async fn invoke(&self, prompt: &str) -> Result<AgentResponse, AgentError> {
        InstrumentedAgent::invoke(self, prompt).await
    }

    fn tools(&self) -> &ToolRegistry {
        self.agent.tools()
    }

    fn tools_mut(&mut self) -> &mut ToolRegistry {
        self.agent.tools_mut()
    }
}

impl<A: Agent> Deref for InstrumentedAgent<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.agent
    }
}

impl<A: Agent> DerefMut for InstrumentedAgent<A> {
    fn deref_mut(&mut self) -> &mut A {
        &mut self.agent
    }
}

impl<A: Agent + std::fmt::Debug> std::fmt::Debug for InstrumentedAgent<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedAgent")
            .field("agent", &self.agent)
            .field("service", &self.config.service)
            .field("wrapped_tools", &self.wrapped_tools)
            .finish()
    }
}
