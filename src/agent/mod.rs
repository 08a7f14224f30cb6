// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agents and the instrumented agent facade.
//!
//! An [`Agent`] answers prompts and exposes the tools it may call through a
//! [`ToolRegistry`]. [`InstrumentedAgent`] wraps any agent so that each
//! invocation and each public tool call is measured.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentmeter::agent::{InstrumentedAgent, ScriptedAgent};
//! use agentmeter::config::SinkOptions;
//!
//! let agent = InstrumentedAgent::attach(ScriptedAgent::new(), SinkOptions::new("calc-agent", "dev"));
//! let response = agent.invoke("what is 2 + 2?").await?;
//! assert_eq!(agent.version(), "1.0"); // everything else reaches the agent
//! ```

mod facade;
mod scripted;
mod types;

pub use facade::InstrumentedAgent;
pub use scripted::{ScriptedAgent, DEFAULT_MODEL, SCRIPTED_AGENT_VERSION};
pub use types::{AgentResponse, ResponseMetadata, TokenUsage};

use async_trait::async_trait;

use crate::error::AgentError;
use crate::tools::ToolRegistry;

/// An LLM-driven assistant that can call tools.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Answer one prompt.
    async fn invoke(&self, prompt: &str) -> Result<AgentResponse, AgentError>;

    /// Tools this agent may call.
    fn tools(&self) -> &ToolRegistry;

    fn tools_mut(&mut self) -> &mut ToolRegistry;
}
