// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agentmeter - telemetry for LLM agents and their tools.
//!
//! Wraps an agent's entry point and its tools so every call is timed,
//! annotated and reported to a metrics backend (Datadog agentless API,
//! DogStatsD, or a local in-memory buffer), without changing what the
//! wrapped calls return.
//!
//! # Architecture
//!
//! - [`config`] - Sink configuration loading and merging
//! - [`sink`] - Process-wide telemetry sink and metrics backends
//! - [`telemetry`] - Operation descriptors, measurement spans, log setup
//! - [`instrument`] - The call instrumentation wrapper
//! - [`tools`] - Tool handlers, registry and instrumented tools
//! - [`agent`] - Agent trait and the instrumented agent facade
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use agentmeter::agent::{InstrumentedAgent, ScriptedAgent};
//! use agentmeter::config::SinkOptions;
//!
//! let agent = InstrumentedAgent::attach(ScriptedAgent::new(), SinkOptions::new("calc-agent", "dev"));
//! let response = agent.invoke("what is 2 + 2?").await?;
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod instrument;
pub mod sink;
pub mod telemetry;
pub mod tools;

// Re-export commonly used types at crate root
pub use agent::{Agent, AgentResponse, InstrumentedAgent};
pub use config::SinkOptions;
pub use error::{AgentError, ConfigError, ExtractionError, Result, SinkError, ToolError};
pub use instrument::{instrument_agent_call, instrument_tool, Instrumented};
pub use sink::{initialize, Sink};
pub use telemetry::{CallKind, MeasurementSpan, OperationDescriptor, SpanStatus};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
