// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Call instrumentation.
//!
//! Wraps any callable so each call is timed, annotated and reported through
//! the [`Sink`](crate::sink::Sink), while returning exactly what the callable
//! returned. A call fails when its result is an `Err`; the error is recorded
//! as `error.type` / `error.message` and handed back unchanged.
//!
//! `call` and `call_async` accept results implementing [`Outcome`]. Callables
//! returning any other type go through `call_value`, and `Result`s whose error
//! lacks `Display` through `call_fallible` (the message is its `Debug` form).
//!
//! # Usage
//!
//! ```rust,ignore
//! use agentmeter::instrument::instrument_tool;
//!
//! fn add((a, b): (i64, i64)) -> i64 {
//!     a + b
//! }
//!
//! let add = instrument_tool("add", add);
//! assert_eq!(add.call((2, 3)), 5); // one tool.response_time, one tool.calls
//! ```

mod extract;
mod outcome;
mod wrapper;

pub use extract::{
    from_fn, AgentInputAttributes, AgentOutputAttributes, Extract, FnExtractor, NoAttributes,
    ToolInputAttributes, ToolOutputAttributes,
};
pub use outcome::{error_type_name, short_type_name, Failure, Outcome};
pub use wrapper::{
    instrument_agent_call, instrument_tool, tool_descriptor, Instrumentation, Instrumented,
    AGENT_OPERATION,
};
