// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tools an agent can call.
//!
//! - [`ToolHandler`] trait - Core abstraction for tool implementations
//! - [`ToolRegistry`] - Maps tool names to handlers, dispatches calls
//! - [`InstrumentedTool`] - A handler measured as `tool.<name>`
//! - Built-in handlers in the [`handlers`] module
//!
//! # Example
//!
//! ```rust,ignore
//! use agentmeter::tools::{CalculatorTool, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(CalculatorTool);
//! let output = registry.dispatch("calculate", json!({"expression": "2 + 2"})).await?;
//! ```

pub mod definition;
pub mod handlers;
pub mod instrumented;
pub mod registry;

pub use definition::{is_private_tool, InputSchema, ToolDefinition};
pub use handlers::*;
pub use instrumented::InstrumentedTool;
pub use registry::{ToolHandler, ToolRegistry};

use serde::Deserialize;
use crate::error::ToolError;

/// Parse JSON arguments into a typed struct.
pub fn parse_arguments<T>(arguments: &serde_json::Value) -> Result<T, ToolError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(arguments.clone())
        .map_err(|err| ToolError::InvalidInput(format!("Failed to parse arguments: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Args {
        expression: String,
    }

    #[test]
    fn test_parse_arguments() {
        let args: Args = parse_arguments(&serde_json::json!({"expression": "1+1"})).unwrap();
        assert_eq!(args.expression, "1+1");

        let err = parse_arguments::<Args>(&serde_json::json!({"expr": 1})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
