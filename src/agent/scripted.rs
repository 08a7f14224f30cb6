// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A deterministic agent used by the demo binary and tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::types::{AgentResponse, TokenUsage};
use super::Agent;
use crate::error::AgentError;
use crate::tools::{CalculatorTool, ToolRegistry};

pub const SCRIPTED_AGENT_VERSION: &str = "1.0";

pub const DEFAULT_MODEL: &str = "scripted-1";

const CALCULATOR: &str = "calculate";

const PROMPT_PREFIXES: &[&str] = &["what is", "what's", "calculate", "compute", "evaluate"];

/// Routes arithmetic prompts to its `calculate` tool and echoes the rest.
///
/// Tool calls go through [`ToolRegistry::dispatch`], so replacing a handler
/// in the registry changes what the agent calls.
#[derive(Debug)]
pub struct ScriptedAgent {
    model: String,
    system_prompt: String,
    tools: ToolRegistry,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        let mut tools = ToolRegistry::new();
        tools.register(CalculatorTool);
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: "You are a helpful assistant that can do arithmetic.".to_string(),
            tools,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn version(&self) -> &'static str {
        SCRIPTED_AGENT_VERSION
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    async fn calculate(&self, expression: &str) -> Result<String, AgentError> {
        let input = json!({
            "toolUseId": Uuid::new_v4().to_string(),
            "name": CALCULATOR,
            "expression": expression,
        });
        let output = self.tools.dispatch(CALCULATOR, input).await?;

        Ok(match output.get("status").and_then(Value::as_str) {
            Some("success") => format!("{expression} = {}", output["result"]),
            _ => format!(
                "I couldn't evaluate {expression}: {}",
                output
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
            ),
        })
    }
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn invoke(&self, prompt: &str) -> Result<AgentResponse, AgentError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AgentError::InvalidInput("prompt is empty".to_string()));
        }

        let text = match arithmetic_expression(prompt) {
            Some(expression) => {
                debug!(%expression, "Routing prompt to calculator");
                self.calculate(&expression).await?
            }
            None => format!("You said: {prompt}"),
        };

        let usage = TokenUsage::new(word_count(prompt), word_count(&text));
        Ok(AgentResponse::text(text).with_metadata(self.model.clone(), Some(usage)))
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }
}

/// The arithmetic expression in a prompt like "What is (2 + 3) * 4?", if any.
fn arithmetic_expression(prompt: &str) -> Option<String> {
    let lowered = prompt.to_lowercase();
    let mut rest = lowered.trim();
    for prefix in PROMPT_PREFIXES {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped.trim_start();
            break;
        }
    }
    let rest = rest.trim_end_matches(['?', '.', '=', ' ']);

    let is_arithmetic = !rest.is_empty()
        && rest.chars().any(|c| c.is_ascii_digit())
        && rest
            .chars()
            .all(|c| c.is_ascii_digit() || " .+-*/^()".contains(c));
    is_arithmetic.then(|| rest.to_string())
}

fn word_count(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_expression() {
        assert_eq!(arithmetic_expression("What is 2 + 2?"), Some("2 + 2".to_string()));
        assert_eq!(arithmetic_expression("(1+2)*3"), Some("(1+2)*3".to_string()));
        assert_eq!(arithmetic_expression("calculate 2 ** 8"), Some("2 ** 8".to_string()));
        assert_eq!(arithmetic_expression("tell me a joke"), None);
        assert_eq!(arithmetic_expression("what is love?"), None);
    }

    #[tokio::test]
    async fn test_invoke_calculates() {
        let agent = ScriptedAgent::new();
        let response = agent.invoke("What is 6 * 7?").await.unwrap();
        assert_eq!(response.text, "6 * 7 = 42");

        let metadata = response.metadata.unwrap();
        assert_eq!(metadata.model, DEFAULT_MODEL);
        assert_eq!(metadata.usage.unwrap().input_tokens, 5);
    }

    #[tokio::test]
    async fn test_invoke_reports_tool_errors_in_text() {
        let agent = ScriptedAgent::new();
        let response = agent.invoke("1 / 0").await.unwrap();
        assert_eq!(response.text, "I couldn't evaluate 1 / 0: division by zero");
    }

    #[tokio::test]
    async fn test_invoke_keeps_division_as_float() {
        let agent = ScriptedAgent::new();
        let response = agent.invoke("What is 7 / 2?").await.unwrap();
        assert_eq!(response.text, "7 / 2 = 3.5");
    }

    #[tokio::test]
    async fn test_invoke_refuses_deeply_nested_expression() {
        let agent = ScriptedAgent::new();
        let expression = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        let response = agent.invoke(&expression).await.unwrap();
        assert_eq!(
            response.text,
            format!("I couldn't evaluate {expression}: Expression too deeply nested")
        );
    }

    #[tokio::test]
    async fn test_invoke_echoes() {
        let agent = ScriptedAgent::new().with_model("echo-model");
        let response = agent.invoke("hello there").await.unwrap();
        assert_eq!(response.text, "You said: hello there");
        assert_eq!(response.metadata.unwrap().model, "echo-model");
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let agent = ScriptedAgent::new();
        let err = agent.invoke("   ").await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
    }

    #[test]
    fn test_registry_has_calculator() {
        let agent = ScriptedAgent::new();
        assert_eq!(agent.tools().names(), vec!["calculate"]);
        assert_eq!(agent.version(), "1.0");
    }
}
