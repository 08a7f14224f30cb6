// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent response types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token usage for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the input/prompt
    pub input_tokens: u32,
    /// Number of tokens in the output/completion
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }
}

/// Model and usage details reported with a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// What an agent returns from [`Agent::invoke`](super::Agent::invoke).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

impl AgentResponse {
    /// A plain text response without metadata.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, model: impl Into<String>, usage: Option<TokenUsage>) -> Self {
        self.metadata = Some(ResponseMetadata {
            model: model.into(),
            usage,
        });
        self
    }

    pub fn total_tokens(&self) -> u32 {
        self.metadata
            .as_ref()
            .and_then(|m| m.usage)
            .map_or(0, |u| u.total_tokens)
    }
}

impl fmt::Display for AgentResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total() {
        assert_eq!(TokenUsage::new(10, 5).total_tokens, 15);
        assert_eq!(TokenUsage::new(u32::MAX, 1).total_tokens, u32::MAX);
    }

    #[test]
    fn test_response_serialization() {
        let response =
            AgentResponse::text("4").with_metadata("scripted-1", Some(TokenUsage::new(3, 1)));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["metadata"]["model"], "scripted-1");
        assert_eq!(json["metadata"]["usage"]["total_tokens"], 4);
        assert_eq!(response.total_tokens(), 4);
        assert_eq!(response.to_string(), "4");
    }

    #[test]
    fn test_plain_response_has_no_metadata_key() {
        let json = serde_json::to_value(AgentResponse::text("hi")).unwrap();
        assert!(json.get("metadata").is_none());
    }
}
