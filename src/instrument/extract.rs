// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Attribute extraction from call inputs and results.
//!
//! Extractors are best-effort. The built-in ones inspect a value through its
//! `serde` representation, so they work on any serializable argument or
//! result without knowing its concrete type. A value with an unexpected
//! shape simply yields fewer attributes.

use serde::Serialize;
use serde_json::Value;

use crate::error::ExtractionError;
use crate::telemetry::Attributes;

/// Derive span attributes from a value.
pub trait Extract<T: ?Sized>: Send + Sync {
    fn extract(&self, value: &T) -> Result<Attributes, ExtractionError>;
}

/// Extractor that adds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAttributes;

impl<T: ?Sized> Extract<T> for NoAttributes {
    fn extract(&self, _value: &T) -> Result<Attributes, ExtractionError> {
        Ok(Attributes::new())
    }
}

/// Extractor backed by a closure. Build with [`from_fn`].
#[derive(Clone, Copy)]
pub struct FnExtractor<F>(F);

/// Use a closure as an extractor.
///
/// ```rust,ignore
/// let extractor = from_fn(|query: &String| {
///     let mut attributes = Attributes::new();
///     attributes.insert("search.query_length".into(), query.len().into());
///     Ok(attributes)
/// });
/// ```
pub fn from_fn<T, F>(f: F) -> FnExtractor<F>
where
    T: ?Sized,
    F: Fn(&T) -> Result<Attributes, ExtractionError> + Send + Sync,
{
    FnExtractor(f)
}

impl<T, F> Extract<T> for FnExtractor<F>
where
    T: ?Sized,
    F: Fn(&T) -> Result<Attributes, ExtractionError> + Send + Sync,
{
    fn extract(&self, value: &T) -> Result<Attributes, ExtractionError> {
        (self.0)(value)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, ExtractionError> {
    Ok(serde_json::to_value(value)?)
}

/// `agent.input_length`: character count of the user's text.
///
/// The text is a `user_input` (or `prompt`) field of an object argument, or
/// else the first string argument. Missing text counts as zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct AgentInputAttributes;

impl AgentInputAttributes {
    fn user_input(value: &Value) -> Option<&str> {
        match value {
            Value::String(s) => Some(s),
            Value::Object(map) => ["user_input", "prompt"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str)),
            Value::Array(items) => items
                .iter()
                .find_map(|item| Self::user_input_field(item))
                .or_else(|| items.iter().find_map(Value::as_str)),
            _ => None,
        }
    }

    fn user_input_field(value: &Value) -> Option<&str> {
        value.get("user_input").and_then(Value::as_str)
    }
}

impl<T: Serialize + ?Sized> Extract<T> for AgentInputAttributes {
    fn extract(&self, value: &T) -> Result<Attributes, ExtractionError> {
        let json = to_json(value)?;
        let length = Self::user_input(&json).map_or(0, |s| s.chars().count());

        let mut attributes = Attributes::new();
        attributes.insert("agent.input_length".to_string(), length.into());
        Ok(attributes)
    }
}

/// `tool.id` and `tool.name` from the first object carrying `toolUseId`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolInputAttributes;

impl<T: Serialize + ?Sized> Extract<T> for ToolInputAttributes {
    fn extract(&self, value: &T) -> Result<Attributes, ExtractionError> {
        let json = to_json(value)?;
        let candidates: Vec<&Value> = match &json {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let mut attributes = Attributes::new();
        if let Some(info) = candidates
            .into_iter()
            .find(|v| v.get("toolUseId").is_some())
        {
            let field = |key: &str| match info.get(key) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            attributes.insert("tool.id".to_string(), field("toolUseId").into());
            attributes.insert("tool.name".to_string(), field("name").into());
        }
        Ok(attributes)
    }
}

/// `agent.model` and `agent.tokens` from a result's `metadata`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AgentOutputAttributes;

impl<T: Serialize + ?Sized> Extract<T> for AgentOutputAttributes {
    fn extract(&self, value: &T) -> Result<Attributes, ExtractionError> {
        let json = to_json(value)?;
        let mut attributes = Attributes::new();

        let metadata = match json.get("metadata") {
            None | Some(Value::Null) => return Ok(attributes),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(ExtractionError::Shape(format!(
                    "metadata is not an object: {other}"
                )))
            }
        };

        let model = metadata
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let tokens = metadata
            .get("usage")
            .and_then(|usage| usage.get("total_tokens"))
            .and_then(Value::as_i64)
            .unwrap_or(0);

        attributes.insert("agent.model".to_string(), model.into());
        attributes.insert("agent.tokens".to_string(), tokens.into());
        Ok(attributes)
    }
}

/// `tool.status` from a result's string `status` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolOutputAttributes;

impl<T: Serialize + ?Sized> Extract<T> for ToolOutputAttributes {
    fn extract(&self, value: &T) -> Result<Attributes, ExtractionError> {
        let json = to_json(value)?;
        let mut attributes = Attributes::new();
        if let Some(status) = json.get("status").and_then(Value::as_str) {
            attributes.insert("tool.status".to_string(), status.into());
        }
        Ok(attributes)
    }
}
