// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Static metadata describing an instrumented operation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// What an instrumented call represents.
///
/// Built once when a callable is wrapped and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    name: String,
    resource: Option<String>,
    service: Option<String>,
    tags: BTreeMap<String, String>,
}

impl OperationDescriptor {
    /// Create a descriptor for the named operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: None,
            service: None,
            tags: BTreeMap::new(),
        }
    }

    /// Set the resource (defaults to the wrapped callable's identifier).
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Override the process-wide default service.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Add a static tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Operation name, e.g. `agent_call` or `tool.search`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit resource, if one was set.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Resource to report: the explicit one, else the operation name.
    pub fn resource_or_name(&self) -> &str {
        self.resource.as_deref().unwrap_or(&self.name)
    }

    /// Explicit service override, if one was set.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Static tags.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Fill in the resource when none was given explicitly.
    pub(crate) fn or_resource(mut self, resource: Option<String>) -> Self {
        if self.resource.is_none() {
            self.resource = resource;
        }
        self
    }
}

/// Kind of call being measured. Determines the metric prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// An agent's primary entry point.
    Agent,
    /// A tool exposed by an agent.
    Tool,
}

impl CallKind {
    /// Prefix of the metric and attribute names for this kind.
    pub fn metric_prefix(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Tool => "tool",
        }
    }

    /// Whether each call also increments `<prefix>.calls`.
    pub fn counts_calls(self) -> bool {
        matches!(self, Self::Tool)
    }

    /// Name of the timing metric, e.g. `tool.response_time`.
    pub fn timing_metric(self) -> String {
        format!("{}.response_time", self.metric_prefix())
    }

    /// Name of the call counter metric, e.g. `tool.calls`.
    pub fn counter_metric(self) -> String {
        format!("{}.calls", self.metric_prefix())
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric_prefix())
    }
}

/// Derive a readable identifier for a callable from its type name.
///
/// Function items yield their own name (`my_crate::tools::add` -> `add`);
/// closures have no usable name and yield `None`.
pub fn callable_identifier<F: ?Sized>() -> Option<String> {
    let full = std::any::type_name::<F>();
    let without_generics = full.split('<').next().unwrap_or(full);
    if without_generics.contains("{{closure}}") || without_generics.starts_with("dyn ") {
        return None;
    }
    without_generics
        .rsplit("::")
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}
