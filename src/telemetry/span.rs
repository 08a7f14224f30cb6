// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Measurement spans.
//!
//! A [`MeasurementSpan`] times one invocation, collects attributes while it runs
//! and, when closed, emits exactly one timing measurement (and, for tools, one
//! call counter) through the [`Sink`]. Closing is idempotent and happens on every
//! exit path: an explicit close, a panic unwinding through the call, or the
//! owning future being dropped before completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{field, info_span, Span};

use super::attributes::{AttributeValue, Attributes};
use super::descriptor::{CallKind, OperationDescriptor};
use super::span_id::SpanId;
use crate::sink::{Sink, Tags};

/// Attribute key for the failure kind.
pub const ERROR_TYPE: &str = "error.type";

/// Attribute key for the failure message.
pub const ERROR_MESSAGE: &str = "error.message";

/// Terminal status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Success,
    Error,
}

impl SpanStatus {
    /// Tag value for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Summary of a closed span, handed to the sink's metrics client.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedSpan {
    pub id: SpanId,
    pub operation: String,
    pub resource: String,
    pub service: String,
    pub kind: CallKind,
    pub status: SpanStatus,
    #[serde(serialize_with = "serialize_duration_ms", rename = "duration_ms")]
    pub duration: Duration,
    pub attributes: Attributes,
}

impl FinishedSpan {
    /// Look up an attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

/// One timed unit of work.
pub struct MeasurementSpan {
    id: SpanId,
    operation: String,
    resource: String,
    service: String,
    kind: CallKind,
    tags: Tags,
    sink: Arc<Sink>,
    start: Instant,
    attributes: Attributes,
    status: Option<SpanStatus>,
    span: Span,
}

impl MeasurementSpan {
    /// Open a span for `descriptor`.
    ///
    /// Never fails. The service falls back to the sink's default service when
    /// the descriptor does not name one.
    pub fn start(descriptor: &OperationDescriptor, kind: CallKind, sink: Arc<Sink>) -> Self {
        let id = SpanId::new();
        let service = descriptor
            .service()
            .map(str::to_string)
            .unwrap_or_else(|| sink.default_service());
        let resource = descriptor.resource_or_name().to_string();

        let span = info_span!(
            "instrumented_call",
            operation = %descriptor.name(),
            resource = %resource,
            service = %service,
            kind = %kind,
            span_id = %id.short(),
            status = field::Empty,
            duration_ms = field::Empty,
            error_type = field::Empty,
            error_message = field::Empty,
        );

        Self {
            id,
            operation: descriptor.name().to_string(),
            resource,
            service,
            kind,
            tags: descriptor.tags().clone(),
            sink,
            start: Instant::now(),
            attributes: Attributes::new(),
            status: None,
            span,
        }
    }

    /// Span identifier.
    pub fn id(&self) -> SpanId {
        self.id
    }

    /// The underlying tracing span.
    pub fn tracing_span(&self) -> &Span {
        &self.span
    }

    /// Enter the tracing span context.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    /// Elapsed time so far.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Whether the span has been closed.
    pub fn is_closed(&self) -> bool {
        self.status.is_some()
    }

    /// Current attributes.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Attach an attribute. Inert once the span is closed.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        if self.is_closed() {
            return;
        }
        self.attributes.insert(key.into(), value.into());
    }

    /// Attach several attributes at once.
    pub fn extend_attributes(&mut self, attributes: Attributes) {
        if self.is_closed() {
            return;
        }
        self.attributes.extend(attributes);
    }

    /// Close the span with `status`, merging `extra` attributes first.
    ///
    /// Emits one `<prefix>.response_time` timing tagged with the status and,
    /// for tool spans, one `<prefix>.calls` increment. Returns `false` without
    /// emitting anything if the span was already closed.
    pub fn close(&mut self, status: SpanStatus, extra: Attributes) -> bool {
        if self.is_closed() {
            return false;
        }
        self.attributes.extend(extra);

        let duration = self.start.elapsed();
        let duration_ms = duration.as_secs_f64() * 1000.0;
        let prefix = self.kind.metric_prefix();

        // An extracted status (e.g. a tool's own "status" field) is kept.
        self.attributes
            .entry(format!("{prefix}.status"))
            .or_insert_with(|| status.as_str().into());
        self.attributes.insert(
            format!("{prefix}.duration_seconds"),
            duration.as_secs_f64().into(),
        );
        self.status = Some(status);

        self.span.record("status", status.as_str());
        self.span.record("duration_ms", duration_ms);
        if let Some(kind) = self.attributes.get(ERROR_TYPE) {
            self.span.record("error_type", kind.to_string().as_str());
        }
        if let Some(message) = self.attributes.get(ERROR_MESSAGE) {
            self.span.record("error_message", message.to_string().as_str());
        }

        let mut tags = self.tags.clone();
        tags.insert("service".to_string(), self.service.clone());
        tags.insert("operation".to_string(), self.operation.clone());
        tags.insert("resource".to_string(), self.resource.clone());
        tags.insert("status".to_string(), status.as_str().to_string());
        self.sink
            .record_timing(&self.kind.timing_metric(), duration_ms, &tags);

        if self.kind.counts_calls() {
            let mut tags = self.tags.clone();
            tags.insert("service".to_string(), self.service.clone());
            tags.insert(prefix.to_string(), self.resource.clone());
            self.sink.record_count(&self.kind.counter_metric(), &tags);
        }

        let finished = FinishedSpan {
            id: self.id,
            operation: self.operation.clone(),
            resource: self.resource.clone(),
            service: self.service.clone(),
            kind: self.kind,
            status,
            duration,
            attributes: self.attributes.clone(),
        };
        self.sink.record_span(&finished);

        tracing::debug!(
            parent: &self.span,
            attributes = ?self.attributes,
            "Instrumented call complete"
        );
        true
    }
}

impl Drop for MeasurementSpan {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        // Unwinding through the call, or the owning future was dropped.
        let (kind, message) = if std::thread::panicking() {
            ("panic", "call panicked before completion")
        } else {
            ("cancelled", "call was cancelled before completion")
        };
        let mut extra = Attributes::new();
        extra.insert(ERROR_TYPE.to_string(), kind.into());
        extra.insert(ERROR_MESSAGE.to_string(), message.into());
        self.close(SpanStatus::Error, extra);
    }
}

impl std::fmt::Debug for MeasurementSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementSpan")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("resource", &self.resource)
            .field("service", &self.service)
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("attributes", &self.attributes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedSinkConfig;
    use crate::sink::{EmissionKind, MemoryClient};

    fn memory_sink() -> (Arc<Sink>, Arc<MemoryClient>) {
        let client = Arc::new(MemoryClient::new());
        let sink = Arc::new(Sink::with_client(ResolvedSinkConfig::default(), client.clone()));
        (sink, client)
    }

    #[test]
    fn test_span_lifecycle() {
        let (sink, client) = memory_sink();
        let mut span = MeasurementSpan::start(
            &OperationDescriptor::new("agent_call"),
            CallKind::Agent,
            sink,
        );
        span.set_attribute("agent.input_length", 12usize);
        assert!(span.close(SpanStatus::Success, Attributes::new()));

        let emissions = client.emissions();
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].metric, "agent.response_time");
        assert_eq!(emissions[0].tags.get("status").map(String::as_str), Some("success"));

        let spans = client.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, SpanStatus::Success);
        assert_eq!(
            spans[0].attribute("agent.input_length"),
            Some(&AttributeValue::Int(12))
        );
        assert_eq!(
            spans[0].attribute("agent.status").and_then(AttributeValue::as_str),
            Some("success")
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let (sink, client) = memory_sink();
        let mut span =
            MeasurementSpan::start(&OperationDescriptor::new("agent_call"), CallKind::Agent, sink);
        assert!(span.close(SpanStatus::Success, Attributes::new()));
        assert!(!span.close(SpanStatus::Error, Attributes::new()));
        drop(span);

        assert_eq!(client.emissions().len(), 1);
        assert_eq!(client.spans()[0].status, SpanStatus::Success);
    }

    #[test]
    fn test_attributes_inert_after_close() {
        let (sink, _client) = memory_sink();
        let mut span =
            MeasurementSpan::start(&OperationDescriptor::new("agent_call"), CallKind::Agent, sink);
        span.close(SpanStatus::Success, Attributes::new());
        span.set_attribute("late", "value");
        assert!(span.attributes().get("late").is_none());
    }

    #[test]
    fn test_tool_span_counts_calls() {
        let (sink, client) = memory_sink();
        let descriptor = OperationDescriptor::new("tool.search").with_resource("search");
        let mut span = MeasurementSpan::start(&descriptor, CallKind::Tool, sink);
        span.close(SpanStatus::Success, Attributes::new());

        let emissions = client.emissions();
        assert_eq!(emissions.len(), 2);
        assert!(matches!(emissions[0].kind, EmissionKind::Timing { .. }));
        assert_eq!(emissions[1].metric, "tool.calls");
        assert_eq!(emissions[1].tags.get("tool").map(String::as_str), Some("search"));
    }

    #[test]
    fn test_drop_without_close_records_cancelled() {
        let (sink, client) = memory_sink();
        let span =
            MeasurementSpan::start(&OperationDescriptor::new("agent_call"), CallKind::Agent, sink);
        drop(span);

        let spans = client.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, SpanStatus::Error);
        assert_eq!(
            spans[0].attribute(ERROR_TYPE).and_then(AttributeValue::as_str),
            Some("cancelled")
        );
        assert_eq!(client.emissions().len(), 1);
    }

    #[test]
    fn test_descriptor_service_overrides_default() {
        let (sink, client) = memory_sink();
        let descriptor = OperationDescriptor::new("agent_call").with_service("memory-agent");
        let mut span = MeasurementSpan::start(&descriptor, CallKind::Agent, sink);
        span.close(SpanStatus::Success, Attributes::new());

        assert_eq!(
            client.emissions()[0].tags.get("service").map(String::as_str),
            Some("memory-agent")
        );
    }
}
