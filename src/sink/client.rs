// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics backend client abstraction.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::SinkError;
use crate::telemetry::FinishedSpan;

/// Tags attached to a measurement, rendered as `key:value` by most backends.
pub type Tags = BTreeMap<String, String>;

/// A backend that receives timings, counters and finished spans.
///
/// Implementations should not block for long: the sink calls them inline on
/// the instrumented call path. Errors are reported back to the sink, which
/// logs and discards them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Record a duration measurement in milliseconds.
    fn timing(&self, metric: &str, value_ms: f64, tags: &Tags) -> Result<(), SinkError>;

    /// Increment a counter by one.
    fn increment(&self, metric: &str, tags: &Tags) -> Result<(), SinkError>;

    /// Observe a closed span. Backends without trace support ignore it.
    fn span_closed(&self, span: &FinishedSpan) -> Result<(), SinkError>;

    /// Ship anything buffered.
    async fn flush(&self) -> Result<(), SinkError>;
}

/// Client that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopClient;

#[async_trait]
impl MetricsClient for NoopClient {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn timing(&self, _metric: &str, _value_ms: f64, _tags: &Tags) -> Result<(), SinkError> {
        Ok(())
    }

    fn increment(&self, _metric: &str, _tags: &Tags) -> Result<(), SinkError> {
        Ok(())
    }

    fn span_closed(&self, _span: &FinishedSpan) -> Result<(), SinkError> {
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Render tags as `key:value` strings, the form used by statsd and the series API.
///
/// Characters that would break the statsd line format are replaced by `_`.
pub fn render_tags(tags: &Tags) -> Vec<String> {
    tags.iter()
        .map(|(k, v)| format!("{}:{}", sanitize(k), sanitize(v)))
        .collect()
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '|' | ',' | '#' | '\n' | '\r' => '_',
            _ => c,
        })
        .collect()
}
