// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agentless submission to the Datadog metrics series API.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::client::{render_tags, MetricsClient, Tags};
use crate::error::SinkError;
use crate::telemetry::FinishedSpan;

/// Path of the series endpoint below the API base URL.
pub const SERIES_PATH: &str = "/api/v1/series";

/// Points buffered before a background submission is attempted.
const FLUSH_THRESHOLD: usize = 500;

/// Hard cap on buffered points; the oldest are dropped past it.
const MAX_BUFFERED: usize = 20_000;

/// Interval reported for count points, in seconds.
const COUNT_INTERVAL_SECS: u64 = 10;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One point of the series payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub metric: String,
    pub points: Vec<(i64, f64)>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SeriesPayload<'a> {
    series: &'a [SeriesPoint],
}

/// Where and how to submit.
#[derive(Debug)]
struct SeriesTarget {
    http: Client,
    url: String,
    api_key: String,
    app_key: Option<String>,
}

/// Buffers measurements and posts them to `https://api.<site>/api/v1/series`.
///
/// Points ship on [`flush`](MetricsClient::flush), and in the background once
/// the buffer passes a threshold while a tokio runtime is running. Nothing is
/// sent on drop: synchronous callers must flush explicitly, for example with
/// [`Sink::flush_blocking`](crate::sink::Sink::flush_blocking).
#[derive(Debug)]
pub struct HttpSeriesClient {
    target: Arc<SeriesTarget>,
    buffer: Arc<Mutex<VecDeque<SeriesPoint>>>,
    submitting: Arc<AtomicBool>,
}

impl HttpSeriesClient {
    /// Create a client for `base_url` (e.g. `https://api.datadoghq.com`).
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        app_key: Option<String>,
    ) -> Result<Self, SinkError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SinkError::NotConfigured("API key is empty".to_string()));
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            target: Arc::new(SeriesTarget {
                http,
                url: format!("{}{}", base_url.trim_end_matches('/'), SERIES_PATH),
                api_key,
                app_key: app_key.filter(|k| !k.trim().is_empty()),
            }),
            buffer: Arc::new(Mutex::new(VecDeque::new())),
            submitting: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Full submission URL.
    pub fn url(&self) -> &str {
        &self.target.url
    }

    /// Number of points waiting to be submitted.
    pub fn buffered(&self) -> usize {
        lock(&self.buffer).len()
    }

    /// Copy of the points waiting to be submitted.
    pub fn pending(&self) -> Vec<SeriesPoint> {
        lock(&self.buffer).iter().cloned().collect()
    }

    fn push(&self, point: SeriesPoint) {
        let len = {
            let mut buffer = lock(&self.buffer);
            if buffer.len() >= MAX_BUFFERED {
                buffer.pop_front();
            }
            buffer.push_back(point);
            buffer.len()
        };
        if len >= FLUSH_THRESHOLD {
            self.spawn_submit();
        }
    }

    /// Ship the buffer in the background when running inside a tokio runtime.
    fn spawn_submit(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if self.submitting.swap(true, Ordering::AcqRel) {
            return;
        }
        let target = Arc::clone(&self.target);
        let buffer = Arc::clone(&self.buffer);
        let submitting = Arc::clone(&self.submitting);
        handle.spawn(async move {
            if let Err(e) = drain_and_submit(&target, &buffer).await {
                warn!(error = %e, "Background metrics submission failed");
            }
            submitting.store(false, Ordering::Release);
        });
    }
}

fn lock(buffer: &Mutex<VecDeque<SeriesPoint>>) -> MutexGuard<'_, VecDeque<SeriesPoint>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn drain_and_submit(
    target: &SeriesTarget,
    buffer: &Mutex<VecDeque<SeriesPoint>>,
) -> Result<(), SinkError> {
    let points: Vec<SeriesPoint> = std::mem::take(&mut *lock(buffer)).into();
    if points.is_empty() {
        return Ok(());
    }

    match submit(target, &points).await {
        Ok(()) => {
            debug!(points = points.len(), url = %target.url, "Submitted metrics series");
            Ok(())
        }
        Err(e) => {
            if e.is_retryable() {
                let mut buffer = lock(buffer);
                let mut requeued = VecDeque::from(points);
                requeued.append(&mut buffer);
                let excess = requeued.len().saturating_sub(MAX_BUFFERED);
                requeued.drain(..excess);
                *buffer = requeued;
            }
            Err(e)
        }
    }
}

async fn submit(target: &SeriesTarget, points: &[SeriesPoint]) -> Result<(), SinkError> {
    let mut request = target
        .http
        .post(&target.url)
        .header("DD-API-KEY", &target.api_key)
        .header("content-type", "application/json")
        .json(&SeriesPayload { series: points });
    if let Some(app_key) = &target.app_key {
        request = request.header("DD-APPLICATION-KEY", app_key);
    }

    request.send().await?.error_for_status()?;
    Ok(())
}

#[async_trait]
impl MetricsClient for HttpSeriesClient {
    fn name(&self) -> &'static str {
        "http-series"
    }

    fn timing(&self, metric: &str, value_ms: f64, tags: &Tags) -> Result<(), SinkError> {
        self.push(SeriesPoint {
            metric: metric.to_string(),
            points: vec![(Utc::now().timestamp(), value_ms)],
            kind: "gauge",
            interval: None,
            tags: render_tags(tags),
        });
        Ok(())
    }

    fn increment(&self, metric: &str, tags: &Tags) -> Result<(), SinkError> {
        self.push(SeriesPoint {
            metric: metric.to_string(),
            points: vec![(Utc::now().timestamp(), 1.0)],
            kind: "count",
            interval: Some(COUNT_INTERVAL_SECS),
            tags: render_tags(tags),
        });
        Ok(())
    }

    fn span_closed(&self, _span: &FinishedSpan) -> Result<(), SinkError> {
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        drain_and_submit(&self.target, &self.buffer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_tags() -> Tags {
        Tags::from([("tool".to_string(), "add".to_string())])
    }

    #[test]
    fn test_requires_api_key() {
        let err = HttpSeriesClient::new("https://api.datadoghq.com", "  ", None).unwrap_err();
        assert!(matches!(err, SinkError::NotConfigured(_)));
    }

    #[test]
    fn test_url() {
        let client = HttpSeriesClient::new("https://api.datadoghq.eu/", "key", None).unwrap();
        assert_eq!(client.url(), "https://api.datadoghq.eu/api/v1/series");
    }

    #[test]
    fn test_buffers_points() {
        let client = HttpSeriesClient::new("https://api.datadoghq.com", "key", None).unwrap();
        client.timing("tool.response_time", 4.0, &tool_tags()).unwrap();
        client.increment("tool.calls", &tool_tags()).unwrap();

        let pending = client.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].kind, "gauge");
        assert_eq!(pending[1].kind, "count");
        assert_eq!(pending[1].interval, Some(COUNT_INTERVAL_SECS));
        assert_eq!(pending[1].tags, vec!["tool:add"]);
    }

    #[test]
    fn test_buffer_is_capped_oldest_first() {
        let client = HttpSeriesClient::new("https://api.datadoghq.com", "key", None).unwrap();
        for i in 0..MAX_BUFFERED + 5 {
            client.timing(&format!("m{i}"), 1.0, &Tags::new()).unwrap();
        }
        let pending = client.pending();
        assert_eq!(pending.len(), MAX_BUFFERED);
        assert_eq!(pending[0].metric, "m5");
    }

    #[test]
    fn test_payload_shape() {
        let point = SeriesPoint {
            metric: "tool.calls".to_string(),
            points: vec![(1_700_000_000, 1.0)],
            kind: "count",
            interval: Some(10),
            tags: vec!["tool:add".to_string()],
        };
        let json = serde_json::to_value(SeriesPayload { series: &[point] }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "series": [{
                    "metric": "tool.calls",
                    "points": [[1_700_000_000, 1.0]],
                    "type": "count",
                    "interval": 10,
                    "tags": ["tool:add"]
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_flush_empty_is_ok() {
        let client = HttpSeriesClient::new("http://127.0.0.1:1", "key", None).unwrap();
        assert!(client.flush().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_flush_requeues() {
        // Nothing listens on port 1, so the connection is refused.
        let client = HttpSeriesClient::new("http://127.0.0.1:1", "key", None).unwrap();
        client.increment("tool.calls", &tool_tags()).unwrap();

        let err = client.flush().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(client.buffered(), 1);
    }
}
