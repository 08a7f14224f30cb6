// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! DogStatsD client for a locally running agent.

use std::net::UdpSocket;

use async_trait::async_trait;

use super::client::{render_tags, MetricsClient, Tags};
use crate::error::SinkError;
use crate::telemetry::FinishedSpan;

/// Sends timings and counters as DogStatsD datagrams over UDP.
///
/// The socket is non-blocking: a full send buffer surfaces as a transport
/// error instead of stalling the instrumented call.
#[derive(Debug)]
pub struct StatsdClient {
    socket: UdpSocket,
    target: String,
}

impl StatsdClient {
    /// Bind an ephemeral local socket and connect it to `host:port`.
    pub fn new(host: &str, port: u16) -> Result<Self, SinkError> {
        let target = format!("{host}:{port}");
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        socket.connect(&target)?;
        Ok(Self { socket, target })
    }

    /// Address datagrams are sent to.
    pub fn target(&self) -> &str {
        &self.target
    }

    fn send(&self, line: &str) -> Result<(), SinkError> {
        self.socket
            .send(line.as_bytes())
            .map(|_| ())
            .map_err(|e| SinkError::Transport(format!("statsd send to {}: {e}", self.target)))
    }
}

/// Format a timing datagram: `metric:value|ms|#k:v,...`.
pub fn format_timing(metric: &str, value_ms: f64, tags: &Tags) -> String {
    with_tags(format!("{metric}:{value_ms}|ms"), tags)
}

/// Format a counter increment datagram: `metric:1|c|#k:v,...`.
pub fn format_count(metric: &str, tags: &Tags) -> String {
    with_tags(format!("{metric}:1|c"), tags)
}

fn with_tags(mut line: String, tags: &Tags) -> String {
    if !tags.is_empty() {
        line.push_str("|#");
        line.push_str(&render_tags(tags).join(","));
    }
    line
}

#[async_trait]
impl MetricsClient for StatsdClient {
    fn name(&self) -> &'static str {
        "dogstatsd"
    }

    fn timing(&self, metric: &str, value_ms: f64, tags: &Tags) -> Result<(), SinkError> {
        self.send(&format_timing(metric, value_ms, tags))
    }

    fn increment(&self, metric: &str, tags: &Tags) -> Result<(), SinkError> {
        self.send(&format_count(metric, tags))
    }

    fn span_closed(&self, _span: &FinishedSpan) -> Result<(), SinkError> {
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        // Datagrams are sent immediately.
        Ok(())
    }
}
