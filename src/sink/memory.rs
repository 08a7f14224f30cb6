// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Local in-memory metrics buffering.
//!
//! Used when no backend credentials are configured, and by tests that need
//! to inspect exactly what was emitted. Keeps a bounded log of raw emissions
//! and finished spans, plus per-metric aggregates.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::client::{MetricsClient, Tags};
use crate::error::SinkError;
use crate::telemetry::FinishedSpan;

/// Default number of raw emissions and spans retained.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// One measurement as handed to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub metric: String,
    pub kind: EmissionKind,
    pub tags: Tags,
    pub at: DateTime<Utc>,
}

/// What kind of measurement an [`Emission`] is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmissionKind {
    Timing { value_ms: f64 },
    Count { value: u64 },
}

/// Metrics client that keeps everything in memory.
#[derive(Debug)]
pub struct MemoryClient {
    capacity: usize,
    state: Mutex<MemoryState>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct MemoryState {
    emissions: VecDeque<Emission>,
    spans: VecDeque<FinishedSpan>,
    timings: HashMap<String, TimingStats>,
    counters: HashMap<String, u64>,
    dropped: u64,
}

impl MemoryClient {
    /// Create a client retaining up to [`DEFAULT_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a client retaining up to `capacity` emissions and spans.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(MemoryState::default()),
            start_time: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_emission(&self, state: &mut MemoryState, emission: Emission) {
        if state.emissions.len() >= self.capacity {
            state.emissions.pop_front();
            state.dropped += 1;
        }
        state.emissions.push_back(emission);
    }

    /// Raw emissions in arrival order (oldest may have been evicted).
    pub fn emissions(&self) -> Vec<Emission> {
        self.lock().emissions.iter().cloned().collect()
    }

    /// Raw emissions for one metric.
    pub fn emissions_for(&self, metric: &str) -> Vec<Emission> {
        self.lock()
            .emissions
            .iter()
            .filter(|e| e.metric == metric)
            .cloned()
            .collect()
    }

    /// Finished spans in close order.
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.lock().spans.iter().cloned().collect()
    }

    /// Aggregated timing statistics for a metric.
    pub fn timing_stats(&self, metric: &str) -> Option<TimingStats> {
        self.lock().timings.get(metric).cloned()
    }

    /// Total increments recorded for a counter.
    pub fn counter(&self, metric: &str) -> u64 {
        self.lock().counters.get(metric).copied().unwrap_or(0)
    }

    /// Time since the client was created.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of the aggregates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.lock();
        MetricsSnapshot {
            timings: state.timings.clone(),
            counters: state.counters.clone(),
            spans_recorded: state.spans.len(),
            dropped: state.dropped,
            uptime: self.uptime(),
        }
    }

    /// Clear everything.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = MemoryState::default();
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsClient for MemoryClient {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn timing(&self, metric: &str, value_ms: f64, tags: &Tags) -> Result<(), SinkError> {
        let mut state = self.lock();
        let success = tags.get("status").map(|s| s != "error").unwrap_or(true);
        state
            .timings
            .entry(metric.to_string())
            .or_default()
            .record(duration_from_ms(value_ms), success);
        self.push_emission(
            &mut state,
            Emission {
                metric: metric.to_string(),
                kind: EmissionKind::Timing { value_ms },
                tags: tags.clone(),
                at: Utc::now(),
            },
        );
        Ok(())
    }

    fn increment(&self, metric: &str, tags: &Tags) -> Result<(), SinkError> {
        let mut state = self.lock();
        *state.counters.entry(metric.to_string()).or_insert(0) += 1;
        self.push_emission(
            &mut state,
            Emission {
                metric: metric.to_string(),
                kind: EmissionKind::Count { value: 1 },
                tags: tags.clone(),
                at: Utc::now(),
            },
        );
        Ok(())
    }

    fn span_closed(&self, span: &FinishedSpan) -> Result<(), SinkError> {
        let mut state = self.lock();
        if state.spans.len() >= self.capacity {
            state.spans.pop_front();
        }
        state.spans.push_back(span.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Convert a reported millisecond value; negative and NaN become zero,
/// values too large for a `Duration` saturate.
fn duration_from_ms(value_ms: f64) -> Duration {
    Duration::try_from_secs_f64(value_ms.max(0.0) / 1000.0).unwrap_or(Duration::MAX)
}

/// Aggregated statistics for one timing metric.
#[derive(Debug, Clone)]
pub struct TimingStats {
    /// Number of measurements.
    pub count: u64,

    /// Measurements tagged `status:success` (or without a status).
    pub successes: u64,

    /// Measurements tagged `status:error`.
    pub failures: u64,

    /// Total duration.
    pub total_duration: Duration,

    /// Minimum duration.
    pub min_duration: Duration,

    /// Maximum duration.
    pub max_duration: Duration,

    /// Histogram buckets for latency distribution.
    pub histogram: Histogram,
}

impl TimingStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self {
            count: 0,
            successes: 0,
            failures: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    /// Record one measurement.
    pub fn record(&mut self, duration: Duration, success: bool) {
        self.count += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration = self.total_duration.saturating_add(duration);
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    /// Calculate average duration.
    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(self.total_duration.as_secs_f64() / self.count as f64)
                .unwrap_or(Duration::MAX)
        }
    }

    /// Calculate success rate (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            1.0
        } else {
            self.successes as f64 / self.count as f64
        }
    }
}

impl Default for TimingStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple histogram with fixed buckets for latency tracking.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Bucket boundaries in microseconds.
    buckets: Vec<u64>,

    /// Count per bucket (one extra for the overflow bucket).
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    /// Record a duration value.
    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[bucket_idx] += 1;
    }

    /// Get counts for each bucket.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Get bucket boundaries.
    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Approximate percentile as the upper bound of the bucket it falls in.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = if i < self.buckets.len() {
                    self.buckets[i]
                } else {
                    self.buckets.last().copied().unwrap_or(0) * 10
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    /// Get p50 (median) latency.
    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    /// Get p99 latency.
    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // Agent calls run from milliseconds to minutes: 1ms .. 60s
        Self::with_buckets(vec![
            1_000, 10_000, 100_000, 1_000_000, 5_000_000, 15_000_000, 60_000_000,
        ])
    }
}

/// A snapshot of the aggregates at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Timing statistics by metric name.
    pub timings: HashMap<String, TimingStats>,

    /// Counter totals by metric name.
    pub counters: HashMap<String, u64>,

    /// Finished spans currently retained.
    pub spans_recorded: usize,

    /// Raw emissions evicted because the buffer was full.
    pub dropped: u64,

    /// Uptime when snapshot was taken.
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Telemetry Report ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!("Spans: {}\n\n", self.spans_recorded));

        if !self.timings.is_empty() {
            report.push_str("Timings:\n");
            let mut names: Vec<_> = self.timings.keys().collect();
            names.sort();
            for name in names {
                let stats = &self.timings[name];
                report.push_str(&format!(
                    "  {}: {} calls, {:.1}% success, avg {:.2?}, p99 {:.2?}\n",
                    name,
                    stats.count,
                    stats.success_rate() * 100.0,
                    stats.avg_duration(),
                    stats.histogram.p99()
                ));
            }
            report.push('\n');
        }

        if !self.counters.is_empty() {
            report.push_str("Counters:\n");
            let mut names: Vec<_> = self.counters.keys().collect();
            names.sort();
            for name in names {
                report.push_str(&format!("  {}: {}\n", name, self.counters[name]));
            }
        }

        report
    }
}
