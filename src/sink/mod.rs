// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry sink.
//!
//! The sink owns the process-wide telemetry settings (default service and
//! environment, credentials, global tags) and the [`MetricsClient`] that
//! measurements are forwarded to. All emission is infallible for callers:
//! backend errors are logged and dropped.
//!
//! # Backend selection
//!
//! - API key present and agentless enabled: [`HttpSeriesClient`]
//! - agentless disabled: [`StatsdClient`] pointed at the local agent
//! - otherwise: [`MemoryClient`], buffering locally
//!
//! # Usage
//!
//! ```rust,ignore
//! use agentmeter::config::SinkOptions;
//!
//! agentmeter::initialize(&SinkOptions::new("support-agent", "prod"));
//! let sink = agentmeter::sink::global();
//! ```

mod client;
mod http;
mod memory;
mod statsd;

pub use client::{render_tags, MetricsClient, NoopClient, Tags};
pub use http::{HttpSeriesClient, SeriesPoint, SERIES_PATH};
pub use memory::{
    Emission, EmissionKind, Histogram, MemoryClient, MetricsSnapshot, TimingStats,
    DEFAULT_CAPACITY,
};
pub use statsd::{format_count, format_timing, StatsdClient};

#[cfg(test)]
pub use client::MockMetricsClient;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::config::{resolve_sink_config, ResolvedSinkConfig, SinkOptions};
use crate::error::SinkError;
use crate::telemetry::FinishedSpan;

/// Which kind of backend the sink currently forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Statsd,
    Http,
    Noop,
    /// A client supplied by the caller; kept across re-initialization.
    Custom,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::Statsd => "dogstatsd",
            Self::Http => "http-series",
            Self::Noop => "noop",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

struct SinkState {
    config: ResolvedSinkConfig,
    client: Arc<dyn MetricsClient>,
    backend: Backend,
    memory: Option<Arc<MemoryClient>>,
}

impl SinkState {
    fn memory(config: ResolvedSinkConfig) -> Self {
        let memory = Arc::new(MemoryClient::new());
        Self {
            config,
            client: memory.clone(),
            backend: Backend::Memory,
            memory: Some(memory),
        }
    }

    /// Build the state for `config`, falling back to memory buffering.
    fn build(config: ResolvedSinkConfig) -> Self {
        if config.agentless && config.has_credentials() {
            let api_key = config.api_key.clone().unwrap_or_default();
            match HttpSeriesClient::new(&config.api_base_url(), api_key, config.app_key.clone()) {
                Ok(client) => {
                    return Self {
                        config,
                        client: Arc::new(client),
                        backend: Backend::Http,
                        memory: None,
                    }
                }
                Err(e) => warn!(error = %e, "Could not build series client, buffering locally"),
            }
        } else if !config.agentless {
            match StatsdClient::new(&config.statsd_host, config.statsd_port) {
                Ok(client) => {
                    return Self {
                        config,
                        client: Arc::new(client),
                        backend: Backend::Statsd,
                        memory: None,
                    }
                }
                Err(e) => warn!(error = %e, "Could not reach DogStatsD, buffering locally"),
            }
        }
        Self::memory(config)
    }
}

/// Process-wide telemetry configuration plus the active metrics client.
pub struct Sink {
    state: RwLock<SinkState>,
    failures: AtomicU64,
}

impl Sink {
    /// A sink with default settings that buffers in memory.
    pub fn new() -> Self {
        Self::from_state(SinkState::memory(ResolvedSinkConfig::default()))
    }

    /// A sink that forwards to `client`, keeping it across re-initialization.
    pub fn with_client(config: ResolvedSinkConfig, client: Arc<dyn MetricsClient>) -> Self {
        Self::from_state(SinkState {
            config,
            client,
            backend: Backend::Custom,
            memory: None,
        })
    }

    /// A sink that discards every measurement.
    pub fn disabled() -> Self {
        Self::from_state(SinkState {
            config: ResolvedSinkConfig::default(),
            client: Arc::new(NoopClient),
            backend: Backend::Noop,
            memory: None,
        })
    }

    fn from_state(state: SinkState) -> Self {
        Self {
            state: RwLock::new(state),
            failures: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SinkState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// (Re)configure the sink from explicit options and the environment.
    ///
    /// Never fails. Missing credentials select local buffering. Safe to call
    /// repeatedly; the latest call wins.
    pub fn initialize(&self, options: &SinkOptions) -> ResolvedSinkConfig {
        self.initialize_resolved(resolve_sink_config(options))
    }

    /// (Re)configure the sink from an already resolved configuration.
    ///
    /// The new state is built completely before the write lock is taken.
    /// A caller-supplied client is kept; only the settings change.
    pub fn initialize_resolved(&self, config: ResolvedSinkConfig) -> ResolvedSinkConfig {
        let custom = {
            let state = self.read();
            (state.backend == Backend::Custom).then(|| state.client.clone())
        };
        let next = match custom {
            Some(client) => SinkState {
                config: config.clone(),
                client,
                backend: Backend::Custom,
                memory: None,
            },
            None => SinkState::build(config.clone()),
        };
        let backend = next.backend;

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;

        info!(
            service = %config.service,
            env = %config.env,
            backend = %backend,
            ml_app = %config.ml_app,
            "Telemetry sink initialized"
        );
        config
    }

    /// Current settings.
    pub fn config(&self) -> ResolvedSinkConfig {
        self.read().config.clone()
    }

    /// Service attributed to spans that do not name one.
    pub fn default_service(&self) -> String {
        self.read().config.service.clone()
    }

    /// Environment tag applied to every measurement.
    pub fn default_env(&self) -> String {
        self.read().config.env.clone()
    }

    /// Active backend.
    pub fn backend(&self) -> Backend {
        self.read().backend
    }

    /// The in-memory buffer, when buffering locally.
    pub fn memory(&self) -> Option<Arc<MemoryClient>> {
        self.read().memory.clone()
    }

    /// Client and merged tags, read under one lock so they stay consistent.
    fn prepare(&self, tags: &Tags) -> (Arc<dyn MetricsClient>, Tags) {
        let state = self.read();
        let mut merged = state.config.tags.clone();
        merged.insert("service".to_string(), state.config.service.clone());
        merged.insert("env".to_string(), state.config.env.clone());
        merged.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        (state.client.clone(), merged)
    }

    /// Emit a timing in milliseconds. Errors are logged, never returned.
    pub fn record_timing(&self, metric: &str, duration_ms: f64, tags: &Tags) {
        let (client, tags) = self.prepare(tags);
        if let Err(e) = client.timing(metric, duration_ms, &tags) {
            self.report_failure(client.name(), metric, &e);
        }
    }

    /// Increment a counter by one. Errors are logged, never returned.
    pub fn record_count(&self, metric: &str, tags: &Tags) {
        let (client, tags) = self.prepare(tags);
        if let Err(e) = client.increment(metric, &tags) {
            self.report_failure(client.name(), metric, &e);
        }
    }

    /// Hand a closed span to the client.
    pub fn record_span(&self, span: &FinishedSpan) {
        let client = self.read().client.clone();
        if let Err(e) = client.span_closed(span) {
            self.report_failure(client.name(), &span.operation, &e);
        }
    }

    /// Ship anything the client has buffered.
    pub async fn flush(&self) {
        let client = self.read().client.clone();
        if let Err(e) = client.flush().await {
            warn!(backend = client.name(), error = %e, "Telemetry flush failed");
        }
    }

    /// Ship buffered measurements from synchronous code.
    ///
    /// The HTTP client only submits in the background when a tokio runtime is
    /// running, so sync-only callers should call this before exiting. It drives
    /// [`flush`](Self::flush) on a temporary current-thread runtime. Inside a
    /// runtime it logs a warning and does nothing; await `flush` there instead.
    pub fn flush_blocking(&self) {
        if tokio::runtime::Handle::try_current().is_ok() {
            warn!("flush_blocking called inside a tokio runtime, use flush().await");
            return;
        }
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.flush()),
            Err(e) => warn!(error = %e, "Could not start a runtime to flush telemetry"),
        }
    }

    /// Number of emission failures swallowed so far.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    // Logs the first failure and then every hundredth.
    fn report_failure(&self, backend: &str, metric: &str, error: &SinkError) {
        let seen = self.failures.fetch_add(1, Ordering::Relaxed);
        if seen % 100 == 0 {
            warn!(
                backend,
                metric,
                error = %error,
                failures = seen + 1,
                "Telemetry emission failed"
            );
        }
    }
}

impl Default for Sink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Sink")
            .field("config", &state.config)
            .field("backend", &state.backend)
            .finish()
    }
}

static GLOBAL_SINK: Lazy<Arc<Sink>> = Lazy::new(|| Arc::new(Sink::new()));

/// The process-wide sink. Buffers in memory until [`initialize`] is called.
pub fn global() -> Arc<Sink> {
    Arc::clone(&GLOBAL_SINK)
}

/// Configure the process-wide sink. Idempotent; the latest call wins.
pub fn initialize(options: &SinkOptions) -> ResolvedSinkConfig {
    GLOBAL_SINK.initialize(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SERVICE;

    fn no_credentials() -> ResolvedSinkConfig {
        ResolvedSinkConfig {
            service: "test-agent".to_string(),
            env: "test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_sink_buffers_in_memory() {
        let sink = Sink::new();
        assert_eq!(sink.backend(), Backend::Memory);
        assert!(sink.memory().is_some());
        assert_eq!(sink.default_service(), DEFAULT_SERVICE);
    }

    #[test]
    fn test_initialize_without_credentials_degrades() {
        let sink = Sink::new();
        let config = sink.initialize_resolved(no_credentials());
        assert_eq!(config.service, "test-agent");
        assert_eq!(sink.backend(), Backend::Memory);

        sink.record_timing("agent.response_time", 3.0, &Tags::new());
        let memory = sink.memory().unwrap();
        assert_eq!(memory.emissions().len(), 1);
    }

    #[test]
    fn test_initialize_with_credentials_selects_http() {
        let sink = Sink::new();
        sink.initialize_resolved(ResolvedSinkConfig {
            api_key: Some("abc".to_string()),
            ..no_credentials()
        });
        assert_eq!(sink.backend(), Backend::Http);
        assert!(sink.memory().is_none());
    }

    #[test]
    fn test_initialize_agent_mode_selects_statsd() {
        let sink = Sink::new();
        sink.initialize_resolved(ResolvedSinkConfig {
            agentless: false,
            ..no_credentials()
        });
        assert_eq!(sink.backend(), Backend::Statsd);
    }

    #[test]
    fn test_reinitialize_updates_defaults() {
        let sink = Sink::new();
        sink.initialize_resolved(no_credentials());
        sink.initialize_resolved(ResolvedSinkConfig {
            service: "second".to_string(),
            env: "prod".to_string(),
            ..Default::default()
        });
        assert_eq!(sink.default_service(), "second");
        assert_eq!(sink.default_env(), "prod");
    }

    #[test]
    fn test_measurements_carry_service_env_and_global_tags() {
        let memory = Arc::new(MemoryClient::new());
        let mut config = no_credentials();
        config.tags.insert("team".to_string(), "ml".to_string());
        let sink = Sink::with_client(config, memory.clone());

        let tags = Tags::from([("status".to_string(), "success".to_string())]);
        sink.record_timing("tool.response_time", 1.0, &tags);

        let emitted = &memory.emissions()[0].tags;
        assert_eq!(emitted.get("service").map(String::as_str), Some("test-agent"));
        assert_eq!(emitted.get("env").map(String::as_str), Some("test"));
        assert_eq!(emitted.get("team").map(String::as_str), Some("ml"));
        assert_eq!(emitted.get("status").map(String::as_str), Some("success"));
    }

    #[test]
    fn test_caller_tags_override_service() {
        let memory = Arc::new(MemoryClient::new());
        let sink = Sink::with_client(no_credentials(), memory.clone());
        let tags = Tags::from([("service".to_string(), "override".to_string())]);
        sink.record_count("tool.calls", &tags);
        assert_eq!(
            memory.emissions()[0].tags.get("service").map(String::as_str),
            Some("override")
        );
    }

    #[test]
    fn test_custom_client_survives_reinitialize() {
        let memory = Arc::new(MemoryClient::new());
        let sink = Sink::with_client(no_credentials(), memory.clone());
        sink.initialize_resolved(ResolvedSinkConfig {
            api_key: Some("abc".to_string()),
            ..no_credentials()
        });
        assert_eq!(sink.backend(), Backend::Custom);
        sink.record_count("tool.calls", &Tags::new());
        assert_eq!(memory.emissions().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_errors_are_swallowed() {
        let mut client = MockMetricsClient::new();
        client.expect_name().return_const("failing");
        client
            .expect_timing()
            .times(2)
            .returning(|_, _, _| Err(SinkError::Transport("connection refused".to_string())));
        client
            .expect_increment()
            .times(1)
            .returning(|_, _| Err(SinkError::Transport("connection refused".to_string())));
        client
            .expect_flush()
            .times(1)
            .returning(|| Err(SinkError::Transport("connection refused".to_string())));

        let sink = Sink::with_client(no_credentials(), Arc::new(client));
        sink.record_timing("agent.response_time", 1.0, &Tags::new());
        sink.record_timing("agent.response_time", 2.0, &Tags::new());
        sink.record_count("tool.calls", &Tags::new());
        sink.flush().await;

        assert_eq!(sink.failure_count(), 3);
    }

    #[test]
    fn test_out_of_range_timing_never_fails() {
        let sink = Sink::new();
        sink.record_timing("tool.response_time", f64::INFINITY, &Tags::new());
        sink.record_timing("tool.response_time", 1e30, &Tags::new());
        sink.record_timing("tool.response_time", f64::NAN, &Tags::new());

        let memory = sink.memory().unwrap();
        assert_eq!(memory.timing_stats("tool.response_time").unwrap().count, 3);
        assert_eq!(sink.failure_count(), 0);
    }

    #[test]
    fn test_flush_blocking_outside_runtime() {
        // Nothing listens on port 1; the failed submission is requeued.
        let http = Arc::new(HttpSeriesClient::new("http://127.0.0.1:1", "key", None).unwrap());
        let sink = Sink::with_client(no_credentials(), http.clone());
        sink.record_count("tool.calls", &Tags::new());
        assert_eq!(http.buffered(), 1);

        sink.flush_blocking();
        assert_eq!(http.buffered(), 1);
    }

    #[test]
    fn test_flush_blocking_memory_is_noop() {
        let sink = Sink::new();
        sink.record_count("tool.calls", &Tags::new());
        sink.flush_blocking();
        assert_eq!(sink.memory().unwrap().counter("tool.calls"), 1);
    }

    #[tokio::test]
    async fn test_flush_blocking_inside_runtime_returns() {
        let sink = Sink::new();
        sink.flush_blocking();
        sink.flush().await;
    }

    #[test]
    fn test_disabled_sink_discards() {
        let sink = Sink::disabled();
        assert_eq!(sink.backend(), Backend::Noop);
        sink.record_timing("agent.response_time", 1.0, &Tags::new());
        assert_eq!(sink.failure_count(), 0);
    }

    #[test]
    fn test_concurrent_initialize_is_consistent() {
        let sink = Arc::new(Sink::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    sink.initialize_resolved(ResolvedSinkConfig {
                        service: format!("svc-{i}"),
                        env: format!("env-{i}"),
                        ..Default::default()
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let config = sink.config();
        let suffix = config.service.trim_start_matches("svc-");
        assert_eq!(config.env, format!("env-{suffix}"));
    }
}
