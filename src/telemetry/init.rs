// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log subscriber setup.

use std::io;
use std::time::Instant;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::otlp::OtlpConfig;

/// How log output is formatted and filtered.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Log when instrumented call spans open and close.
    pub include_span_events: bool,

    pub include_file_line: bool,

    pub include_target: bool,

    pub ansi_colors: bool,

    pub compact: bool,

    /// Custom filter directive (overrides default_level and RUST_LOG).
    pub filter_directive: Option<String>,

    /// Export spans over OTLP. Needs the `otel` feature.
    pub otlp: Option<OtlpConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_span_events: false,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            compact: true,
            filter_directive: None,
            otlp: None,
        }
    }
}

impl LoggingConfig {
    /// Verbose output, with a line for every span close.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            include_file_line: true,
            compact: false,
            ..Self::default()
        }
    }

    /// Warnings only, plain text.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_target: false,
            ansi_colors: false,
            ..Self::default()
        }
    }

    /// Everything from this crate, no colors.
    pub fn testing() -> Self {
        Self {
            default_level: Level::TRACE,
            include_span_events: true,
            include_file_line: true,
            ansi_colors: false,
            compact: false,
            filter_directive: Some("agentmeter=trace".to_string()),
            ..Self::default()
        }
    }

    /// Pick a preset from command-line verbosity flags.
    pub fn from_verbosity(verbose: bool, debug: bool) -> Self {
        match (verbose, debug) {
            (_, true) => Self::development().with_filter("agentmeter=trace,info"),
            (true, false) => Self::default().with_level(Level::DEBUG),
            (false, false) => Self::default().with_level(Level::WARN),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    pub fn with_otlp(mut self, otlp: OtlpConfig) -> Self {
        self.otlp = Some(otlp);
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Returned by [`init_logging`]; logs the session length when dropped and
/// flushes exported spans.
///
/// Keep this guard alive for the duration of your program.
pub struct LoggingGuard {
    started: Instant,
    exporting: bool,
}

impl LoggingGuard {
    /// Whether spans are being exported over OTLP.
    pub fn is_exporting(&self) -> bool {
        self.exporting
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        tracing::debug!(uptime = ?self.started.elapsed(), "Logging shut down");
        #[cfg(feature = "otel")]
        if self.exporting {
            super::otlp::shutdown();
        }
    }
}

/// Install the global log subscriber.
///
/// Call once at startup. A second call returns an error because a global
/// subscriber is already set.
///
/// ```rust,ignore
/// use agentmeter::telemetry::{init_logging, LoggingConfig};
///
/// let _guard = init_logging(&LoggingConfig::development())?;
/// ```
pub fn init_logging(config: &LoggingConfig) -> io::Result<LoggingGuard> {
    let span_events = if config.include_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    #[cfg(feature = "otel")]
    let otel_layer = config
        .otlp
        .as_ref()
        .map(super::otlp::trace_layer)
        .transpose()
        .map_err(|e| io::Error::other(e.to_string()))?;
    #[cfg(not(feature = "otel"))]
    let otel_layer: Option<tracing_subscriber::layer::Identity> = None;
    let exporting = otel_layer.is_some();

    let registry = tracing_subscriber::registry()
        .with(config.env_filter())
        .with(otel_layer);
    let result = if config.compact {
        registry.with(fmt_layer.compact()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };
    result.map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    match &config.otlp {
        Some(otlp) if exporting => {
            tracing::info!(
                endpoint = %otlp.endpoint,
                service = %otlp.service_name,
                "Exporting spans over OTLP"
            );
        }
        Some(_) => tracing::warn!("OTLP export requested but the otel feature is not enabled"),
        None => {}
    }

    Ok(LoggingGuard {
        started: Instant::now(),
        exporting,
    })
}
