// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OTLP trace export.
//!
//! With the `otel` feature, every `tracing` span (including each
//! `instrumented_call`) is also exported over OTLP/HTTP to a collector.
//! Without the feature the settings are accepted but nothing is exported.

/// Environment variable naming the collector's trace endpoint.
pub const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Trace endpoint of a collector on the local host.
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318/v1/traces";

/// Where spans are exported and which service they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtlpConfig {
    pub service_name: String,
    pub endpoint: String,
}

impl OtlpConfig {
    /// Export for `service_name` to the endpoint named by
    /// `OTEL_EXPORTER_OTLP_ENDPOINT`, or the local collector.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            endpoint: endpoint_or_default(std::env::var(ENV_OTLP_ENDPOINT).ok()),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// The configured endpoint, treating an empty value as unset.
pub fn endpoint_or_default(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string())
}

#[cfg(feature = "otel")]
pub(crate) use pipeline::{shutdown, trace_layer};

#[cfg(feature = "otel")]
mod pipeline {
    use opentelemetry::trace::{TraceError, TracerProvider as _};
    use opentelemetry::{global, KeyValue};
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::{Config, Tracer, TracerProvider};
    use opentelemetry_sdk::{runtime, Resource};
    use tracing::Subscriber;
    use tracing_opentelemetry::OpenTelemetryLayer;
    use tracing_subscriber::registry::LookupSpan;

    use super::OtlpConfig;

    /// Build the batch exporter and the layer feeding it.
    ///
    /// Must be called inside a Tokio runtime; the batch processor runs on it.
    pub(crate) fn trace_layer<S>(
        config: &OtlpConfig,
    ) -> Result<OpenTelemetryLayer<S, Tracer>, TraceError>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let exporter = opentelemetry_otlp::new_exporter()
            .http()
            .with_endpoint(config.endpoint.clone())
            .build_span_exporter()?;

        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);
        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(Config::default().with_resource(resource))
            .build();

        global::set_tracer_provider(provider.clone());
        let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
        Ok(tracing_opentelemetry::layer().with_tracer(tracer))
    }

    /// Flush pending spans and stop the exporter.
    pub(crate) fn shutdown() {
        global::shutdown_tracer_provider();
    }
}
