// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the on-disk telemetry configuration (JSON or YAML) and the fully
//! resolved settings consumed by the sink adapter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Default service name attached to measurements.
pub const DEFAULT_SERVICE: &str = "llm-agent";

/// Default deployment environment.
pub const DEFAULT_ENV: &str = "development";

/// Default metrics site.
pub const DEFAULT_SITE: &str = "datadoghq.com";

/// Default ML application label.
pub const DEFAULT_ML_APP: &str = "llm-agent";

/// Default DogStatsD host.
pub const DEFAULT_STATSD_HOST: &str = "127.0.0.1";

/// Default DogStatsD port.
pub const DEFAULT_STATSD_PORT: u16 = 8125;

/// Telemetry configuration as written in a config file.
/// Can be defined in .agentmeter.json, .agentmeter.yaml or .agentmeter/config.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFileConfig {
    /// Service name attached to every measurement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Deployment environment (development, staging, production)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    /// API key for agentless submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Application key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,

    /// Metrics site, e.g. datadoghq.eu
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,

    /// Submit directly to the HTTP API instead of a local agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agentless: Option<bool>,

    /// ML application label for LLM observability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_app: Option<String>,

    /// DogStatsD agent host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statsd_host: Option<String>,

    /// DogStatsD agent port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statsd_port: Option<u16>,

    /// Extra tags added to every measurement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

/// Fully resolved sink configuration with all defaults applied.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSinkConfig {
    pub service: String,
    pub env: String,
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    pub site: String,
    pub agentless: bool,
    pub ml_app: String,
    pub statsd_host: String,
    pub statsd_port: u16,
    pub tags: BTreeMap<String, String>,
}

impl Default for ResolvedSinkConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            env: DEFAULT_ENV.to_string(),
            api_key: None,
            app_key: None,
            site: DEFAULT_SITE.to_string(),
            agentless: true,
            ml_app: DEFAULT_ML_APP.to_string(),
            statsd_host: DEFAULT_STATSD_HOST.to_string(),
            statsd_port: DEFAULT_STATSD_PORT,
            tags: BTreeMap::new(),
        }
    }
}

// Keys are redacted so the config can be logged.
impl std::fmt::Debug for ResolvedSinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSinkConfig")
            .field("service", &self.service)
            .field("env", &self.env)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("app_key", &self.app_key.as_ref().map(|_| "<redacted>"))
            .field("site", &self.site)
            .field("agentless", &self.agentless)
            .field("ml_app", &self.ml_app)
            .field("statsd_host", &self.statsd_host)
            .field("statsd_port", &self.statsd_port)
            .field("tags", &self.tags)
            .finish()
    }
}

impl ResolvedSinkConfig {
    /// Whether an API key is available for agentless submission.
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    /// Base URL of the metrics intake API for the configured site.
    pub fn api_base_url(&self) -> String {
        format!("https://api.{}", self.site)
    }

    /// Check the values that would otherwise produce a broken client.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "service".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.site.trim().is_empty() || self.site.contains("://") || self.site.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "site".to_string(),
                message: format!("expected a bare host name, got '{}'", self.site),
            });
        }
        if self.statsd_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "statsdPort".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
