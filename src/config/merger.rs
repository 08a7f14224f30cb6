// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::collections::BTreeMap;

use super::types::{ResolvedSinkConfig, TelemetryFileConfig};

/// Explicit sink options, typically passed in code or on the command line.
///
/// Every field is optional; unset fields fall back to environment variables,
/// config files and finally built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct SinkOptions {
    pub service: Option<String>,
    pub env: Option<String>,
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    pub site: Option<String>,
    pub agentless: Option<bool>,
    pub ml_app: Option<String>,
    pub statsd_host: Option<String>,
    pub statsd_port: Option<u16>,
    pub tags: BTreeMap<String, String>,
}

impl SinkOptions {
    /// Options naming a service and environment.
    pub fn new(service: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            env: Some(env.into()),
            ..Default::default()
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the application key.
    pub fn with_app_key(mut self, key: impl Into<String>) -> Self {
        self.app_key = Some(key.into());
        self
    }

    /// Set the metrics site.
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Enable or disable agentless submission.
    pub fn with_agentless(mut self, agentless: bool) -> Self {
        self.agentless = Some(agentless);
        self
    }

    /// Set the ML application label.
    pub fn with_ml_app(mut self, ml_app: impl Into<String>) -> Self {
        self.ml_app = Some(ml_app.into());
        self
    }

    /// Point DogStatsD submission at a specific agent.
    pub fn with_statsd(mut self, host: impl Into<String>, port: u16) -> Self {
        self.statsd_host = Some(host.into());
        self.statsd_port = Some(port);
        self
    }

    /// Add a global tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Environment variables understood by the sink adapter.
pub const ENV_SERVICE: &str = "DD_SERVICE";
pub const ENV_ENV: &str = "DD_ENV";
pub const ENV_API_KEY: &str = "DD_API_KEY";
pub const ENV_APP_KEY: &str = "DD_APP_KEY";
pub const ENV_SITE: &str = "DD_SITE";
pub const ENV_AGENTLESS: &str = "DD_LLMOBS_AGENTLESS_ENABLED";
pub const ENV_ML_APP: &str = "DD_LLMOBS_ML_APP";
pub const ENV_AGENT_HOST: &str = "DD_AGENT_HOST";
pub const ENV_STATSD_PORT: &str = "DD_DOGSTATSD_PORT";

/// Read sink overrides from the process environment.
pub fn env_overrides() -> TelemetryFileConfig {
    env_overrides_from(|name| std::env::var(name).ok())
}

/// Read sink overrides through an arbitrary variable lookup.
///
/// Empty values are treated as unset. Unparseable booleans and ports are
/// ignored with a warning.
pub fn env_overrides_from<F>(lookup: F) -> TelemetryFileConfig
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let agentless = get(ENV_AGENTLESS).and_then(|raw| {
        let parsed = parse_bool(&raw);
        if parsed.is_none() {
            tracing::warn!(var = ENV_AGENTLESS, value = %raw, "Ignoring unparseable boolean");
        }
        parsed
    });

    let statsd_port = get(ENV_STATSD_PORT).and_then(|raw| match raw.trim().parse::<u16>() {
        Ok(port) => Some(port),
        Err(e) => {
            tracing::warn!(var = ENV_STATSD_PORT, value = %raw, error = %e, "Ignoring invalid port");
            None
        }
    });

    TelemetryFileConfig {
        service: get(ENV_SERVICE),
        env: get(ENV_ENV),
        api_key: get(ENV_API_KEY),
        app_key: get(ENV_APP_KEY),
        site: get(ENV_SITE),
        agentless,
        ml_app: get(ENV_ML_APP),
        statsd_host: get(ENV_AGENT_HOST),
        statsd_port,
        tags: None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Default configuration values.
pub fn default_config() -> ResolvedSinkConfig {
    ResolvedSinkConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. Explicit options
/// 2. Environment variables
/// 3. Workspace config (.agentmeter.json)
/// 4. Global config (~/.agentmeter/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<TelemetryFileConfig>,
    workspace: Option<TelemetryFileConfig>,
    env: TelemetryFileConfig,
    options: &SinkOptions,
) -> ResolvedSinkConfig {
    let mut result = default_config();

    if let Some(config) = global {
        apply_file_config(&mut result, &config);
    }

    if let Some(config) = workspace {
        apply_file_config(&mut result, &config);
    }

    apply_file_config(&mut result, &env);

    // Explicit options win
    apply_options(&mut result, options);

    result
}

fn apply_file_config(result: &mut ResolvedSinkConfig, config: &TelemetryFileConfig) {
    if let Some(ref service) = config.service {
        result.service = service.clone();
    }

    if let Some(ref env) = config.env {
        result.env = env.clone();
    }

    if config.api_key.is_some() {
        result.api_key = config.api_key.clone();
    }

    if config.app_key.is_some() {
        result.app_key = config.app_key.clone();
    }

    if let Some(ref site) = config.site {
        result.site = site.clone();
    }

    if let Some(agentless) = config.agentless {
        result.agentless = agentless;
    }

    if let Some(ref ml_app) = config.ml_app {
        result.ml_app = ml_app.clone();
    }

    if let Some(ref host) = config.statsd_host {
        result.statsd_host = host.clone();
    }

    if let Some(port) = config.statsd_port {
        result.statsd_port = port;
    }

    if let Some(ref tags) = config.tags {
        result.tags.extend(tags.clone());
    }
}

fn apply_options(result: &mut ResolvedSinkConfig, options: &SinkOptions) {
    if let Some(ref service) = options.service {
        result.service = service.clone();
    }

    if let Some(ref env) = options.env {
        result.env = env.clone();
    }

    if options.api_key.is_some() {
        result.api_key = options.api_key.clone();
    }

    if options.app_key.is_some() {
        result.app_key = options.app_key.clone();
    }

    if let Some(ref site) = options.site {
        result.site = site.clone();
    }

    if let Some(agentless) = options.agentless {
        result.agentless = agentless;
    }

    if let Some(ref ml_app) = options.ml_app {
        result.ml_app = ml_app.clone();
    }

    if let Some(ref host) = options.statsd_host {
        result.statsd_host = host.clone();
    }

    if let Some(port) = options.statsd_port {
        result.statsd_port = port;
    }

    result.tags.extend(options.tags.clone());
}
