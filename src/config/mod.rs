// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry configuration.
//!
//! Handles loading and merging sink configuration from multiple sources:
//! - Global config: ~/.agentmeter/config.json
//! - Workspace config: .agentmeter.json, .agentmeter.yaml or .agentmeter/config.json
//! - Environment: DD_SERVICE, DD_ENV, DD_API_KEY, DD_SITE, ...
//! - Explicit options passed in code
//!
//! Configuration is merged with precedence (explicit > env > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    get_global_config_path, load_config_file, load_global_config, load_workspace_config,
    CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};

pub use merger::{
    default_config, env_overrides, env_overrides_from, merge_config, SinkOptions, ENV_AGENTLESS,
    ENV_AGENT_HOST, ENV_API_KEY, ENV_APP_KEY, ENV_ENV, ENV_ML_APP, ENV_SERVICE, ENV_SITE,
    ENV_STATSD_PORT,
};

pub use types::{
    ResolvedSinkConfig, TelemetryFileConfig, DEFAULT_ENV, DEFAULT_ML_APP, DEFAULT_SERVICE,
    DEFAULT_SITE, DEFAULT_STATSD_HOST, DEFAULT_STATSD_PORT,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources for a workspace.
pub fn load_sink_config(
    workspace_root: &Path,
    options: &SinkOptions,
) -> Result<ResolvedSinkConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;

    let config = merge_config(global, workspace, env_overrides(), options);
    config.validate()?;
    Ok(config)
}

/// Resolve sink configuration from the environment and explicit options only.
///
/// Never fails: invalid values are replaced by their defaults with a warning.
pub fn resolve_sink_config(options: &SinkOptions) -> ResolvedSinkConfig {
    sanitize(merge_config(None, None, env_overrides(), options))
}

/// Replace invalid fields with defaults so a usable config always results.
pub(crate) fn sanitize(mut config: ResolvedSinkConfig) -> ResolvedSinkConfig {
    while let Err(err) = config.validate() {
        tracing::warn!(error = %err, "Invalid telemetry configuration, using default");
        let defaults = default_config();
        match err {
            ConfigError::InvalidValue { ref field, .. } if field == "service" => {
                config.service = defaults.service
            }
            ConfigError::InvalidValue { ref field, .. } if field == "site" => {
                config.site = defaults.site
            }
            ConfigError::InvalidValue { ref field, .. } if field == "statsdPort" => {
                config.statsd_port = defaults.statsd_port
            }
            _ => return defaults,
        }
    }
    config
}
