// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading telemetry configuration from JSON and YAML files.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::TelemetryFileConfig;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[
    ".agentmeter.json",
    ".agentmeter.yaml",
    ".agentmeter.yml",
    ".agentmeter/config.json",
];

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".agentmeter";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration from ~/.agentmeter/config.json.
pub fn load_global_config() -> Result<Option<TelemetryFileConfig>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_config_file(&path).map(Some)
}

/// Load workspace configuration from the first config file found in `workspace_root`.
pub fn load_workspace_config(
    workspace_root: &Path,
) -> Result<Option<TelemetryFileConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load a configuration file (JSON or YAML, chosen by extension).
pub fn load_config_file(path: &Path) -> Result<TelemetryFileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_json_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".agentmeter.json");
        std::fs::write(&path, r#"{"service": "search-agent", "env": "staging"}"#).unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.service.as_deref(), Some("search-agent"));
        assert_eq!(config.env.as_deref(), Some("staging"));
    }

    #[test]
    fn test_load_yaml_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".agentmeter.yaml");
        std::fs::write(&path, "service: memory-agent\nagentless: false\ntags:\n  team: ml\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.service.as_deref(), Some("memory-agent"));
        assert_eq!(config.agentless, Some(false));
        assert_eq!(config.tags.unwrap().get("team").map(String::as_str), Some("ml"));
    }

    #[test]
    fn test_workspace_config_missing() {
        let temp = TempDir::new().unwrap();
        assert!(load_workspace_config(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_workspace_config_search_order() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".agentmeter.json"), r#"{"service": "json"}"#).unwrap();
        std::fs::write(temp.path().join(".agentmeter.yaml"), "service: yaml\n").unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.service.as_deref(), Some("json"));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".agentmeter.yml");
        std::fs::write(&path, "service: [unterminated\n").unwrap();

        assert!(matches!(load_config_file(&path), Err(ConfigError::YamlError(_))));
    }
}
