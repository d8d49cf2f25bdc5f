use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 2048;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    Json5 { path: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of events handed to the monitors at once
    pub batch_size: usize,
    pub monitors: Vec<MonitorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            monitors: Vec::new(),
        }
    }
}

/// One monitor definition.
///
/// Only `query` drives matching. The aggregation and threshold fields are
/// carried through to reports as written; nothing evaluates them yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub title: String,
    pub query: String,
    pub agg_func: String,
    pub agg_args: Vec<String>,
    pub agg_group: Vec<String>,
    pub agg_window: String,
    pub threshold: String,
}

impl MonitorConfig {
    pub fn new(title: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            query: query.into(),
            ..Self::default()
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

/// Load a config file. `.json` and `.json5` files are read as JSON5,
/// anything else as TOML.
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("json5"));

    let config = if is_json {
        json5::from_str::<Config>(&raw).map_err(|e| ConfigError::Json5 {
            path: path_display.clone(),
            message: e.to_string(),
        })?
    } else {
        toml::from_str::<Config>(&raw).map_err(|source| ConfigError::Toml {
            path: path_display.clone(),
            source,
        })?
    };

    log::debug!(
        "loaded {} monitor(s) from '{}'",
        config.monitors.len(),
        path_display
    );
    Ok(config)
}

pub fn default_config() -> &'static Config {
    static DEFAULT_CONFIG: LazyLock<Config> = LazyLock::new(Config::default);
    &DEFAULT_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_toml_monitors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cloudmon.toml");
        fs::write(
            &path,
            r#"
batch_size = 100

[[monitors]]
title = "Egress errors"
query = "service:egress 'no stream matches subject'"
agg_func = "count"
agg_window = "5m"
threshold = "> 0"
"#,
        )
        .unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.monitors.len(), 1);
        assert_eq!(config.monitors[0].title, "Egress errors");
        assert_eq!(config.monitors[0].threshold, "> 0");
        assert!(config.monitors[0].agg_group.is_empty());
    }

    #[test]
    fn test_load_json5_monitors_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cloudmon.json5");
        fs::write(
            &path,
            r#"{
  // trailing commas and comments are fine
  monitors: [
    { title: 'timeouts', query: 'timeout', },
  ],
}"#,
        )
        .unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.monitors, vec![MonitorConfig::new("timeouts", "timeout")]);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let err = load_config_from_path(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "monitors = [[").unwrap();
        let err = load_config_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_no_path_gives_default() {
        let config = load_config(None).unwrap();
        assert!(config.monitors.is_empty());
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }
}
