//! `~/.harbor/config.yaml`: runtime settings shared by the CLI and daemon.
//!
//! A missing file means defaults. Unknown keys are ignored so older binaries
//! can read configs written by newer ones.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{config_io, ConfigError};
use crate::paths;

/// Bound on a single registry call made by the allocation coordinator.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 5_000;

/// Log line format for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarborConfig {
    pub call_timeout_ms: u64,
    pub log_format: LogFormat,
}

impl Default for HarborConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            log_format: LogFormat::default(),
        }
    }
}

impl HarborConfig {
    /// Zero is read as "use the default"; an unbounded call is never allowed.
    pub fn call_timeout(&self) -> Duration {
        match self.call_timeout_ms {
            0 => Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }
}

/// Load `<home>/.harbor/config.yaml`, or defaults if absent.
pub fn load_at(home: &Path) -> Result<HarborConfig, ConfigError> {
    let path = paths::config_path(home);
    if !path.exists() {
        return Ok(HarborConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| config_io(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(HarborConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

/// Atomically write `<home>/.harbor/config.yaml` (`.tmp` sibling + rename).
pub fn save_at(home: &Path, config: &HarborConfig) -> Result<(), ConfigError> {
    let root = paths::harbor_root(home);
    std::fs::create_dir_all(&root).map_err(|e| config_io(&root, e))?;

    let path = paths::config_path(home);
    let tmp = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|e| config_io(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| config_io(&path, e))?;
    Ok(())
}

/// Write defaults unless a config already exists. Returns the effective config.
pub fn init_at(home: &Path) -> Result<HarborConfig, ConfigError> {
    if paths::config_path(home).exists() {
        return load_at(home);
    }
    let config = HarborConfig::default();
    save_at(home, &config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().unwrap();
        let config = load_at(home.path()).unwrap();
        assert_eq!(config, HarborConfig::default());
        assert_eq!(config.call_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn save_then_load() {
        let home = TempDir::new().unwrap();
        let config = HarborConfig {
            call_timeout_ms: 250,
            log_format: LogFormat::Json,
        };
        save_at(home.path(), &config).unwrap();
        assert_eq!(load_at(home.path()).unwrap(), config);
        let tmp = paths::config_path(home.path()).with_extension("yaml.tmp");
        assert!(!tmp.exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let home = TempDir::new().unwrap();
        std::fs::create_dir_all(paths::harbor_root(home.path())).unwrap();
        std::fs::write(paths::config_path(home.path()), "call_timeout_ms: 100\n").unwrap();

        let config = load_at(home.path()).unwrap();
        assert_eq!(config.call_timeout(), Duration::from_millis(100));
        assert_eq!(config.log_format, LogFormat::Compact);
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let config = HarborConfig {
            call_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.call_timeout(), Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS));
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let home = TempDir::new().unwrap();
        std::fs::create_dir_all(paths::harbor_root(home.path())).unwrap();
        std::fs::write(paths::config_path(home.path()), "call_timeout_ms: [oops").unwrap();

        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("config.yaml"));
    }
}
