//! Configuration loading and config file resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TAPEDECK_CONFIG";

/// Default HTTP port for tapedeck-ap
pub const DEFAULT_PORT: u16 = 5750;

/// Default engine progress callback interval
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;

/// Default track length used by the simulated engine when a song has none
pub const DEFAULT_TRACK_DURATION_MS: u64 = 180_000;

/// Settings of the simulated engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Interval between periodic status callbacks
    pub progress_interval_ms: u64,
    /// Duration reported for URLs with no known length
    pub default_duration_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            default_duration_ms: DEFAULT_TRACK_DURATION_MS,
        }
    }
}

/// Contents of `config.toml`
///
/// Every field is optional; command-line arguments take precedence over
/// anything set here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub library_file: Option<PathBuf>,
    pub engine: EngineSettings,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file that must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    ///
    /// A missing file is never fatal. A file that exists but does not parse
    /// is reported as an error so typos are not silently ignored.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file found, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load(path)
    }

    /// Validate values that serde cannot check
    pub fn validate(&self) -> Result<()> {
        if self.engine.progress_interval_ms == 0 {
            return Err(Error::Config(
                "engine.progress_interval_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(level) = &self.log_level {
            if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
                return Err(Error::Config(format!("Unknown log level: {}", level)));
            }
        }
        Ok(())
    }
}

/// Config file resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Platform config directory (`<config_dir>/tapedeck/config.toml`), if present
///
/// Returns `None` when nothing applies; callers then run on defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform default location
    default_config_file().filter(|path| path.exists())
}

/// Platform default config file path
fn default_config_file() -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        // ~/.config/tapedeck/config.toml, then /etc/tapedeck/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("tapedeck").join("config.toml"));
        match user_config {
            Some(path) if path.exists() => Some(path),
            _ => Some(PathBuf::from("/etc/tapedeck/config.toml")),
        }
    } else {
        dirs::config_dir().map(|d| d.join("tapedeck").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.engine.progress_interval_ms, 1000);
    }

    #[test]
    fn test_partial_engine_table_keeps_other_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            port = 6000

            [engine]
            progress_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.port, Some(6000));
        assert_eq!(config.engine.progress_interval_ms, 250);
        assert_eq!(config.engine.default_duration_ms, DEFAULT_TRACK_DURATION_MS);
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let result = TomlConfig::from_toml_str("port = \"not a number\"");
        assert!(matches!(result, Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = TomlConfig::default();
        config.engine.progress_interval_ms = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let config = TomlConfig {
            log_level: Some("loud".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
