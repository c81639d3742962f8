//! tapedeck-ap specific configuration
//!
//! Command-line values win over `config.toml`, which wins over built-in
//! defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use tapedeck_common::config::{EngineSettings, TomlConfig, DEFAULT_PORT};

use crate::error::{Error, Result};

/// Values given on the command line (or their environment variables)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub library_file: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Audio Player configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Songs and playlists; `None` starts with an empty library
    pub library_file: Option<PathBuf>,
    pub log_level: String,
    pub engine: EngineSettings,
}

impl Config {
    /// Merge command-line overrides into a loaded config file
    pub fn resolve(overrides: Overrides, file: TomlConfig) -> Result<Self> {
        file.validate()?;

        let log_level = overrides
            .log_level
            .or(file.log_level)
            .unwrap_or_else(|| "info".to_string());
        if !matches!(log_level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            return Err(Error::Config(format!("Unknown log level: {}", log_level)));
        }

        Ok(Self {
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
            library_file: overrides.library_file.or(file.library_file),
            log_level,
            engine: file.engine,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Fallback tracing filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> String {
        format!(
            "tapedeck_ap={level},tapedeck_common={level},tower_http=info",
            level = self.log_level
        )
    }
}
