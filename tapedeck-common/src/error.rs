//! Errors raised while loading configuration and reading the library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Reading a config or library file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A config or library file is not valid TOML for its schema
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Config values that parse but cannot be used
    #[error("Configuration error: {0}")]
    Config(String),

    /// No song or playlist with the given id, e.g. `"song s7"`
    #[error("Not found: {0}")]
    NotFound(String),

    /// Library content that contradicts itself (duplicate ids)
    #[error("Invalid library: {0}")]
    InvalidInput(String),

    /// Poisoned library lock
    #[error("Internal error: {0}")]
    Internal(String),
}
