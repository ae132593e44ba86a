//! Configuration error types.
//!
//! Every variant that concerns a single block carries its kind
//! (`"check"`, `"alert"`, `"group"`, `"defaults"`) and name so the
//! message points at the part of the file that needs fixing.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that make a configuration unusable. All are fatal at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config structure: {0}")]
    Structure(String),

    #[error("duplicate {what} name: {name}")]
    Duplicate { what: &'static str, name: String },

    #[error("{what} '{name}': no plugin provides type '{kind}'")]
    UnknownPlugin {
        what: &'static str,
        name: String,
        kind: String,
    },

    #[error("{what} '{name}': unknown type '{kind}'")]
    UnknownType {
        what: &'static str,
        name: String,
        kind: String,
    },

    #[error("check '{check}': unknown group '{group}'")]
    UnknownGroup { check: String, group: String },

    #[error("check '{check}': alert pattern '{pattern}' does not match any configured alert")]
    UnmatchedAlert { check: String, pattern: String },

    #[error("{what} '{name}': invalid settings: {message}")]
    Settings {
        what: &'static str,
        name: String,
        message: String,
    },

    #[error("{what} '{name}': unknown settings: {}", keys.join(", "))]
    UnknownKeys {
        what: &'static str,
        name: String,
        keys: Vec<String>,
    },

    #[error("{what} '{name}': validation failed: {message}")]
    Validation {
        what: &'static str,
        name: String,
        message: String,
    },
}
