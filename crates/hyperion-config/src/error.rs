//! Error types for configuration loading, reads, and watching.

use std::path::PathBuf;

use hyperion_core::{Error, ErrorKind};
use thiserror::Error as ThisError;

use crate::file::Format;

/// Specific error types for configuration operations.
#[derive(Debug, ThisError)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read config file '{}': {source}", path.display())]
    Io {
        /// Path of the unreadable file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed
    #[error("failed to parse {format} config '{}': {message}", path.display())]
    Parse {
        /// Detected document format
        format: Format,
        /// Path of the malformed file
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },

    /// Filename suffix does not map to a supported format
    #[error("unsupported config format for '{}': expected .yaml, .yml, .json, or .toml", path.display())]
    UnsupportedFormat {
        /// Path with the unrecognized suffix
        path: PathBuf,
    },

    /// Provider was built without a file path
    #[error("no config file path was provided")]
    MissingPath,

    /// Requested key is absent from the document
    #[error("config key '{key}' is not set")]
    NotFound {
        /// The requested dot-separated key path
        key: String,
    },

    /// Requested key holds a value of a different type
    #[error("config key '{key}' is not {expected} (got {got})")]
    TypeMismatch {
        /// The requested dot-separated key path
        key: String,
        /// Expected type name
        expected: &'static str,
        /// Actual value, rendered
        got: String,
    },

    /// Value could not be decoded into the requested shape
    #[error("failed to decode config key '{key}': {message}")]
    Decode {
        /// The requested dot-separated key path (empty for the whole document)
        key: String,
        /// Decoder diagnostic
        message: String,
    },

    /// Filesystem watcher could not be started
    #[error("failed to watch config file: {0}")]
    Watch(String),
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        let kind = match &error {
            ConfigError::Watch(_) => ErrorKind::Watch,
            _ => ErrorKind::Config,
        };
        Error::with_source(kind, error.to_string(), Box::new(error))
    }
}
