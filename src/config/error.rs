use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors raised while loading or validating configuration.
pub enum ConfigError {
    /// `TOLLGATE_PORT` was not a valid number.
    #[error("invalid port value '{value}': {source}")]
    PortParseError {
        /// Raw env value.
        value: String,
        /// Parse failure.
        #[source]
        source: std::num::ParseIntError,
    },

    /// Port 0 is not usable for a listening server.
    #[error("port must be non-zero, got '{value}'")]
    InvalidPort {
        /// Raw env value.
        value: String,
    },

    /// `TOLLGATE_BIND_ADDR` was not a valid IP address.
    #[error("invalid bind address '{value}': {source}")]
    InvalidBindAddr {
        /// Raw env value.
        value: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// The routing config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The routing config file was not valid JSON for [`super::RoutingConfig`].
    #[error("failed to parse config file {path}: {source}")]
    FileParse {
        /// File path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A semantic validation rule failed.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Human-readable reason.
        reason: String,
    },
}
