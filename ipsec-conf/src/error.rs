// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for ipsec-conf

use thiserror::Error;

/// Result type alias for ipsec-conf operations
pub type Result<T> = std::result::Result<T, IpsecConfError>;

/// Errors that can occur while provisioning keys or rendering configuration
#[derive(Error, Debug)]
pub enum IpsecConfError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Host is missing from the hosts table
    #[error("Host not found in hosts table: {hostname}")]
    HostNotFound { hostname: String },

    /// The key generation tool could not be started
    #[error("Key generation with '{program}' failed: {message}")]
    KeyGeneration { program: String, message: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IpsecConfError::HostNotFound {
            hostname: "alpha".to_string(),
        };
        assert_eq!(err.to_string(), "Host not found in hosts table: alpha");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: IpsecConfError = io.into();
        assert!(matches!(err, IpsecConfError::Io(_)));
    }
}
