//! # Error Types Module
//!
//! Typed errors for the node's fallible seams: configuration I/O and link
//! setup. The detection pipeline itself has none. Flat signals, refractory
//! discards and dropped datagrams are policy, not failures, and never
//! surface as error values.

use std::fmt;

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}

/// Errors that can occur while setting up the outbound event link
#[derive(Debug)]
pub enum LinkError {
    /// Local socket could not be bound or configured
    BindFailed(std::io::Error),
    /// Target address did not resolve
    InvalidTarget { target: String, reason: String },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::BindFailed(e) => {
                write!(f, "Failed to open event socket: {}", e)
            }
            LinkError::InvalidTarget { target, reason } => {
                write!(f, "Invalid event target {}: {}", target, reason)
            }
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkError::BindFailed(e) => Some(e),
            LinkError::InvalidTarget { .. } => None,
        }
    }
}
