//! Error types for tether
//!
//! Provides a unified error type used across all tether crates.

use std::path::PathBuf;

/// Main error type for tether operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Session Errors ===

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session is offline: {0}")]
    SessionOffline(String),

    #[error("Session limit reached: {max} sessions")]
    SessionLimit { max: usize },

    // === Multiplexer Errors ===

    #[error("Multiplexer command failed: {0}")]
    Multiplexer(String),

    #[error("Multiplexer command timed out after {seconds}s")]
    CommandTimeout { seconds: u64 },

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Persistence Errors ===

    #[error("Persistence error: {0}")]
    Persistence(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Create a multiplexer command error
    pub fn multiplexer(msg: impl Into<String>) -> Self {
        Self::Multiplexer(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is transient
    ///
    /// Transient errors are safe to retry on the next poll tick; everything
    /// else reflects a state or programming problem that retrying won't fix.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Multiplexer(_) | Self::CommandTimeout { .. }
        )
    }
}

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;
