//! Error types for geoclue-position.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for internal and remote operations.
#[derive(Error, Debug)]
pub enum GeoclueError {
    /// A remote call returned an error reply.
    #[error("remote call failed: {name}: {message}")]
    Rpc {
        /// Error name reported by the service.
        name: String,
        /// Human-readable message.
        message: String,
    },

    /// A remote object could not be resolved.
    #[error("invalid remote object: {0}")]
    InvalidObject(String),

    /// Neither the desktop id override nor the application name is set.
    #[error("application desktop id is not set")]
    MissingDesktopId,

    /// Invalid client state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::client::ClientState,
        to: crate::client::ClientState,
    },

    /// A remote property could not be read.
    #[error("property read failed: {0}")]
    Property(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeoclueError {
    /// Build an [`GeoclueError::Rpc`] from an error name and message.
    pub fn rpc(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rpc {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Convenience Result type for geoclue-position operations.
pub type Result<T> = std::result::Result<T, GeoclueError>;

/// Error condition reported to consumers of a position source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceErrorKind {
    /// No error has occurred since the last request.
    #[default]
    NoError,
    /// The provider could not be reached, configured, started or stopped.
    Access,
    /// A single-shot request failed (timeout too small or no fix in time).
    UnknownSource,
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => write!(f, "no error"),
            Self::Access => write!(f, "access error"),
            Self::UnknownSource => write!(f, "unknown source error"),
        }
    }
}
