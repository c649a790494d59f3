// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard bridge.

use thiserror::Error;

/// The primary error type used across Switchboard crates.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Configuration errors (malformed descriptor blobs, invalid settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// Store errors (database connection, query failure, serialization).
    ///
    /// Raised by the ordered log and the state store. Tailing consumers treat
    /// these as transient and retry.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Chat connection errors (dial failure, closed connection).
    #[error("connection error: {message}")]
    Connection {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Plugin errors (start failure, stop failure, handler failure).
    #[error("plugin error: {message}")]
    Plugin {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A plugin name has no registered specification.
    #[error("plugin {name:?} not registered")]
    NotRegistered { name: String },

    /// A named resource (LDAP connection, account, plugin) does not exist.
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    /// Command text did not satisfy the command schema.
    #[error("{0}")]
    Schema(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The component was stopped and no longer accepts work.
    #[error("component stopped")]
    Stopped,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// Wraps any error as a storage error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SwitchboardError::Storage {
            source: Box::new(err),
        }
    }

    /// Builds a connection error from a message.
    pub fn connection(message: impl Into<String>) -> Self {
        SwitchboardError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a plugin error from a message.
    pub fn plugin(message: impl Into<String>) -> Self {
        SwitchboardError::Plugin {
            message: message.into(),
            source: None,
        }
    }
}
