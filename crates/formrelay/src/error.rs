//! Error types for formrelay.
//!
//! This module defines all error types used throughout the formrelay crate,
//! grouped by the part of the system that raises them.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for formrelay operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to create the record store file.
    #[error("failed to create record store at {path}: {source}")]
    StoreCreate {
        /// Path to the store file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the record store file.
    #[error("failed to write record store at {path}: {source}")]
    StoreWrite {
        /// Path to the store file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Transport Errors ===
    /// A listener could not bind its address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A host name did not resolve to any socket address.
    #[error("address {addr} did not resolve to any socket address")]
    AddressResolve {
        /// The address that was requested.
        addr: String,
    },

    /// Receiving a datagram failed.
    #[error("failed to receive datagram: {0}")]
    Receive(#[source] std::io::Error),

    /// Relaying a form body to the message receiver failed.
    #[error("failed to relay datagram to {addr}: {source}")]
    Relay {
        /// Destination address.
        addr: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),

    // === Decoding Errors ===
    /// A datagram payload was not valid UTF-8.
    #[error("datagram payload is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),

    // === Web Errors ===
    /// One of the fixed HTML documents could not be read.
    #[error("failed to read document {path}: {source}")]
    DocumentRead {
        /// Path to the document.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Supervisor Errors ===
    /// The supervisor was asked to make a transition its state does not allow.
    #[error("cannot transition supervisor from {from} to {to}")]
    InvalidTransition {
        /// Current state name.
        from: &'static str,
        /// Requested state name.
        to: &'static str,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for formrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a bind error for the given address.
    #[must_use]
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }

    /// Create a relay error for the given destination.
    #[must_use]
    pub fn relay(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Relay {
            addr: addr.into(),
            source,
        }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error came from the network transport.
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Bind { .. }
                | Self::AddressResolve { .. }
                | Self::Receive(_)
                | Self::Relay { .. }
                | Self::Serve(_)
        )
    }

    /// Check if this error is a payload decoding failure.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
