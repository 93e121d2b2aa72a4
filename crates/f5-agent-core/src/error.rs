//! Error types for the F5 agent
//!
//! This module defines all error types used throughout the crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the F5 agent
#[derive(Error, Debug)]
pub enum Error {
    /// Device gateway errors
    #[error("Device gateway error: {0}")]
    DeviceGateway(String),

    /// Port store errors
    #[error("Port store error: {0}")]
    PortStore(String),

    /// Control plane (RPC) errors
    #[error("Control plane error: {0}")]
    ControlPlane(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A bounded call did not complete in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// What was being called
        operation: String,
        /// The bound that was exceeded
        after: Duration,
    },

    /// Device-specific error
    #[error("Device error ({device}): {message}")]
    Device {
        /// Device driver name
        device: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a device gateway error
    pub fn device_gateway(msg: impl Into<String>) -> Self {
        Self::DeviceGateway(msg.into())
    }

    /// Create a port store error
    pub fn port_store(msg: impl Into<String>) -> Self {
        Self::PortStore(msg.into())
    }

    /// Create a control plane error
    pub fn control_plane(msg: impl Into<String>) -> Self {
        Self::ControlPlane(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Create a device-specific error
    pub fn device(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Device {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call later may succeed
    ///
    /// Authentication, configuration and input errors are permanent until
    /// an operator intervenes.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Http(_)
                | Self::Timeout { .. }
                | Self::Device { .. }
                | Self::DeviceGateway(_)
                | Self::ControlPlane(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
