//! Error types for `HdrSync`
//!
//! This module defines all error types used throughout the application,
//! providing clear error messages and proper error propagation.
//!
//! Error variants use `#[source]` to preserve error chains for better
//! observability and debugging.

use thiserror::Error;

/// Simple error type for wrapping string messages while implementing `std::error::Error`
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StringError(pub String);

impl StringError {
    /// Create a new `StringError` from a string message
    pub fn new(msg: impl Into<String>) -> Box<Self> {
        Box::new(Self(msg.into()))
    }
}

/// Main error type for `HdrSync`
#[derive(Debug, Error)]
pub enum HdrSyncError {
    /// HDR is not supported on the display
    #[error("HDR not supported on this display")]
    HdrNotSupported,

    /// The caller named a display that is not currently enumerable
    #[error("Unknown display: {0}")]
    UnknownDisplay(String),

    /// Failed to control HDR settings
    /// Preserves the underlying error source for full error chain transparency
    #[error("Failed to control HDR: {0}")]
    HdrControlFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Display enumeration or state query failed
    /// Preserves the underlying error source for full error chain transparency
    #[error("Display query failed: {0}")]
    DisplayQueryFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Process enumeration failed
    /// Preserves the underlying error source for full error chain transparency
    #[error("Process enumeration failed: {0}")]
    ProcessEnumFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Window enumeration failed
    /// Preserves the underlying error source for full error chain transparency
    #[error("Window enumeration failed: {0}")]
    WindowEnumFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Process event subscription was refused for lack of privileges
    ///
    /// Distinguished from [`HdrSyncError::SubscriptionFailed`] because the
    /// event watcher suppresses further attempts at the high-fidelity trace
    /// stream for the rest of the session once this is seen.
    #[error("Event subscription denied: {0}")]
    SubscriptionDenied(String),

    /// Process event subscription failed for a non-permission reason
    /// Preserves the underlying error source for full error chain transparency
    #[error("Event subscription failed: {0}")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The event worker thread did not acknowledge a request in time
    #[error("Event worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// Configuration error
    /// Preserves the underlying error source for full error chain transparency
    #[error("Configuration error: {0}")]
    ConfigError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Windows API error
    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsApiError(#[from] windows::core::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl HdrSyncError {
    /// True when this error means the caller lacks the privilege for the
    /// requested subscription, as opposed to a transient failure.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::SubscriptionDenied(_))
    }
}

/// Result type alias for `HdrSync` operations
pub type Result<T> = std::result::Result<T, HdrSyncError>;
