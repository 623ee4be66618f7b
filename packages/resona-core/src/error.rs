//! Centralized error and status types for the Resona core library.
//!
//! Two kinds of failure exist in this crate:
//! - [`TransportError`]: raised by every receiver transport call, transient
//!   by default and handled by the session's retry policy.
//! - [`CommandStatus`]: the uniform outcome of a public session command.
//!   Commands report failure through the status code, they never raise.

use serde::Serialize;
use thiserror::Error;

/// Error raised by every receiver transport call.
///
/// Carries an optional machine-readable protocol error code when the
/// receiver supplied one alongside the failure.
#[derive(Debug, Clone, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    /// Human-readable description of the failure.
    pub message: String,
    /// Protocol-level error code, when the receiver reported one.
    pub code: Option<i64>,
}

impl TransportError {
    /// Creates a transport error without a protocol code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Creates a transport error carrying the receiver's protocol code.
    pub fn with_code(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

/// Convenient Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Outcome of a session command.
///
/// Mirrors the host platform's status-code convention: a command issued
/// against an unreachable device either succeeds later (buffered commands
/// report [`CommandStatus::Ok`] immediately) or fails with a clear
/// "try again" status - it never hangs the caller and never panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Command accepted (or buffered for execution once the device returns).
    Ok,
    /// Command rejected: invalid argument or unknown target on this device.
    BadRequest,
    /// Device unreachable and the bounded reconnect wait expired.
    ServiceUnavailable,
    /// Internal failure while handling the command.
    ServerError,
}

impl CommandStatus {
    /// Returns `true` for [`CommandStatus::Ok`].
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}
