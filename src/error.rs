//! Error types for the rfcompanion library.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::{Rejection, SendRfCommandResult};
use crate::transport::GattStatus;

/// The main error type for rfcompanion operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The adapter holds no usable connection.
    #[error("not connected")]
    NotConnected,

    /// The link could not be established or did not expose the expected capabilities.
    #[error("could not connect to the device: {reason}")]
    ConnectFailed { reason: String },

    /// The link did not reach the connected phase in time.
    #[error("connection timed out after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// The connection went away while the operation was pending.
    #[error("connection lost")]
    ConnectionLost,

    /// The write was rejected, completed with an error status, or never completed.
    #[error("write failed: {0}")]
    WriteFailed(WriteFailure),

    /// No acknowledgement notification arrived in time.
    #[error("no response after {timeout_ms}ms")]
    ResponseTimeout { timeout_ms: u64 },

    /// The device answered with something the protocol does not allow.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// The device refused to carry out the command.
    #[error("device rejected the command: {0}")]
    DeviceRejected(Rejection),

    /// Another command is still holding the connection's waiters.
    #[error("another command is in progress")]
    CommandInProgress,

    /// The adapter is being torn down.
    #[error("adapter is shutting down")]
    ShuttingDown,
}

impl Error {
    /// Returns true for any of the deadline-driven failures.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::WriteFailed(WriteFailure::Timeout { .. })
                | Self::ResponseTimeout { .. }
        )
    }

    /// Returns true if the device itself refused the command.
    #[must_use]
    pub const fn is_device_rejection(&self) -> bool {
        matches!(self, Self::DeviceRejected(_))
    }
}

/// Why a write did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteFailure {
    /// The transport refused to queue the write.
    #[error("rejected by transport: {0}")]
    Rejected(TransportError),

    /// The write completed with a non-success status.
    #[error("completed with status {0}")]
    Status(GattStatus),

    /// No completion event arrived in time.
    #[error("no completion after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Acknowledgement payload errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Notification carried no bytes.
    #[error("empty notification payload")]
    EmptyPayload,

    /// Notification was not exactly one byte long.
    #[error("expected a 1-byte payload, got {0} bytes")]
    UnexpectedLength(usize),

    /// Byte is not one of the known result codes.
    #[error("unknown result code {0}")]
    UnknownResultCode(u8),

    /// Second acknowledgement stage carried the wrong result.
    #[error("expected {expected} but got {received}")]
    UnexpectedStage {
        expected: SendRfCommandResult,
        received: SendRfCommandResult,
    },
}

/// Errors reported synchronously by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The link could not be created.
    #[error("failed to open link: {0}")]
    Open(String),

    /// The request was not accepted for delivery.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The link has already been closed.
    #[error("link closed")]
    Closed,
}

/// Result type alias for rfcompanion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Converts a timeout into the millisecond count carried by errors.
pub(crate) fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(Error::ConnectionTimeout { timeout_ms: 1 }.is_timeout());
        assert!(Error::WriteFailed(WriteFailure::Timeout { timeout_ms: 1 }).is_timeout());
        assert!(!Error::WriteFailed(WriteFailure::Status(GattStatus(0x85))).is_timeout());
        assert!(Error::ResponseTimeout { timeout_ms: 1 }.is_timeout());
        assert!(!Error::NotConnected.is_timeout());
        assert!(Error::DeviceRejected(Rejection::AntennaBusy).is_device_rejection());
    }

    #[test]
    fn test_error_display() {
        let err = Error::Protocol(ProtocolError::UnexpectedStage {
            expected: SendRfCommandResult::Completed,
            received: SendRfCommandResult::AntennaBusy,
        });
        assert_eq!(
            err.to_string(),
            "protocol violation: expected COMPLETED but got ANTENNA_BUSY"
        );
        assert_eq!(
            Error::WriteFailed(WriteFailure::Status(GattStatus(0x85))).to_string(),
            "write failed: completed with status 0x85"
        );
        assert_eq!(timeout_ms(Duration::from_secs(2)), 2000);
    }
}
