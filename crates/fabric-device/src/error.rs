//! Error types for device operations.
//!
//! Everything a device adapter, transport or resolver can fail with is a
//! [`DeviceError`]. Protocol replies are classified into these variants by
//! [`crate::transport::classify_reply`].

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Message used by switches when the logged-in user lacks privileges.
pub const NOT_AUTHORIZED_MESSAGE: &str =
    "%Error: User is not authorized to perform this operation";

/// Errors that can occur while talking to a switch.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No adapter is registered for the model/firmware combination.
    #[error("unsupported model and firmware version {model}")]
    Unsupported {
        /// The `code_version` model string.
        model: String,
    },

    /// The device rejected the request for lack of privileges.
    #[error("{}", NOT_AUTHORIZED_MESSAGE)]
    NotAuthorized,

    /// The device answered with a structured protocol error.
    #[error("{message}")]
    Protocol {
        /// Message extracted from the reply body.
        message: String,
    },

    /// Connection-level failure, passed through unchanged.
    #[error("{message}")]
    Transport {
        /// The host the session was talking to.
        host: String,
        /// Error message.
        message: String,
    },

    /// Could not establish or authenticate the session.
    #[error("Login to {host} failed: {message}")]
    Login {
        /// The host that refused the login.
        host: String,
        /// Error message.
        message: String,
    },

    /// Spawning or talking to the SSH child process failed.
    #[error("I/O error talking to {host}: {source}")]
    Io {
        /// The host of the session.
        host: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A typed parameter failed validation.
    #[error("Invalid parameter {field}: {message}")]
    InvalidParam {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// A reply could not be parsed.
    #[error("Failed to parse {what}: {message}")]
    Parse {
        /// What was being parsed.
        what: String,
        /// Error message.
        message: String,
    },

    /// No adapter in the delegation chain implements the operation.
    #[error("operation {operation} is not supported by this device")]
    OperationUnsupported {
        /// The operation name.
        operation: String,
    },

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation did not finish in time.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long it ran.
        elapsed: Duration,
    },
}

impl DeviceError {
    /// Creates an unsupported model error.
    pub fn unsupported(model: impl Into<String>) -> Self {
        Self::Unsupported {
            model: model.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Creates a login error.
    pub fn login(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Login {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(host: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            host: host.into(),
            source,
        }
    }

    /// Creates an invalid parameter error.
    pub fn invalid_param(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParam {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Creates an operation unsupported error.
    pub fn operation_unsupported(operation: impl Into<String>) -> Self {
        Self::OperationUnsupported {
            operation: operation.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeviceError::Transport { .. }
                | DeviceError::Io { .. }
                | DeviceError::Timeout { .. }
                | DeviceError::Login { .. }
        )
    }
}
