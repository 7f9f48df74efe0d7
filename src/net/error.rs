//! Connection and call error types.

use std::time::Duration;
use thiserror::Error;
use tonic::{Code, Status};

/// Errors raised while establishing or re-establishing the transport channel.
#[derive(Debug, Clone, Error)]
pub enum ConnectError {
    /// The configured server address cannot be turned into an endpoint.
    #[error("invalid server address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Dial failed at the transport layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// Bounded reconnect attempts were all used up.
    #[error("reconnect failed after {0} attempts")]
    Exhausted(u32),

    /// Shutdown was observed; not a real failure.
    #[error("shutdown in progress")]
    ShuttingDown,
}

/// Errors raised by a single RPC attempt.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// The attempt did not complete within its deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// No channel is available (state is not `Connected`).
    #[error("no active connection")]
    NotConnected,

    /// Retryable failure reported by the service or the transport.
    #[error("transient call error ({code:?}): {message}")]
    Transient { code: Code, message: String },

    /// Semantic rejection; retrying cannot help.
    #[error("fatal call error ({code:?}): {message}")]
    Fatal { code: Code, message: String },
}

impl CallError {
    /// Whether this error must short-circuit the retry sequence.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CallError::Fatal { .. })
    }

    /// Build a transient error outside of a gRPC status (e.g. readiness failures).
    pub fn transient(message: impl Into<String>) -> Self {
        CallError::Transient {
            code: Code::Unavailable,
            message: message.into(),
        }
    }
}

impl From<Status> for CallError {
    fn from(status: Status) -> Self {
        let code = status.code();
        let message = status.message().to_string();
        if is_fatal_code(code) {
            CallError::Fatal { code, message }
        } else {
            CallError::Transient { code, message }
        }
    }
}

/// Status codes that describe a request the server will never accept as sent.
fn is_fatal_code(code: Code) -> bool {
    matches!(
        code,
        Code::InvalidArgument
            | Code::NotFound
            | Code::AlreadyExists
            | Code::PermissionDenied
            | Code::FailedPrecondition
            | Code::OutOfRange
            | Code::Unimplemented
            | Code::Unauthenticated
    )
}
