use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tonic::{Code, Status};

/// The lifecycle operation an [`RpcError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Spawn,
    Remove,
    List,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Spawn => "spawn",
            Operation::Remove => "remove",
            Operation::List => "list",
        };
        f.write_str(name)
    }
}

/// Raised while opening the channel to the daemon.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid socket path {path:?}: {reason}")]
    InvalidSocketPath { path: PathBuf, reason: String },

    #[error("Failed to build endpoint for {target}")]
    Endpoint {
        target: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("Failed to connect to junctiond at {target}")]
    Connect {
        target: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("Timed out connecting to junctiond at {target} after {timeout:?}")]
    ConnectTimeout { target: String, timeout: Duration },

    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
}

/// Raised by any lifecycle operation.
///
/// All failure causes share this one type. The variant and the gRPC code are
/// kept so callers can decide on their own retry policy.
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("{operation} failed with {code:?}: {message}")]
    Status {
        operation: Operation,
        code: Code,
        message: String,
    },

    #[error("{operation} rejected by daemon: {message}")]
    Rejected { operation: Operation, message: String },

    #[error("{operation} cancelled by caller")]
    Cancelled { operation: Operation },

    #[error("{operation} exceeded its deadline")]
    DeadlineExceeded { operation: Operation },

    #[error("{operation} aborted: channel closed")]
    ChannelClosed { operation: Operation },
}

impl RpcError {
    pub fn from_status(operation: Operation, status: Status) -> Self {
        RpcError::Status {
            operation,
            code: status.code(),
            message: status.message().to_string(),
        }
    }

    pub fn status(operation: Operation, code: Code, message: impl Into<String>) -> Self {
        RpcError::Status {
            operation,
            code,
            message: message.into(),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            RpcError::Status { operation, .. }
            | RpcError::Rejected { operation, .. }
            | RpcError::Cancelled { operation }
            | RpcError::DeadlineExceeded { operation }
            | RpcError::ChannelClosed { operation } => *operation,
        }
    }

    /// The closest gRPC code for this failure.
    pub fn code(&self) -> Code {
        match self {
            RpcError::Status { code, .. } => *code,
            RpcError::Rejected { .. } => Code::FailedPrecondition,
            RpcError::Cancelled { .. } | RpcError::ChannelClosed { .. } => Code::Cancelled,
            RpcError::DeadlineExceeded { .. } => Code::DeadlineExceeded,
        }
    }

    /// The daemon's own message where there is one, otherwise the display text.
    pub fn message(&self) -> String {
        match self {
            RpcError::Status { message, .. } | RpcError::Rejected { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

impl From<RpcError> for Status {
    fn from(err: RpcError) -> Self {
        Status::new(err.code(), err.message())
    }
}

/// Raised by `close`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloseError {
    #[error("Channel to {target} is already closed")]
    AlreadyClosed { target: String },

    #[error("Channel state lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_passthrough() {
        let err = RpcError::from_status(Operation::Remove, Status::not_found("no instance f9"));
        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(err.operation(), Operation::Remove);
        assert_eq!(err.message(), "no instance f9");
        assert!(err.to_string().starts_with("remove failed"));
    }

    #[test]
    fn test_local_failures_map_to_codes() {
        let cancelled = RpcError::Cancelled {
            operation: Operation::List,
        };
        assert_eq!(cancelled.code(), Code::Cancelled);

        let late = RpcError::DeadlineExceeded {
            operation: Operation::Spawn,
        };
        let status = Status::from(late);
        assert_eq!(status.code(), Code::DeadlineExceeded);
        assert_eq!(status.message(), "spawn exceeded its deadline");
    }
}
