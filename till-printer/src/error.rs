//! Error types for the printer library

use std::fmt;

use thiserror::Error;

/// Failure classes of the transport layer
///
/// `NotFound`, `PermissionDenied` and `Timeout` come out of `open()`;
/// `IoFailure` only happens after a connection was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Device absent or host unreachable
    NotFound,
    /// Device present, access denied
    PermissionDenied,
    /// No response within the configured window
    Timeout,
    /// Transmission error after a successful open
    IoFailure,
}

impl TransportErrorKind {
    /// Whether this failure happened while connecting (fallback-eligible)
    pub fn is_connect_failure(self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::PermissionDenied | Self::Timeout
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::Timeout => "timeout",
            Self::IoFailure => "io failure",
        };
        f.write_str(s)
    }
}

/// Transport error with its classification
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::PermissionDenied, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn io_failure(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::IoFailure, message)
    }

    /// Classify an I/O error raised while connecting
    ///
    /// Anything that is neither an access nor a timing problem means the
    /// printer could not be reached, so it is reported as `NotFound`.
    pub fn from_open_io(err: &std::io::Error, context: &str) -> Self {
        use std::io::ErrorKind;

        let message = format!("{}: {}", context, err);
        match err.kind() {
            ErrorKind::PermissionDenied => Self::permission_denied(message),
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Self::timeout(message),
            _ => Self::not_found(message),
        }
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Invalid printer configuration, naming the offending field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },

    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unknown device type `{0}` (expected usb, serial or network)")]
    UnknownDeviceType(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the field at fault, if any
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => Some(field),
            Self::UnknownDeviceType(_) => Some("device_type"),
        }
    }
}
