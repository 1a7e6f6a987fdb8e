//! Receipt printing result and event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use till_printer::TransportErrorKind;

/// Why a print did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintErrorKind {
    /// No profile in the fallback chain could be opened
    ConnectionFailed,
    /// Sale data was malformed; no printer was contacted
    FormatError,
    /// Connected, but the receipt could not be transmitted (after one retry)
    TransmissionFailed,
}

/// Outcome of one `print_receipt` call
///
/// Returned to the caller, never persisted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintResult {
    pub success: bool,
    pub error_kind: Option<PrintErrorKind>,
    pub message: String,
    /// Profile the receipt went out on (or the last one tried)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl PrintResult {
    pub fn printed(profile: impl Into<String>) -> Self {
        let profile = profile.into();
        Self {
            success: true,
            error_kind: None,
            message: format!("printed on `{}`", profile),
            profile: Some(profile),
        }
    }

    pub fn failed(kind: PrintErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_kind: Some(kind),
            message: message.into(),
            profile: None,
        }
    }

    pub fn on_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}

/// Structured failure record handed to the event sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintEvent {
    pub timestamp: DateTime<Utc>,
    pub profile: String,
    pub error_kind: PrintErrorKind,
    /// Transport-level classification, when the failure came from hardware
    pub transport_error: Option<TransportErrorKind>,
    pub message: String,
}

impl PrintEvent {
    pub fn new(profile: &str, error_kind: PrintErrorKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            profile: profile.to_string(),
            error_kind,
            transport_error: None,
            message: message.into(),
        }
    }

    pub fn with_transport_error(mut self, kind: TransportErrorKind) -> Self {
        self.transport_error = Some(kind);
        self
    }
}
