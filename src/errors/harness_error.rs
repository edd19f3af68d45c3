use crate::constants::env;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    ConnectionRefused,
    Tls,
    Cancelled,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::ConnectionRefused => "connection_refused",
            TransportErrorKind::Tls => "tls",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::Other => "other",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
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

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("Relay request timed out after {} ms", timeout_ms),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "Relay request was cancelled")
    }
}

/// Every way a single endpoint test can fail. All variants except
/// `Transport` are raised before the relay is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    #[error("Unknown endpoint: {id}")]
    UnknownEndpoint { id: String, suggestions: Vec<String> },

    #[error("API not configured: no connection is available")]
    NoConfiguredConnection,

    #[error("Connection index {index} is out of range ({available} configured)")]
    ConnectionIndexOutOfRange { index: usize, available: usize },

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Transport error ({0})")]
    Transport(#[from] TransportError),
}

impl HarnessError {
    pub fn missing_parameter(name: impl Into<String>) -> Self {
        HarnessError::MissingParameter(name.into())
    }

    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        HarnessError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        HarnessError::InvalidConfiguration(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            HarnessError::UnknownEndpoint { .. } => "UNKNOWN_ENDPOINT",
            HarnessError::NoConfiguredConnection => "NO_CONFIGURED_CONNECTION",
            HarnessError::ConnectionIndexOutOfRange { .. } => "CONNECTION_INDEX_OUT_OF_RANGE",
            HarnessError::MissingParameter(_) => "MISSING_PARAMETER",
            HarnessError::InvalidParameter { .. } => "INVALID_PARAMETER",
            HarnessError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            HarnessError::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    /// True for failures detected before any network activity.
    pub fn is_validation(&self) -> bool {
        !matches!(self, HarnessError::Transport(_))
    }

    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            HarnessError::Transport(err) => Some(err.kind),
            _ => None,
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            HarnessError::UnknownEndpoint { suggestions, .. } if !suggestions.is_empty() => {
                Some(format!("Did you mean: {}?", suggestions.join(", ")))
            }
            HarnessError::UnknownEndpoint { .. } => {
                Some("Run endpoint_list to see the registered endpoints.".to_string())
            }
            HarnessError::NoConfiguredConnection => Some(format!(
                "Set {} and {} with one entry per upstream account.",
                env::TOKENS,
                env::PROPERTY_IDS
            )),
            HarnessError::ConnectionIndexOutOfRange { available, .. } if *available > 0 => Some(
                format!("Use a connection index between 0 and {}.", available - 1),
            ),
            HarnessError::Transport(err) if err.kind == TransportErrorKind::Tls => Some(format!(
                "Check the upstream certificate or set {}=1 for diagnostics only.",
                env::INSECURE_TLS
            )),
            _ => None,
        }
    }
}

/// Wire shape of a failed invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_kind: Option<TransportErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&HarnessError> for ErrorResult {
    fn from(err: &HarnessError) -> Self {
        let details = match err {
            HarnessError::UnknownEndpoint { suggestions, .. } if !suggestions.is_empty() => {
                Some(serde_json::json!({ "did_you_mean": suggestions }))
            }
            HarnessError::MissingParameter(name) => Some(serde_json::json!({ "param": name })),
            HarnessError::InvalidParameter { name, reason } => {
                Some(serde_json::json!({ "param": name, "reason": reason }))
            }
            _ => None,
        };
        let message = match err {
            HarnessError::Transport(inner) => inner.message.clone(),
            other => other.to_string(),
        };
        Self {
            error_code: err.code().to_string(),
            message,
            hint: err.hint(),
            transport_kind: err.transport_kind(),
            details,
        }
    }
}

impl From<HarnessError> for ErrorResult {
    fn from(err: HarnessError) -> Self {
        ErrorResult::from(&err)
    }
}
