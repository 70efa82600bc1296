//! Fault taxonomy for the gateway client.
//!
//! ERROR HANDLING
//! ==============
//! Every remote call resolves to a typed result or exactly one [`ApiError`].
//! Faults are classified from the HTTP status plus the backend's error
//! envelope `{error, code, details?}` when it supplies one. The client never
//! retries: the caller owns retry/display policy.

use serde::Deserialize;

/// Faults produced by gateway client operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was received (DNS, connect, or transport failure).
    #[error("network failure: {0}")]
    Network(String),

    /// The backend rejected the request's credentials (401).
    ///
    /// Carries the normal propagation path only; the session-expiry side
    /// effect travels separately on the session event channel.
    #[error("authentication rejected: {message}")]
    AuthenticationRejected {
        code: Option<String>,
        message: String,
    },

    /// The backend rejected the request content (non-401 4xx), possibly
    /// with field-level detail.
    #[error("validation rejected ({status}): {message}")]
    Validation {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// The backend failed internally (5xx).
    #[error("server fault ({status}): {message}")]
    Server {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Any other non-success response.
    #[error("unexpected response ({status}): {message}")]
    Unknown {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// A success response whose body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

/// Error envelope the backend attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: Option<String>,
    details: Option<serde_json::Value>,
}

impl ApiError {
    /// Classify a non-2xx response from its status and raw body text.
    ///
    /// A body that is not the backend's JSON error envelope falls back to
    /// the raw text (or the status line when empty) as the message.
    #[must_use]
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let (message, code, details) = match parsed {
            Some(envelope) => (envelope.error, envelope.code, envelope.details),
            None => {
                let message = if body.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.trim().to_owned()
                };
                (message, None, None)
            }
        };

        match status {
            401 => Self::AuthenticationRejected { code, message },
            400 | 402..=499 => Self::Validation { status, code, message, details },
            500..=599 => Self::Server { status, code, message },
            _ => Self::Unknown { status, code, message },
        }
    }

    /// The HTTP status that produced this fault, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network(_) | Self::Parse(_) | Self::ClientBuild(_) => None,
            Self::AuthenticationRejected { .. } => Some(401),
            Self::Validation { status, .. } | Self::Server { status, .. } | Self::Unknown { status, .. } => {
                Some(*status)
            }
        }
    }

    /// The backend's machine-readable error code, when it supplied one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Network(_) | Self::Parse(_) | Self::ClientBuild(_) => None,
            Self::AuthenticationRejected { code, .. }
            | Self::Validation { code, .. }
            | Self::Server { code, .. }
            | Self::Unknown { code, .. } => code.as_deref(),
        }
    }

    /// True for the 401 class that triggers the session-expiry side effect.
    #[must_use]
    pub fn is_authentication_rejected(&self) -> bool {
        matches!(self, Self::AuthenticationRejected { .. })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
