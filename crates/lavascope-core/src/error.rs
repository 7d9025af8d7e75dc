// ── Core error types ──
//
// User-facing errors from lavascope-core. The `From<lavascope_api::Error>`
// impl classifies transport-layer failures; the coordinator adds the local
// ones (validation, conflict, not found).

use thiserror::Error;

/// Broad class of a [`CoreError`], used to pick rollback messages and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    Auth,
    Http,
    Transport,
    Conflict,
    NotFound,
    Internal,
}

/// What kind of transport failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TransportKind {
    #[strum(serialize = "request timed out")]
    Timeout,
    #[strum(serialize = "request aborted")]
    Aborted,
    #[strum(serialize = "connection failed")]
    Connect,
    #[strum(serialize = "network error")]
    Other,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Local ────────────────────────────────────────────────────────
    /// Malformed input; nothing was sent.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("{entity} {key} is busy, cannot {operation} it now")]
    Conflict {
        entity: &'static str,
        key: String,
        operation: &'static str,
    },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    // ── Remote ───────────────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("{kind}: {message}")]
    Transport { kind: TransportKind, message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation { .. } => ErrorClass::Validation,
            Self::Conflict { .. } => ErrorClass::Conflict,
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Authentication { .. } => ErrorClass::Auth,
            Self::Http { .. } => ErrorClass::Http,
            Self::Transport { .. } => ErrorClass::Transport,
            Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Short message suitable for a toast; HTTP errors show only the server text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lavascope_api::Error> for CoreError {
    fn from(err: lavascope_api::Error) -> Self {
        use lavascope_api::Error as Api;

        match err {
            Api::MissingApiKey { endpoint } => CoreError::Authentication {
                message: format!("API key required for {endpoint}"),
            },
            Api::Http { status, message } => CoreError::Http { status, message },
            Api::Transport(e) => {
                let kind = if e.is_timeout() {
                    TransportKind::Timeout
                } else if e.is_connect() {
                    TransportKind::Connect
                } else {
                    TransportKind::Other
                };
                CoreError::Transport {
                    kind,
                    message: e.to_string(),
                }
            }
            Api::Timeout { timeout_ms } => CoreError::Transport {
                kind: TransportKind::Timeout,
                message: format!("no response after {timeout_ms}ms"),
            },
            Api::Aborted => CoreError::Transport {
                kind: TransportKind::Aborted,
                message: "cancelled before completion".into(),
            },
            Api::InvalidUrl(e) => CoreError::Validation {
                message: format!("invalid URL: {e}"),
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            e @ Api::AllEndpointsFailed { .. } => CoreError::Transport {
                kind: TransportKind::Other,
                message: e.to_string(),
            },
        }
    }
}
