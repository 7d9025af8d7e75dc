use thiserror::Error;

use crate::public_ip::EndpointFailure;

/// Top-level error type for the `lavascope-api` crate.
///
/// Covers every failure mode of the firewall endpoints and the public-IP
/// resolver. `lavascope-core` classifies these into user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// No API token configured; the request was never sent.
    #[error("API key required for {endpoint}")]
    MissingApiKey { endpoint: String },

    // ── HTTP ────────────────────────────────────────────────────────
    /// Non-success status returned by the API.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Request cancelled before it settled.
    #[error("Request aborted")]
    Aborted,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Public IP ───────────────────────────────────────────────────
    /// Every public-IP endpoint failed.
    #[error("All {} public IP endpoints failed", failures.len())]
    AllEndpointsFailed { failures: Vec<EndpointFailure> },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::AllEndpointsFailed { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status code, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_404_is_not_found() {
        let err = Error::Http {
            status: 404,
            message: "Not Found".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn timeout_is_transient_but_http_is_not() {
        assert!(Error::Timeout { timeout_ms: 5000 }.is_transient());
        assert!(
            !Error::Http {
                status: 403,
                message: "Forbidden".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn all_endpoints_failed_counts_failures() {
        let err = Error::AllEndpointsFailed {
            failures: vec![
                EndpointFailure {
                    endpoint: "https://a".into(),
                    reason: "boom".into(),
                },
                EndpointFailure {
                    endpoint: "https://b".into(),
                    reason: "boom".into(),
                },
            ],
        };
        assert_eq!(err.to_string(), "All 2 public IP endpoints failed");
    }
}
