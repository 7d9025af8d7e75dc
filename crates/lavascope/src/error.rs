//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use lavascope_config::ConfigError;
use lavascope_core::{CoreError, TransportKind};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Vultr API: {message}")]
    #[diagnostic(
        code(lavascope::connection_failed),
        help("Check your network connection and the --api-url / profile api_url setting.")
    )]
    ConnectionFailed { message: String },

    #[error("Public IP lookup failed on every endpoint")]
    #[diagnostic(
        code(lavascope::public_ip),
        help("{details}\nOverride the lists with ipv4_endpoints / ipv6_endpoints in your profile.")
    )]
    PublicIpUnavailable { details: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(lavascope::auth_failed),
        help(
            "Verify your API key and that API access is enabled for this machine's IP.\n\
             Run: lavascope config set-token"
        )
    )]
    AuthFailed { message: String },

    #[error("No API key configured for profile '{profile}'")]
    #[diagnostic(
        code(lavascope::no_credentials),
        help(
            "Store one with: lavascope config set-token\n\
             Or set the LAVASCOPE_API_KEY environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(lavascope::not_found),
        help("Run: lavascope {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{message}")]
    #[diagnostic(
        code(lavascope::conflict),
        help("Another change to this entity is still in progress; retry once it settles.")
    )]
    Conflict { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({status}): {message}")]
    #[diagnostic(code(lavascope::api_error))]
    ApiError { status: u16, message: String },

    #[error("{0}")]
    #[diagnostic(code(lavascope::internal))]
    Internal(String),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lavascope::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(lavascope::config))]
    Config(#[from] ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(lavascope::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out: {message}")]
    #[diagnostic(
        code(lavascope::timeout),
        help("Increase the timeout with --timeout (milliseconds) or timeout_ms in your profile.")
    )]
    Timeout { message: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::PublicIpUnavailable { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Authentication { message } | CoreError::Http { status: 401, message } => {
                CliError::AuthFailed { message }
            }

            CoreError::NotFound { entity, key } => CliError::NotFound {
                resource_type: entity.into(),
                list_command: list_command(entity).into(),
                identifier: key,
            },

            err @ CoreError::Conflict { .. } => CliError::Conflict {
                message: err.to_string(),
            },

            CoreError::Http { status, message } => CliError::ApiError { status, message },

            CoreError::Transport {
                kind: TransportKind::Timeout,
                message,
            } => CliError::Timeout { message },

            err @ CoreError::Transport { .. } => CliError::ConnectionFailed {
                message: err.to_string(),
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<lavascope_api::Error> for CliError {
    fn from(err: lavascope_api::Error) -> Self {
        match err {
            lavascope_api::Error::AllEndpointsFailed { failures } => CliError::PublicIpUnavailable {
                details: failures
                    .iter()
                    .map(|f| format!("  {}: {}", f.endpoint, f.reason))
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
            other => CoreError::from(other).into(),
        }
    }
}

fn list_command(entity: &str) -> &'static str {
    match entity {
        "rule" => "rules list <group>",
        _ => "groups list",
    }
}
