// ── Core error types ──
//
// Domain errors from rently-core. Consumers never see HTTP status codes
// or JSON parse failures directly: the `From<rently_api::Error>` impl
// translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Account errors ───────────────────────────────────────────────
    /// Credentials rejected or login budget exhausted. The host must
    /// re-authenticate; scheduled fleet refreshes are suspended.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// A fleet refresh failed in a recoverable way.
    #[error("Update failed: {message}")]
    UpdateFailed { message: String },

    #[error("Cannot connect to the Rently cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("State not supported: {message}")]
    StateNotSupported { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The account needs new credentials before anything else can succeed.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    /// Retrying later on the normal schedule may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UpdateFailed { .. }
                | Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::Api { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<rently_api::Error> for CoreError {
    fn from(err: rently_api::Error) -> Self {
        match err {
            rently_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            rently_api::Error::MissingParameters(param) => CoreError::AuthenticationFailed {
                message: format!("missing {param}"),
            },
            rently_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            rently_api::Error::NotConnected => CoreError::AuthenticationFailed {
                message: "Not logged in".into(),
            },
            rently_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            rently_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            rently_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            rently_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            rently_api::Error::InvalidResponse { message, body: _ } => CoreError::Api {
                message: format!("Invalid response: {message}"),
                status: None,
            },
        }
    }
}
