use thiserror::Error;

/// Top-level error type for the `rently-api` crate.
///
/// Covers every failure mode of the cloud client: login, transport,
/// API responses, and payload decoding. `rently-core` maps these into
/// the coordinator's domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, disabled account, no token issued).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Login attempted without a required parameter.
    #[error("Missing login parameter: {0}")]
    MissingParameters(&'static str),

    /// The bearer token was rejected by the device API.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// An API call was made before any successful login.
    #[error("Not logged in")]
    NotConnected,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP status from the device API.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Response body could not be decoded, with the raw body for debugging.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the session or credentials
    /// are no longer valid and a fresh login is required.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::SessionExpired | Self::NotConnected
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }
}
