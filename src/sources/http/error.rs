use thiserror::Error;

/// Errors from the observed-state HTTP API.
///
/// SECURITY: Error messages must NEVER contain the bearer token.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The API rejected the credentials (401/403)
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// API returned an error response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network-level error (connection failed, timeout, etc.)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid token format")]
    InvalidToken,
}
