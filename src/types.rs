//! Error types for the IDHub identity provider

use hyper::StatusCode;

/// Main error type for IdP operations
#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Identity resolution failed: {0}")]
    Resolution(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("no matching trust relationship")]
    NoMatchingTrust,

    #[error("Challenge store error: {0}")]
    ChallengeStore(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl IdpError {
    /// Convert error to HTTP status code
    ///
    /// Every decision-engine error maps to UNAUTHORIZED so the response shape
    /// never leaks which trust check failed; only the reason string differs.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNAUTHORIZED,
            Self::Resolution(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            Self::NoMatchingTrust => StatusCode::UNAUTHORIZED,
            Self::ChallengeStore(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Http(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for IdpError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for IdpError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for IdpError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<crate::resolver::ResolverError> for IdpError {
    fn from(err: crate::resolver::ResolverError) -> Self {
        Self::Resolution(err.to_string())
    }
}

impl From<reqwest::Error> for IdpError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for IdpError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Auth(format!("JWT error: {}", err))
    }
}

/// Result type alias for IdP operations
pub type Result<T> = std::result::Result<T, IdpError>;
