//! Session token handling
//!
//! Mints and validates the signed tokens backing stateless sessions.
//! The token is the only session state the server ever holds; nothing is
//! persisted server-side.
//!
//! Security notes:
//! - Tokens are signed with HS256 (HMAC-SHA256)
//! - Lifetime is fixed at 30 minutes from issuance
//! - In production, JWT_SECRET should be a strong random value from environment

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::IdpError;

/// Fixed issuer claim
pub const TOKEN_ISSUER: &str = "IDHub IdP";

/// Fixed subject claim
pub const TOKEN_SUBJECT: &str = "IDHub identity is all your life";

/// Session lifetime in seconds (30 minutes)
pub const SESSION_TTL_SECONDS: u64 = 1800;

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Expiration (iat + session TTL)
    pub exp: u64,
    /// Issuer, always [`TOKEN_ISSUER`]
    pub iss: String,
    /// Subject, always [`TOKEN_SUBJECT`]
    pub sub: String,
    /// The authenticated identity string
    pub identity: String,
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<SessionClaims>,
    pub error: Option<String>,
}

impl TokenValidationResult {
    pub fn valid(claims: SessionClaims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

/// Session token generator and validator
#[derive(Clone)]
pub struct SessionSigner {
    secret: String,
    ttl_seconds: u64,
}

impl SessionSigner {
    /// Create a new session signer
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String) -> Result<Self, IdpError> {
        if secret.is_empty() {
            return Err(IdpError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(IdpError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            ttl_seconds: SESSION_TTL_SECONDS,
        })
    }

    /// Create a signer for dev mode (allows missing secret)
    pub fn new_dev() -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            ttl_seconds: SESSION_TTL_SECONDS,
        }
    }

    /// Mint a session token for an authenticated identity.
    ///
    /// Returns the encoded token together with its claims; the caller needs
    /// `exp` to stamp matching expiry onto the session cookies.
    pub fn mint(&self, identity: &str) -> Result<(String, SessionClaims), IdpError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| IdpError::Auth(format!("System time error: {}", e)))?
            .as_secs();

        let claims = SessionClaims {
            iat: now,
            exp: now + self.ttl_seconds,
            iss: TOKEN_ISSUER.into(),
            sub: TOKEN_SUBJECT.into(),
            identity: identity.to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| IdpError::Auth(format!("Failed to generate token: {}", e)))?;

        Ok((token, claims))
    }

    /// Verify and decode a session token
    pub fn verify(&self, token: &str) -> TokenValidationResult {
        let mut validation = Validation::default();
        validation.set_issuer(&[TOKEN_ISSUER]);

        match decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => TokenValidationResult::valid(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    ErrorKind::InvalidIssuer => "Invalid issuer",
                    _ => "Token validation failed",
                };
                TokenValidationResult::invalid(error_msg)
            }
        }
    }
}
