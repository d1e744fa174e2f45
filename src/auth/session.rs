//! Session lifecycle: token issuance and the paired session cookies
//!
//! A successful authentication mints a signed token and emits two cookies
//! that live and die together: the HttpOnly token cookie and a
//! script-readable identity cookie with the same path and expiry. Any
//! failure (and explicit logout) emits the same pair cleared, so a client
//! retrying after a failed attempt never holds a half-valid session.

use chrono::{DateTime, Utc};

use crate::auth::jwt::{SessionClaims, SessionSigner};
use crate::types::IdpError;

/// HttpOnly cookie carrying the session token
pub const SESSION_TOKEN_COOKIE: &str = "IDHUB_JWT";

/// Script-readable cookie exposing the authenticated identity
pub const SESSION_IDENTITY_COOKIE: &str = "IDHUB_IDENTITY";

/// The two `Set-Cookie` header values for one session state change.
///
/// Always created and destroyed together; the identity cookie never
/// advertises a different identity than the one inside the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookiePair {
    pub token_cookie: String,
    pub identity_cookie: String,
}

impl SessionCookiePair {
    /// Build the pair for a freshly minted session.
    ///
    /// Both cookies expire exactly when the token does.
    fn begin(identity: &str, token: &str, expires_at: u64) -> Self {
        let expires = http_date(expires_at);
        Self {
            token_cookie: format!(
                "{}={}; HttpOnly; Path=/; Expires={}",
                SESSION_TOKEN_COOKIE, token, expires
            ),
            identity_cookie: format!(
                "{}={}; Path=/; Expires={}",
                SESSION_IDENTITY_COOKIE, identity, expires
            ),
        }
    }

    /// Build the cleared pair: empty values, immediate expiry.
    ///
    /// Idempotent; applying it twice leaves the same state as once.
    pub fn cleared() -> Self {
        Self {
            token_cookie: format!(
                "{}=; HttpOnly; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
                SESSION_TOKEN_COOKIE
            ),
            identity_cookie: format!(
                "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
                SESSION_IDENTITY_COOKIE
            ),
        }
    }
}

/// Manages the session that follows an authentication decision.
///
/// Sessions are stateless: the signed token is the only source of truth and
/// nothing is stored server-side.
#[derive(Clone)]
pub struct SessionManager {
    signer: SessionSigner,
}

impl SessionManager {
    pub fn new(signer: SessionSigner) -> Self {
        Self { signer }
    }

    /// Begin a session for an authenticated identity.
    ///
    /// Called only after a successful decision. Returns the cookie pair to
    /// apply and the minted token with its claims.
    pub fn begin_session(
        &self,
        identity: &str,
    ) -> Result<(SessionCookiePair, String, SessionClaims), IdpError> {
        let (token, claims) = self.signer.mint(identity)?;
        let pair = SessionCookiePair::begin(identity, &token, claims.exp);
        Ok((pair, token, claims))
    }

    /// End the session: the cleared cookie pair.
    ///
    /// Used for explicit logout and for every authentication failure.
    pub fn end_session(&self) -> SessionCookiePair {
        SessionCookiePair::cleared()
    }

    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }
}

/// Format a Unix timestamp as an HTTP cookie `Expires` date
fn http_date(unix_seconds: u64) -> String {
    DateTime::<Utc>::from_timestamp(unix_seconds as i64, 0)
        .unwrap_or_default()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
