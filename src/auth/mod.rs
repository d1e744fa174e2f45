//! Authentication for the IDHub identity provider
//!
//! Provides:
//! - The three-tier trust decision engine (self / owner / authKey)
//! - Session token generation and validation
//! - Session cookie pair lifecycle

pub mod decision;
pub mod jwt;
pub mod session;

pub use decision::{AuthOutcome, AuthRequest, DecisionEngine, SIG_AUTH_CAPABILITY};
pub use jwt::{SessionClaims, SessionSigner, TokenValidationResult, SESSION_TTL_SECONDS};
pub use session::{
    SessionCookiePair, SessionManager, SESSION_IDENTITY_COOKIE, SESSION_TOKEN_COOKIE,
};
