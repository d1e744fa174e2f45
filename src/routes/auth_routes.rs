//! HTTP routes for authentication
//!
//! Provides the identity provider endpoints:
//! - POST /auth/verify  - Verify a challenge signature and begin a session
//! - POST /auth/logout  - Clear the session cookie pair
//! - GET  /auth/booking - Look up the registration message for an identity

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{AuthOutcome, AuthRequest, SessionCookiePair};
use crate::server::AppState;
use crate::types::IdpError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

// =============================================================================
// Request Types
// =============================================================================

/// Body of POST /auth/verify
///
/// The challenge message is not trusted from the client; it is re-fetched
/// from the challenge store keyed by `addr`. Only `sig` and `addr` matter.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Challenge message as the client saw it (informational only)
    #[serde(default)]
    pub msg: String,
    /// Hex-encoded signature over the challenge message
    #[serde(default)]
    pub sig: String,
    /// Claimed identity (DID or address)
    #[serde(default)]
    pub addr: String,
}

// =============================================================================
// Response Helpers
// =============================================================================

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Access-Control-Allow-Origin", "*")
        .body(full_body(body))
        .unwrap()
}

fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

/// Build a response carrying both session cookies
fn response_with_cookies(
    status: StatusCode,
    cookies: &SessionCookiePair,
    body: BoxBody,
) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("Access-Control-Allow-Origin", "*")
        .header("Set-Cookie", cookies.token_cookie.as_str())
        .header("Set-Cookie", cookies.identity_cookie.as_str())
        .body(body)
        .unwrap()
}

async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<hyper::body::Incoming>,
) -> Result<T, IdpError> {
    let body = req
        .collect()
        .await
        .map_err(|e| IdpError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 10240 {
        return Err(IdpError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| IdpError::Http(format!("Invalid JSON: {}", e)))
}

fn query_param(req: &Request<hyper::body::Incoming>, name: &str) -> Option<String> {
    let query = req.uri().query()?;
    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            if key == name {
                return Some(value.to_string());
            }
        }
    }
    None
}

// =============================================================================
// Route Handlers
// =============================================================================

/// The authentication flow behind POST /auth/verify, up to but not including
/// the response. Kept separate so the handler has exactly one finalization
/// point for cookie state.
pub(crate) async fn verify_flow(
    state: &AppState,
    body: &VerifyRequest,
) -> Result<(SessionCookiePair, AuthOutcome), IdpError> {
    if body.sig.is_empty() {
        return Err(IdpError::Validation("Missing required field: sig".into()));
    }
    if body.addr.is_empty() {
        return Err(IdpError::Validation("Missing required field: addr".into()));
    }

    let message = state.challenges.challenge_message(&body.addr).await?;

    let outcome = state
        .engine
        .decide(&AuthRequest {
            message,
            signature: body.sig.clone(),
            claimed_identity: body.addr.clone(),
        })
        .await?;

    let (cookies, _token, _claims) = state.sessions.begin_session(&body.addr)?;
    Ok((cookies, outcome))
}

/// POST /auth/verify
///
/// Verify the challenge signature for a claimed identity. On success both
/// session cookies are set and the response carries no body. On any failure
/// both cookies are cleared before the unauthorized response goes out, so a
/// failed re-authentication never leaves a stale session behind.
async fn handle_verify(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let result = match parse_json_body::<VerifyRequest>(req).await {
        Ok(body) => {
            let flow = verify_flow(&state, &body).await;
            flow.map(|(cookies, outcome)| (cookies, outcome, body.addr))
        }
        Err(e) => Err(e),
    };

    match result {
        Ok((cookies, outcome, identity)) => {
            info!(identity = %identity, outcome = %outcome, "Authentication succeeded");
            response_with_cookies(StatusCode::OK, &cookies, empty_body())
        }
        Err(e) => {
            warn!(error = %e, "Authentication failed");
            let cleared = state.sessions.end_session();
            let (status, reason) = e.into_status_code_and_body();
            response_with_cookies(status, &cleared, full_body(reason))
        }
    }
}

/// POST /auth/logout
///
/// Unconditionally clears both session cookies. Always succeeds, whether or
/// not a session existed.
async fn handle_logout(
    _req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let cleared = state.sessions.end_session();
    response_with_cookies(StatusCode::OK, &cleared, empty_body())
}

/// GET /auth/booking?addr=...
///
/// Return the registration message bound to an identity, for the
/// registration lookup flow. Not part of the authentication decision.
async fn handle_booking(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let addr = query_param(&req, "addr").unwrap_or_default();
    if addr.is_empty() {
        return text_response(
            StatusCode::NOT_ACCEPTABLE,
            "Missing required parameter: addr",
        );
    }

    match state.challenges.registration_message(&addr).await {
        Ok(message) => text_response(StatusCode::OK, message),
        Err(e) => text_response(StatusCode::NOT_ACCEPTABLE, e.to_string()),
    }
}

// =============================================================================
// Route Dispatch
// =============================================================================

pub async fn handle_auth_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    // Only handle /auth/* routes
    if !path.starts_with("/auth") {
        return None;
    }

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    // Remove query string for matching
    let path = path.split('?').next().unwrap_or(path).to_string();

    let response = match (method, path.as_str()) {
        (&Method::POST, "/auth/verify") => handle_verify(req, state).await,
        (&Method::POST, "/auth/logout") => handle_logout(req, state).await,
        (&Method::GET, "/auth/booking") => handle_booking(req, state).await,

        // Method not allowed
        (_, "/auth/verify") | (_, "/auth/logout") | (_, "/auth/booking") => {
            text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }

        // Auth endpoint not found
        _ => text_response(StatusCode::NOT_FOUND, "Auth endpoint not found"),
    };

    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DecisionEngine, SessionManager, SessionSigner};
    use crate::challenge::MemoryChallengeStore;
    use crate::config::Args;
    use crate::crypto::{address_from_verifying_key, hash_personal_message};
    use crate::resolver::{IdentityResolver, ResolverError};
    use async_trait::async_trait;
    use clap::Parser;
    use k256::ecdsa::SigningKey;

    struct ScriptedResolver {
        owner: String,
        authorized: bool,
    }

    #[async_trait]
    impl IdentityResolver for ScriptedResolver {
        async fn resolve_owner(&self, _identity: &str) -> Result<String, ResolverError> {
            Ok(self.owner.clone())
        }

        async fn is_authorized_key(
            &self,
            _identity: &str,
            _capability: &str,
            _public_key: &str,
        ) -> Result<bool, ResolverError> {
            Ok(self.authorized)
        }
    }

    fn test_state(
        resolver: ScriptedResolver,
        store: MemoryChallengeStore,
    ) -> AppState {
        let args = Args::parse_from([
            "idhub-idp",
            "--dev-mode",
            "--registry-contract",
            "0x1dbf8e4b47ea53a2b932850f7fec8585c6a9c1d2",
        ]);
        AppState::with_collaborators(
            args,
            Arc::new(resolver),
            Arc::new(store),
            SessionManager::new(SessionSigner::new_dev()),
        )
    }

    fn sign(key: &SigningKey, message: &str) -> String {
        let digest = hash_personal_message(message);
        let (sig, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }

    #[tokio::test]
    async fn test_verify_flow_self_signed_sets_cookies() {
        let key = SigningKey::from_slice(&[7u8; 32]).unwrap();
        let identity = address_from_verifying_key(key.verifying_key());

        let store = MemoryChallengeStore::new();
        store.put_challenge(&identity, "challenge1").await;

        let state = test_state(
            ScriptedResolver {
                owner: "0xbbbbbb".into(),
                authorized: false,
            },
            store,
        );

        let body = VerifyRequest {
            msg: "challenge1".into(),
            sig: sign(&key, "challenge1"),
            addr: identity.clone(),
        };

        let (cookies, outcome) = verify_flow(&state, &body).await.unwrap();
        assert_eq!(outcome, AuthOutcome::SelfSigned);
        assert!(cookies.token_cookie.starts_with("IDHUB_JWT=ey"));
        assert!(cookies
            .identity_cookie
            .starts_with(&format!("IDHUB_IDENTITY={}", identity)));
    }

    #[tokio::test]
    async fn test_verify_flow_missing_signature_is_validation_error() {
        let state = test_state(
            ScriptedResolver {
                owner: "0xbbbbbb".into(),
                authorized: false,
            },
            MemoryChallengeStore::new(),
        );

        let body = VerifyRequest {
            msg: String::new(),
            sig: String::new(),
            addr: "0xaaaaaa".into(),
        };

        assert!(matches!(
            verify_flow(&state, &body).await,
            Err(IdpError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_flow_no_trust_match_fails_without_session() {
        let key = SigningKey::from_slice(&[8u8; 32]).unwrap();

        let store = MemoryChallengeStore::new();
        store.put_challenge("0xaaaaaa", "challenge1").await;

        let state = test_state(
            ScriptedResolver {
                owner: "0xbbbbbb".into(),
                authorized: false,
            },
            store,
        );

        let body = VerifyRequest {
            msg: "challenge1".into(),
            sig: sign(&key, "challenge1"),
            addr: "0xaaaaaa".into(),
        };

        assert!(matches!(
            verify_flow(&state, &body).await,
            Err(IdpError::NoMatchingTrust)
        ));
    }

    #[tokio::test]
    async fn test_verify_flow_unknown_challenge_fails() {
        // No challenge bound to the identity: the store error surfaces
        // before any resolver or signature work
        let state = test_state(
            ScriptedResolver {
                owner: "0xbbbbbb".into(),
                authorized: false,
            },
            MemoryChallengeStore::new(),
        );

        let body = VerifyRequest {
            msg: String::new(),
            sig: "0xff".into(),
            addr: "0xaaaaaa".into(),
        };

        assert!(matches!(
            verify_flow(&state, &body).await,
            Err(IdpError::ChallengeStore(_))
        ));
    }

    #[test]
    fn test_failure_response_clears_both_cookies() {
        let err = IdpError::NoMatchingTrust;
        let cleared = SessionCookiePair::cleared();
        let (status, reason) = err.into_status_code_and_body();
        let response = response_with_cookies(status, &cleared, full_body(reason));

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let cookies: Vec<_> = response.headers().get_all("Set-Cookie").iter().collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].to_str().unwrap().starts_with("IDHUB_JWT=;"));
        assert!(cookies[1].to_str().unwrap().starts_with("IDHUB_IDENTITY=;"));
    }
}
