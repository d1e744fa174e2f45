//! Authentication decision engine
//!
//! Given a challenge message, a signature, and a claimed identity, decides
//! which trust relationship (if any) justifies authentication:
//!
//! 1. Self-signed: the recovered address IS the claimed identity
//! 2. Owner-signed: the recovered address is the identity's registered owner
//! 3. AuthKey-signed: the recovered public key holds the "sigAuth" capability
//!
//! Checks apply in that priority order; the first match wins. All address
//! comparisons are case-insensitive.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::crypto::{normalize_address, recover_address, recover_public_key};
use crate::resolver::IdentityResolver;
use crate::types::IdpError;

/// Capability name under which delegated authentication keys are registered
pub const SIG_AUTH_CAPABILITY: &str = "sigAuth";

/// One authentication attempt: a challenge message, a signature over it,
/// and the identity the caller claims to be.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub message: String,
    pub signature: String,
    pub claimed_identity: String,
}

/// Trust relationship that justified a successful authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Recovered address equals the claimed identity
    SelfSigned,
    /// Recovered address equals the identity's registered owner
    OwnerSigned,
    /// Recovered public key is a registered "sigAuth" key for the identity
    AuthKeySigned,
}

impl fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthOutcome::SelfSigned => write!(f, "sign by self"),
            AuthOutcome::OwnerSigned => write!(f, "sign by did owner"),
            AuthOutcome::AuthKeySigned => write!(f, "sign with authKey"),
        }
    }
}

/// Decision engine over an identity resolver.
///
/// Stateless with respect to requests: every call re-evaluates from its
/// inputs plus resolver state at call time. Safe to share across concurrent
/// requests.
pub struct DecisionEngine {
    resolver: Arc<dyn IdentityResolver>,
}

impl DecisionEngine {
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { resolver }
    }

    /// Evaluate one authentication request.
    ///
    /// Every step executes even when an earlier one already determines the
    /// outcome; the resolver performs its own audit logging per lookup, and
    /// a partially evaluated request must never short-circuit those calls.
    pub async fn decide(&self, req: &AuthRequest) -> Result<AuthOutcome, IdpError> {
        if req.claimed_identity.is_empty() {
            return Err(IdpError::Validation("Missing claimed identity".into()));
        }
        if req.signature.is_empty() {
            return Err(IdpError::Validation("Missing signature".into()));
        }

        let owner = self.resolver.resolve_owner(&req.claimed_identity).await?;

        let public_key = recover_public_key(&req.message, &req.signature)?;

        // The authorization lookup runs unconditionally but its error does
        // not abort evaluation; it is held and only surfaced if neither of
        // the stronger trust checks matches (fail closed, never silent-false).
        let authorized = self
            .resolver
            .is_authorized_key(&req.claimed_identity, SIG_AUTH_CAPABILITY, &public_key)
            .await;
        if let Err(ref e) = authorized {
            warn!(identity = %req.claimed_identity, error = %e, "Authorized-key lookup failed");
        }

        let recovered = recover_address(&req.message, &req.signature)?;

        debug!(
            identity = %req.claimed_identity,
            owner = %owner,
            recovered = %recovered,
            "Applying trust checks"
        );

        if normalize_address(&recovered) == normalize_address(&req.claimed_identity) {
            return Ok(AuthOutcome::SelfSigned);
        }

        if normalize_address(&owner) == normalize_address(&recovered) {
            return Ok(AuthOutcome::OwnerSigned);
        }

        match authorized {
            Ok(true) => Ok(AuthOutcome::AuthKeySigned),
            Ok(false) => Err(IdpError::NoMatchingTrust),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{address_from_verifying_key, hash_personal_message};
    use crate::resolver::ResolverError;
    use async_trait::async_trait;
    use k256::ecdsa::SigningKey;

    /// Resolver stub with scripted owner and authorization results
    struct ScriptedResolver {
        owner: Result<String, String>,
        authorized: Result<bool, String>,
    }

    #[async_trait]
    impl IdentityResolver for ScriptedResolver {
        async fn resolve_owner(&self, identity: &str) -> Result<String, ResolverError> {
            self.owner
                .clone()
                .map_err(|_| ResolverError::UnknownIdentity(identity.to_string()))
        }

        async fn is_authorized_key(
            &self,
            _identity: &str,
            _capability: &str,
            _public_key: &str,
        ) -> Result<bool, ResolverError> {
            self.authorized
                .clone()
                .map_err(ResolverError::Unreachable)
        }
    }

    fn engine(owner: &str, authorized: Result<bool, String>) -> DecisionEngine {
        DecisionEngine::new(Arc::new(ScriptedResolver {
            owner: Ok(owner.to_string()),
            authorized,
        }))
    }

    fn signer(seed: u8) -> SigningKey {
        SigningKey::from_slice(&[seed; 32]).unwrap()
    }

    fn address_of(key: &SigningKey) -> String {
        address_from_verifying_key(key.verifying_key())
    }

    fn sign(key: &SigningKey, message: &str) -> String {
        let digest = hash_personal_message(message);
        let (sig, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }

    fn request(key: &SigningKey, message: &str, claimed: &str) -> AuthRequest {
        AuthRequest {
            message: message.to_string(),
            signature: sign(key, message),
            claimed_identity: claimed.to_string(),
        }
    }

    #[tokio::test]
    async fn test_self_signed() {
        // Scenario A: signature recovers to the claimed identity itself
        let key = signer(1);
        let req = request(&key, "challenge1", &address_of(&key));

        let engine = engine("0xbbbbbb", Ok(false));
        assert_eq!(engine.decide(&req).await.unwrap(), AuthOutcome::SelfSigned);
    }

    #[tokio::test]
    async fn test_self_signed_is_case_insensitive() {
        let key = signer(1);
        let claimed = address_of(&key).to_uppercase().replace("0X", "0x");
        let req = request(&key, "challenge1", &claimed);

        let engine = engine("0xbbbbbb", Ok(false));
        assert_eq!(engine.decide(&req).await.unwrap(), AuthOutcome::SelfSigned);
    }

    #[tokio::test]
    async fn test_owner_signed() {
        // Scenario B: owner's key signs for a different claimed identity
        let owner_key = signer(2);
        let req = request(&owner_key, "challenge1", "0xaaaaaa");

        let engine = engine(&address_of(&owner_key), Ok(false));
        assert_eq!(engine.decide(&req).await.unwrap(), AuthOutcome::OwnerSigned);
    }

    #[tokio::test]
    async fn test_auth_key_signed() {
        // Scenario C: delegated key, neither self nor owner, but authorized
        let delegated_key = signer(3);
        let req = request(&delegated_key, "challenge1", "0xaaaaaa");

        let engine = engine("0xbbbbbb", Ok(true));
        assert_eq!(
            engine.decide(&req).await.unwrap(),
            AuthOutcome::AuthKeySigned
        );
    }

    #[tokio::test]
    async fn test_self_signed_wins_over_authorized_key() {
        // Priority order: self-signature beats everything else
        let key = signer(1);
        let req = request(&key, "challenge1", &address_of(&key));

        let engine = engine(&address_of(&key), Ok(true));
        assert_eq!(engine.decide(&req).await.unwrap(), AuthOutcome::SelfSigned);
    }

    #[tokio::test]
    async fn test_no_matching_trust() {
        // Scenario D: no relationship holds
        let key = signer(4);
        let req = request(&key, "challenge1", "0xaaaaaa");

        let engine = engine("0xbbbbbb", Ok(false));
        assert!(matches!(
            engine.decide(&req).await,
            Err(IdpError::NoMatchingTrust)
        ));
    }

    #[tokio::test]
    async fn test_resolver_failure_fails_the_decision() {
        // Scenario E: registry unreachable during owner resolution
        let key = signer(4);
        let req = request(&key, "challenge1", "0xaaaaaa");

        let engine = DecisionEngine::new(Arc::new(ScriptedResolver {
            owner: Err("unreachable".into()),
            authorized: Ok(true),
        }));
        assert!(matches!(
            engine.decide(&req).await,
            Err(IdpError::Resolution(_))
        ));
    }

    #[tokio::test]
    async fn test_authorization_lookup_error_does_not_mask_self_signature() {
        // The lookup error must not abort evaluation when a stronger check matches
        let key = signer(1);
        let req = request(&key, "challenge1", &address_of(&key));

        let engine = engine("0xbbbbbb", Err("registry timeout".into()));
        assert_eq!(engine.decide(&req).await.unwrap(), AuthOutcome::SelfSigned);
    }

    #[tokio::test]
    async fn test_authorization_lookup_error_fails_closed() {
        // With no stronger match, the held lookup error surfaces instead of
        // degrading to a plain trust mismatch
        let key = signer(4);
        let req = request(&key, "challenge1", "0xaaaaaa");

        let engine = engine("0xbbbbbb", Err("registry timeout".into()));
        assert!(matches!(
            engine.decide(&req).await,
            Err(IdpError::Resolution(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_signature() {
        let engine = engine("0xbbbbbb", Ok(false));
        let req = AuthRequest {
            message: "challenge1".into(),
            signature: "0xdeadbeef".into(),
            claimed_identity: "0xaaaaaa".into(),
        };
        assert!(matches!(
            engine.decide(&req).await,
            Err(IdpError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_fields_rejected_before_resolution() {
        let engine = engine("0xbbbbbb", Ok(false));

        let no_identity = AuthRequest {
            message: "m".into(),
            signature: "0xff".into(),
            claimed_identity: String::new(),
        };
        assert!(matches!(
            engine.decide(&no_identity).await,
            Err(IdpError::Validation(_))
        ));

        let no_signature = AuthRequest {
            message: "m".into(),
            signature: String::new(),
            claimed_identity: "0xaaa".into(),
        };
        assert!(matches!(
            engine.decide(&no_signature).await,
            Err(IdpError::Validation(_))
        ));
    }
}
