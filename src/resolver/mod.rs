//! Identity Resolver Gateway
//!
//! Thin client for the external DID registry: resolves the owner address of
//! an identity and tests whether a public key is registered under a named
//! capability. The registry itself (method semantics, key storage) is an
//! external collaborator; this module only speaks its HTTP interface.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for the registry resolver
#[derive(Debug, Clone)]
pub struct RegistryResolverConfig {
    /// Base URL of the registry gateway (e.g. `https://registry.example.com`)
    pub endpoint: String,
    /// Identity registry contract address, passed through to the gateway
    pub contract: String,
    /// Timeout for registry requests (default: 5 seconds)
    pub request_timeout: Duration,
}

impl RegistryResolverConfig {
    pub fn new(endpoint: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            contract: contract.into(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Errors from identity resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("Registry unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),
}

/// Narrow two-call interface to the DID registry.
///
/// Implementations must be safe for concurrent invocation; the decision
/// engine calls them once per request with no synchronization.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve the owner address registered for an identity
    async fn resolve_owner(&self, identity: &str) -> Result<String, ResolverError>;

    /// Test whether a public key is registered under the named capability
    /// for an identity.
    ///
    /// A transport or registry error is NOT the same as "not authorized";
    /// callers must not collapse `Err` into `false`.
    async fn is_authorized_key(
        &self,
        identity: &str,
        capability: &str,
        public_key: &str,
    ) -> Result<bool, ResolverError>;
}

/// HTTP client for the identity registry gateway
pub struct RegistryResolver {
    config: RegistryResolverConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    owner: String,
}

#[derive(Debug, Deserialize)]
struct AuthorizationResponse {
    authorized: bool,
}

impl RegistryResolver {
    pub fn new(config: RegistryResolverConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("idhub-idp/1.0")
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
        }
    }

    fn owner_url(&self, identity: &str) -> String {
        format!(
            "{}/identity/{}/owner?contract={}",
            self.config.endpoint.trim_end_matches('/'),
            identity,
            self.config.contract
        )
    }

    fn authorization_url(&self, identity: &str, capability: &str, public_key: &str) -> String {
        format!(
            "{}/identity/{}/authorization/{}/{}?contract={}",
            self.config.endpoint.trim_end_matches('/'),
            identity,
            capability,
            public_key,
            self.config.contract
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        identity: &str,
    ) -> Result<T, ResolverError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolverError::Unreachable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResolverError::UnknownIdentity(identity.to_string()));
        }

        if !response.status().is_success() {
            return Err(ResolverError::Unreachable(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ResolverError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl IdentityResolver for RegistryResolver {
    async fn resolve_owner(&self, identity: &str) -> Result<String, ResolverError> {
        let url = self.owner_url(identity);
        debug!(identity = %identity, url = %url, "Resolving identity owner");

        let body: OwnerResponse = self.get_json(&url, identity).await?;
        Ok(body.owner)
    }

    async fn is_authorized_key(
        &self,
        identity: &str,
        capability: &str,
        public_key: &str,
    ) -> Result<bool, ResolverError> {
        let url = self.authorization_url(identity, capability, public_key);
        debug!(identity = %identity, capability = %capability, "Checking authorized key");

        let body: AuthorizationResponse = self.get_json(&url, identity).await?;
        Ok(body.authorized)
    }
}

/// Create a shared resolver instance
pub fn create_resolver(config: RegistryResolverConfig) -> Arc<RegistryResolver> {
    Arc::new(RegistryResolver::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_resolver() -> RegistryResolver {
        RegistryResolver::new(RegistryResolverConfig::new(
            "https://registry.example.com/",
            "0x1dbf8e4b47ea53a2b932850f7fec8585c6a9c1d2",
        ))
    }

    #[test]
    fn test_owner_url() {
        let resolver = test_resolver();
        assert_eq!(
            resolver.owner_url("0xaaa"),
            "https://registry.example.com/identity/0xaaa/owner\
             ?contract=0x1dbf8e4b47ea53a2b932850f7fec8585c6a9c1d2"
        );
    }

    #[test]
    fn test_authorization_url() {
        let resolver = test_resolver();
        assert_eq!(
            resolver.authorization_url("0xaaa", "sigAuth", "0x04ff"),
            "https://registry.example.com/identity/0xaaa/authorization/sigAuth/0x04ff\
             ?contract=0x1dbf8e4b47ea53a2b932850f7fec8585c6a9c1d2"
        );
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_an_error() {
        // Nothing listens on this port; the call must surface Unreachable,
        // never a silent false.
        let resolver = RegistryResolver::new(RegistryResolverConfig {
            endpoint: "http://127.0.0.1:1".into(),
            contract: "0x0".into(),
            request_timeout: Duration::from_millis(200),
        });

        let owner = resolver.resolve_owner("0xaaa").await;
        assert!(matches!(owner, Err(ResolverError::Unreachable(_))));

        let authorized = resolver.is_authorized_key("0xaaa", "sigAuth", "0x04ff").await;
        assert!(matches!(authorized, Err(ResolverError::Unreachable(_))));
    }
}
