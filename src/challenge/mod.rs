//! Challenge message store client
//!
//! Challenges are generated and bound to an identity by an external store;
//! each one is single-use by construction. This module only reads them back:
//! the login challenge for `/auth/verify` and the registration message for
//! the `/auth/booking` lookup flow.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::IdpError;

/// Read interface to the external challenge store
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Fetch the one-time login challenge bound to an identity
    async fn challenge_message(&self, identity: &str) -> Result<String, IdpError>;

    /// Fetch the registration message bound to an identity
    async fn registration_message(&self, identity: &str) -> Result<String, IdpError>;
}

/// HTTP client for a remote challenge store
pub struct HttpChallengeStore {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpChallengeStore {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent("idhub-idp/1.0")
            .build()
            .unwrap_or_default();

        Self {
            endpoint: endpoint.into(),
            http_client,
        }
    }

    async fn fetch(&self, kind: &str, identity: &str) -> Result<String, IdpError> {
        let url = format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            kind,
            identity
        );
        debug!(identity = %identity, url = %url, "Fetching challenge message");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| IdpError::ChallengeStore(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdpError::ChallengeStore(format!(
                "No message for identity {} (HTTP {})",
                identity,
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| IdpError::ChallengeStore(e.to_string()))
    }
}

#[async_trait]
impl ChallengeStore for HttpChallengeStore {
    async fn challenge_message(&self, identity: &str) -> Result<String, IdpError> {
        self.fetch("challenge", identity).await
    }

    async fn registration_message(&self, identity: &str) -> Result<String, IdpError> {
        self.fetch("registration", identity).await
    }
}

/// In-memory challenge store for dev mode and tests
#[derive(Default)]
pub struct MemoryChallengeStore {
    challenges: RwLock<HashMap<String, String>>,
    registrations: RwLock<HashMap<String, String>>,
}

impl MemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_challenge(&self, identity: &str, message: &str) {
        let mut map = self.challenges.write().await;
        map.insert(identity.to_string(), message.to_string());
    }

    pub async fn put_registration(&self, identity: &str, message: &str) {
        let mut map = self.registrations.write().await;
        map.insert(identity.to_string(), message.to_string());
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn challenge_message(&self, identity: &str) -> Result<String, IdpError> {
        let map = self.challenges.read().await;
        map.get(identity)
            .cloned()
            .ok_or_else(|| IdpError::ChallengeStore(format!("No challenge for {}", identity)))
    }

    async fn registration_message(&self, identity: &str) -> Result<String, IdpError> {
        let map = self.registrations.read().await;
        map.get(identity)
            .cloned()
            .ok_or_else(|| {
                IdpError::ChallengeStore(format!("No registration message for {}", identity))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        tokio_test::block_on(async {
            let store = MemoryChallengeStore::new();
            store.put_challenge("0xaaa", "challenge-1").await;
            store.put_registration("0xaaa", "welcome to IDHub").await;

            assert_eq!(
                store.challenge_message("0xaaa").await.unwrap(),
                "challenge-1"
            );
            assert_eq!(
                store.registration_message("0xaaa").await.unwrap(),
                "welcome to IDHub"
            );
        });
    }

    #[test]
    fn test_memory_store_unknown_identity() {
        tokio_test::block_on(async {
            let store = MemoryChallengeStore::new();
            assert!(matches!(
                store.challenge_message("0xbbb").await,
                Err(IdpError::ChallengeStore(_))
            ));
        });
    }
}
