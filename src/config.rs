//! Configuration for the IDHub identity provider
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// IDHub IdP - identity provider gateway
///
/// Authenticates claimed decentralized identities by verifying challenge
/// signatures against the identity registry, then issues short-lived
/// session tokens.
#[derive(Parser, Debug, Clone)]
#[command(name = "idhub-idp")]
#[command(about = "Identity provider gateway for IDHub")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Base URL of the identity registry gateway
    #[arg(long, env = "REGISTRY_URL", default_value = "http://localhost:8545")]
    pub registry_url: String,

    /// Identity registry contract address
    #[arg(long, env = "REGISTRY_CONTRACT")]
    pub registry_contract: Option<String>,

    /// Base URL of the challenge message store
    ///
    /// When unset in dev mode, an in-memory store is used instead.
    #[arg(long, env = "CHALLENGE_STORE_URL")]
    pub challenge_store_url: Option<String>,

    /// Enable development mode (in-memory challenge store, default JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// JWT secret for session token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Timeout for registry and challenge store requests in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "5000")]
    pub request_timeout_ms: u64,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Get the registry contract address
    pub fn registry_contract(&self) -> &str {
        self.registry_contract.as_deref().unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.jwt_secret.is_none() {
                return Err("JWT_SECRET is required in production mode".to_string());
            }
            if self.challenge_store_url.is_none() {
                return Err("CHALLENGE_STORE_URL is required in production mode".to_string());
            }
        }

        if self.registry_contract.as_deref().unwrap_or("").is_empty() {
            return Err("REGISTRY_CONTRACT is required".to_string());
        }

        Ok(())
    }
}
