//! IDHub IdP - identity provider gateway
//!
//! Authenticates a claimed decentralized identity by verifying a signature
//! over a one-time challenge message, then issues a short-lived session
//! token carried in a paired set of cookies.
//!
//! ## Components
//!
//! - **Decision engine**: three-tier trust policy (self / owner / authKey)
//! - **Resolver**: narrow interface to the external identity registry
//! - **Crypto**: secp256k1 signature recovery and address derivation
//! - **Sessions**: stateless signed tokens with matching cookie lifecycle
//! - **Challenge store**: read interface to the external challenge store

pub mod auth;
pub mod challenge;
pub mod config;
pub mod crypto;
pub mod resolver;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{IdpError, Result};
