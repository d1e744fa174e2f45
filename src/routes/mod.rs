//! HTTP routes for the IDHub identity provider

pub mod auth_routes;
pub mod health;

pub use auth_routes::handle_auth_request;
pub use health::{health_check, version_info};
