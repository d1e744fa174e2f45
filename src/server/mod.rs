//! HTTP server for the IDHub identity provider

pub mod http;

pub use http::{run, AppState};
