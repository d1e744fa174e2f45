//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling, one task per
//! connection. Requests share no mutable state; everything in AppState is
//! read-only or internally synchronized, so requests run fully in parallel.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{DecisionEngine, SessionManager, SessionSigner};
use crate::challenge::{ChallengeStore, HttpChallengeStore, MemoryChallengeStore};
use crate::config::Args;
use crate::resolver::{IdentityResolver, RegistryResolver, RegistryResolverConfig};
use crate::routes;
use crate::types::IdpError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Authentication decision engine over the identity registry
    pub engine: DecisionEngine,
    /// Session lifecycle: token minting and cookie pair state
    pub sessions: SessionManager,
    /// External challenge message store
    pub challenges: Arc<dyn ChallengeStore>,
}

impl AppState {
    /// Create AppState from configuration, wiring up the external
    /// collaborators (registry resolver, challenge store, token signer).
    pub fn new(args: Args) -> Result<Self, IdpError> {
        let timeout = Duration::from_millis(args.request_timeout_ms);

        let resolver = Arc::new(RegistryResolver::new(RegistryResolverConfig {
            endpoint: args.registry_url.clone(),
            contract: args.registry_contract().to_string(),
            request_timeout: timeout,
        }));

        let challenges: Arc<dyn ChallengeStore> = match &args.challenge_store_url {
            Some(url) => Arc::new(HttpChallengeStore::new(url.clone(), timeout)),
            None => {
                warn!("No challenge store configured, using in-memory store (dev mode)");
                Arc::new(MemoryChallengeStore::new())
            }
        };

        let signer = if args.dev_mode && args.jwt_secret.is_none() {
            SessionSigner::new_dev()
        } else {
            SessionSigner::new(args.jwt_secret())?
        };

        Ok(Self::with_collaborators(
            args,
            resolver,
            challenges,
            SessionManager::new(signer),
        ))
    }

    /// Create AppState with explicit collaborators (used by tests)
    pub fn with_collaborators(
        args: Args,
        resolver: Arc<dyn IdentityResolver>,
        challenges: Arc<dyn ChallengeStore>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            args,
            engine: DecisionEngine::new(resolver),
            sessions,
            challenges,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), IdpError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "IDHub IdP listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - using dev collaborators where unconfigured");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    // Auth routes (/auth/*) consume the request
    if path.starts_with("/auth") {
        if let Some(response) = routes::handle_auth_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    let response = match (method, path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(format!("Not found: {}", path))))
        .unwrap()
}

fn to_boxed(res: Response<Full<Bytes>>) -> Response<BoxBody> {
    res.map(|body| body.map_err(|never| match never {}).boxed())
}
