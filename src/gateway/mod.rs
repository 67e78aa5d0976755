mod handlers;

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::providers::Provider;
use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Request bodies are a context snapshot or a day's chat history; anything
/// larger is a client bug.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn Provider>,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.gateway.request_timeout_secs);
    Router::new()
        .route(
            "/protocol",
            post(handlers::generate_protocol).options(handlers::preflight),
        )
        .route("/chat", post(handlers::chat).options(handlers::preflight))
        .route("/health", get(handlers::health))
        .layer(middleware::from_fn(attach_cors))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}

/// The gateway fronts a browser/app client on another origin, so every
/// response carries permissive CORS headers, error responses included.
async fn attach_cors(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

pub async fn run_gateway(config: Arc<Config>, provider: Arc<dyn Provider>) -> Result<()> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
    tracing::info!("gateway listening on {addr}");
    run_gateway_with_listener(listener, config, provider).await
}

/// Serve on an already-bound listener. Split out so tests can bind an
/// ephemeral port first and learn the address.
pub async fn run_gateway_with_listener(
    listener: TcpListener,
    config: Arc<Config>,
    provider: Arc<dyn Provider>,
) -> Result<()> {
    let state = AppState { provider, config };
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::Bind(format!("serve: {e}")))?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the task is dropped.
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
