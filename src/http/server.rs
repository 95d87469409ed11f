//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Apply the client IP trust policy once, at construction
//! - Register validation schemas of bound parameter types
//! - Create the Axum Router with the demo handlers and fallbacks
//! - Wire up middleware (request ID, tracing, timeout, client IP, errors)
//! - Serve with connection info and graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::StatusCode,
    middleware,
    routing::post,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::error::error_responder;
use crate::http::handlers::{echo_path, echo_root, method_not_allowed, not_found, EchoParams};
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::trust::{client_ip_middleware, IpExtractor, TrustConfig, TrustError};
use crate::validation::{SchemaError, Validator};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<Validator>,
    pub ip_extractor: Arc<IpExtractor>,
}

impl FromRef<AppState> for Arc<Validator> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.validator)
    }
}

impl FromRef<AppState> for Arc<IpExtractor> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.ip_extractor)
    }
}

/// Faults that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("client IP trust: {0}")]
    Trust(#[from] TrustError),

    #[error("validation schema: {0}")]
    Schema(#[from] SchemaError),
}

/// HTTP server with the request trust & error layer installed.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Result<Self, StartupError> {
        let ip_extractor = TrustConfig::from_settings(&config.trust)?.apply();
        let validator = Validator::new().with::<EchoParams>()?;

        let state = AppState {
            validator: Arc::new(validator),
            ip_extractor: Arc::new(ip_extractor),
        };

        let router = build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run the server until `signal` resolves.
    pub async fn run_until<F>(self, listener: TcpListener, signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
///
/// Layers listed later wrap those listed earlier, so `error_responder` sees
/// every error raised by handlers, extractors, fallbacks and `ClientIp`.
pub fn build_router(config: &AppConfig, state: AppState) -> Router {
    Router::new()
        .route("/", post(echo_root))
        .route("/{path}", post(echo_path))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.ip_extractor),
            client_ip_middleware,
        ))
        .layer(middleware::from_fn(error_responder))
        .layer(DefaultBodyLimit::max(config.listener.body_limit_bytes))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.timeouts.request_secs),
        ))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
