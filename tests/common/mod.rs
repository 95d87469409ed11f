//! Shared helpers for integration tests.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Method, Request, Response},
    Router,
};
use reqguard::{AppConfig, HttpServer};
use tower::ServiceExt;

/// Build the fully layered router for a configuration.
pub fn router(config: AppConfig) -> Router {
    HttpServer::new(config).unwrap().router()
}

/// A request builder with the connection info the server would attach.
pub fn request(method: Method, uri: &str, peer: &str) -> axum::http::request::Builder {
    let peer: SocketAddr = peer.parse().unwrap();
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(peer))
}

/// Send one request through the router.
pub async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.unwrap()
}

/// Read a response body to a string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
