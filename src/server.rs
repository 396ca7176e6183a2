//! HTTP binding of the oEmbed endpoint
//!
//! Resolution is blocking (catalog locks, image I/O), so every request runs
//! on tokio's blocking pool.

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::endpoint::{EndpointResponse, OembedEndpoint};
use crate::repository::Principal;

/// Error starting or running the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid address: {0}")]
    Address(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct AppState {
    endpoint: Arc<OembedEndpoint>,
    principal: Arc<Principal>,
}

/// Routes: the oEmbed endpoint at `path` and `/health`.
pub fn router(endpoint: Arc<OembedEndpoint>, principal: Principal, path: &str) -> Router {
    let state = AppState { endpoint, principal: Arc::new(principal) };
    Router::new()
        .route(path, get(oembed))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(
    endpoint: Arc<OembedEndpoint>,
    principal: Principal,
    host: &str,
    port: u16,
    path: &str,
) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| ServerError::Address(format!("{}:{}: {}", host, port, e)))?;

    let app = router(endpoint, principal, path);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving oEmbed on http://{}{}", addr, path);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn oembed(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let handled = tokio::task::spawn_blocking(move || {
        state.endpoint.handle_query(query.as_deref().unwrap_or(""), &state.principal)
    })
    .await;

    match handled {
        Ok(response) => to_response(response),
        Err(e) => {
            error!("oEmbed handler failed: {}", e);
            let body = json!({ "error": "internal", "message": "The oEmbed request could not be handled." });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "oembed-resolver" }))
}

fn to_response(response: EndpointResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
    (status, headers, Json(response.body)).into_response()
}
