// src/proxy/routes.rs
// HTTP route handlers for the proxy

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;

use super::backend::{ApiType, Backend, InboundRoute};
use super::server::ProxyServer;

/// Header name for backend override
const X_BACKEND_HEADER: &str = "x-memento-backend";

/// Create the axum router with all proxy routes
pub fn create_router(server: ProxyServer) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat/completions", post(chat_completions))
        .route("/messages", post(messages))
        .route("/api/chat", post(api_chat))
        .route("/api/generate", post(api_generate))
        .with_state(server)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn chat_completions(
    State(server): State<ProxyServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ProxyError> {
    proxy_request(server, headers, body, InboundRoute::ChatCompletions).await
}

async fn messages(
    State(server): State<ProxyServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ProxyError> {
    proxy_request(server, headers, body, InboundRoute::Messages).await
}

async fn api_chat(
    State(server): State<ProxyServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ProxyError> {
    proxy_request(server, headers, body, InboundRoute::Chat).await
}

async fn api_generate(
    State(server): State<ProxyServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ProxyError> {
    proxy_request(server, headers, body, InboundRoute::Generate).await
}

/// Enrich the request with memories, then forward to the selected backend.
/// Upstream responses - success or error - pass through untouched.
async fn proxy_request(
    server: ProxyServer,
    headers: HeaderMap,
    body: Value,
    route: InboundRoute,
) -> Result<Response, ProxyError> {
    let backend_override = headers.get(X_BACKEND_HEADER).and_then(|v| v.to_str().ok());
    let backend = server
        .get_backend(backend_override)
        .ok_or(ProxyError::NoBackend)?;

    let body = server.enrich(&body, route).await;

    forward(&backend, route, body).await
}

async fn forward(
    backend: &Backend,
    route: InboundRoute,
    body: Value,
) -> Result<Response, ProxyError> {
    let target_url = format!(
        "{}{}",
        backend.config.base_url.trim_end_matches('/'),
        backend.upstream_path(route)
    );

    let mut request = backend
        .client
        .post(&target_url)
        .header("content-type", "application/json");

    match backend.config.api_type {
        ApiType::Anthropic => {
            let api_key = backend.config.get_api_key().ok_or(ProxyError::NoApiKey)?;
            request = request
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01");
        }
        ApiType::Openai => {
            let api_key = backend.config.get_api_key().ok_or(ProxyError::NoApiKey)?;
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }
        ApiType::Ollama => {}
    }

    let is_streaming = body.get("stream").and_then(|v| v.as_bool()).unwrap_or(false);

    let response = request
        .json(&body)
        .send()
        .await
        .map_err(|e| ProxyError::RequestFailed(e.to_string()))?;

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::OK);

    if is_streaming {
        // Stream the response body through untouched
        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other));

        let body = Body::from_stream(stream);

        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .body(body)
            .map_err(|e| ProxyError::InvalidResponse(e.to_string()))
    } else {
        let response_body: Value = response
            .json()
            .await
            .map_err(|e| ProxyError::InvalidResponse(e.to_string()))?;

        Ok((status, Json(response_body)).into_response())
    }
}

/// Proxy error types
#[derive(Debug)]
enum ProxyError {
    NoBackend,
    NoApiKey,
    RequestFailed(String),
    InvalidResponse(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ProxyError::NoBackend => (
                StatusCode::SERVICE_UNAVAILABLE,
                "No backend configured or available".to_string(),
            ),
            ProxyError::NoApiKey => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Backend API key not configured".to_string(),
            ),
            ProxyError::RequestFailed(e) => (StatusCode::BAD_GATEWAY, e),
            ProxyError::InvalidResponse(e) => (StatusCode::BAD_GATEWAY, e),
        };

        let body = serde_json::json!({
            "type": "error",
            "error": {
                "type": "proxy_error",
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}
