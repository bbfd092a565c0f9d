//! HTTP endpoint for the batch handler.
//!
//! The whole protocol rides on a single `POST` endpoint (default `/`): the
//! body is a JSON array of call tuples, the response a JSON array of result
//! tuples. Every other path answers 404 and every other method on the
//! endpoint answers 405.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json,
};
use serde_json::Value;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::error;

use blest_core::{JsonMap, Router};

use crate::config::ServerConfig;
use crate::headers::construct_http_headers;
use crate::middleware::SecurityHeadersLayer;

/// Builds the axum application serving `router` per `config`.
pub fn create_app(router: Arc<Router>, config: &ServerConfig) -> axum::Router {
    let headers = construct_http_headers(&config.http);

    axum::Router::new()
        .route(&config.server.url, post(handle_batch))
        .with_state(router)
        .layer(RequestBodyLimitLayer::new(config.server.body_limit))
        .layer(SecurityHeadersLayer::new(headers))
}

/// Ambient context for a request: the transport headers under `headers`.
fn request_context(headers: &HeaderMap) -> JsonMap {
    let mut header_map = JsonMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            header_map.insert(name.as_str().to_string(), Value::String(value.to_string()));
        }
    }

    let mut context = JsonMap::new();
    context.insert("headers".to_string(), Value::Object(header_map));
    context
}

async fn handle_batch(
    State(router): State<Arc<Router>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let requests: Vec<Value> = match serde_json::from_slice(&body) {
        Ok(requests) => requests,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "Failed to parse request body").into_response();
        }
    };

    let context = request_context(&headers);

    match router.handle(&requests, &context).await {
        Err(batch_error) => {
            error!(code = batch_error.code, message = %batch_error.message, "batch rejected");
            let status = StatusCode::from_u16(batch_error.code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, batch_error.message).into_response()
        }
        Ok(results) if results.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
    }
}
