//! Per-request logging and `x-request-id` handling.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

use crate::auth::{gate::authenticate, TokenService};
use crate::state::AppState;

/// Account id behind the request's bearer token, or `anonymous`.
pub fn request_user(headers: &HeaderMap, tokens: &TokenService) -> String {
    authenticate(headers, tokens)
        .map(|user| user.id.to_string())
        .unwrap_or_else(|_| "anonymous".to_string())
}

fn request_id(request: &Request) -> String {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Log every request with its id and caller, then its outcome at a level
/// chosen by the status class.
pub async fn log_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let req_id = request_id(&request);
    let user_id = request_user(request.headers(), &state.tokens);

    tracing::debug!(
        request_id = %req_id,
        user_id = %user_id,
        method = %method,
        uri = %uri,
        "incoming request"
    );

    let response = next.run(request).await;
    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(request_id = %req_id, user_id = %user_id, method = %method, uri = %uri, status = %status, duration_ms, "request failed");
    } else if status.is_client_error() {
        tracing::warn!(request_id = %req_id, user_id = %user_id, method = %method, uri = %uri, status = %status, duration_ms, "request rejected");
    } else {
        tracing::info!(request_id = %req_id, user_id = %user_id, method = %method, uri = %uri, status = %status, duration_ms, "request completed");
    }

    response
}

/// Stamps a fresh UUID on requests that arrive without an id.
pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}
