//! Relay key authentication middleware

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;

use super::RelayState;

/// Extract the relay key from the Authorization header
fn extract_api_key(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware to verify the relay key
pub async fn require_api_key(
    State(state): State<Arc<RelayState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // No relay key configured: development mode
    let Some(expected_key) = &state.relay_key else {
        return Ok(next.run(req).await);
    };

    match extract_api_key(&req) {
        Some(key) if key == expected_key.expose_secret() => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "invalid relay key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::debug!(path = %req.uri().path(), "no relay key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
