//! Chat relay endpoint

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use super::RelayState;
use crate::Error;
use crate::chat::{ChatReply, ChatRequest, RELAY_FALLBACK_RESPONSE, Suggestions};

/// Build chat router
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}

/// Relay one turn to the chat gateway
async fn chat(
    State(state): State<Arc<RelayState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ChatError> {
    let Json(request) = body.map_err(|e| {
        tracing::debug!(error = %e, "rejected chat body");
        ChatError::BadRequest("message is required".to_string())
    })?;

    let reply = state.chat.complete(&request).await?;
    tracing::info!(
        emergency = reply.is_emergency,
        has_suggestions = !reply.suggestions.is_empty(),
        "chat reply relayed"
    );
    Ok(Json(reply))
}

/// Chat endpoint errors
#[derive(Debug)]
pub enum ChatError {
    BadRequest(String),
    RateLimited(String),
    PaymentRequired(String),
    /// Any other failure; the body still carries a safe reply
    Failed(String),
}

impl From<Error> for ChatError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidInput(msg) => Self::BadRequest(msg),
            Error::RateLimited(msg) => Self::RateLimited(msg),
            Error::Unavailable(msg) => Self::PaymentRequired(msg),
            Error::Upstream { message, .. } => Self::Failed(message),
            Error::Config(msg) => {
                tracing::error!(error = %msg, "chat relay misconfigured");
                Self::Failed(msg)
            }
            other => {
                tracing::error!(error = %other, "chat relay failed");
                Self::Failed("Failed to process request".to_string())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FallbackResponse {
    error: String,
    response: &'static str,
    is_emergency: bool,
    suggestions: Suggestions,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            Self::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            Self::Failed(error) => {
                let body = FallbackResponse {
                    error,
                    response: RELAY_FALLBACK_RESPONSE,
                    is_emergency: false,
                    suggestions: Suggestions::default(),
                };
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
            }
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
