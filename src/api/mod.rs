//! HTTP relay server for the Laxmi gateway
//!
//! Holds the provider credentials and exposes the chat, speech-to-text and
//! text-to-speech relays to front ends.

mod auth;
pub mod chat;
pub mod health;
pub mod rate_limit;
pub mod voice;

use std::sync::Arc;

use axum::Router;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::chat::ChatRelay;
use crate::config::Config;
use crate::voice::{SpeechToText, TextToSpeech};

/// Shared state for relay handlers
pub struct RelayState {
    pub chat: ChatRelay,
    pub stt: SpeechToText,
    pub tts: TextToSpeech,
    pub relay_key: Option<SecretString>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building a relay server
pub struct RelayServerBuilder {
    chat: ChatRelay,
    stt: SpeechToText,
    tts: TextToSpeech,
    port: u16,
    relay_key: Option<SecretString>,
    rate_limit_rpm: Option<u32>,
}

impl RelayServerBuilder {
    /// Create a builder with relays built from configuration
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            chat: ChatRelay::new(&config.chat),
            stt: SpeechToText::new(&config.voice),
            tts: TextToSpeech::new(&config.voice),
            port: config.server.port,
            relay_key: config.server.relay_key.clone(),
            rate_limit_rpm: config.server.rate_limit_rpm,
        }
    }

    /// Set the port to listen on
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Require callers to present this key
    #[must_use]
    pub fn relay_key(mut self, key: Option<SecretString>) -> Self {
        self.relay_key = key;
        self
    }

    /// Limit all relay traffic to the given requests per minute
    #[must_use]
    pub const fn rate_limit_rpm(mut self, rpm: Option<u32>) -> Self {
        self.rate_limit_rpm = rpm;
        self
    }

    /// Build the relay server
    #[must_use]
    pub fn build(self) -> RelayServer {
        if !self.chat.is_configured() {
            tracing::warn!("LAXMI_LLM_API_KEY not set - chat requests will fail");
        }
        if !self.stt.is_configured() {
            tracing::warn!("ELEVENLABS_API_KEY not set - speech requests will fail");
        }

        let state = Arc::new(RelayState {
            chat: self.chat,
            stt: self.stt,
            tts: self.tts,
            relay_key: self.relay_key,
            rate_limiter: self.rate_limit_rpm.map(rate_limit::create_limiter),
        });

        RelayServer {
            state,
            port: self.port,
        }
    }
}

/// Relay server
pub struct RelayServer {
    state: Arc<RelayState>,
    port: u16,
}

impl RelayServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Run the relay server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind relay server: {e}")))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener
    ///
    /// # Errors
    ///
    /// Returns error if the server fails
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let port = listener.local_addr().map(|a| a.port()).unwrap_or(self.port);
        tracing::info!(
            port,
            auth = self.state.relay_key.is_some(),
            rate_limited = self.state.rate_limiter.is_some(),
            "relay server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("relay server error: {e}")))?;

        Ok(())
    }

    /// Run the relay server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Build the relay router over shared state
pub fn router(state: Arc<RelayState>) -> Router {
    let api = Router::new()
        .merge(chat::router(Arc::clone(&state)))
        .merge(voice::router(Arc::clone(&state)))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit::rate_limit_middleware,
        ))
        // Only authenticated requests count against the limit
        .layer(axum::middleware::from_fn_with_state(
            state,
            auth::require_api_key,
        ));

    // CORS is outermost so pre-flight requests never hit auth
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .merge(health::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
