//! HTTP client for the relay endpoints
//!
//! Used by the interactive front ends so that provider credentials only ever
//! live on the relay server.

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::chat::{ChatReply, ChatRequest};
use crate::config::ClientConfig;
use crate::conversation::ChatBackend;
use crate::voice::{AudioClip, Synthesizer, Transcriber};
use crate::{Error, Result};

/// `{ error }` body returned by the relay on failure
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptBody {
    #[serde(default)]
    text: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_id: Option<&'a str>,
}

/// Client for a running relay server
#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    voice_id: Option<String>,
}

impl RelayClient {
    /// Create a client from configuration
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.relay_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            voice_id: None,
        }
    }

    /// Request a specific voice for synthesized replies
    #[must_use]
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }

    /// Relay base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => request
                .header("apikey", key.expose_secret())
                .bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    /// Send one chat turn to `/api/chat`
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` on 429, `Unavailable` on 402, `Upstream` for any
    /// other failure status
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        let response = self.post("/api/chat").json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            tracing::warn!(status = %status, error = ?body.error, "chat relay error");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => Error::RateLimited(
                    body.error
                        .unwrap_or_else(|| "Rate limit exceeded".to_string()),
                ),
                StatusCode::PAYMENT_REQUIRED => Error::Unavailable(
                    body.error
                        .unwrap_or_else(|| "Service temporarily unavailable".to_string()),
                ),
                other => Error::Upstream {
                    status: other.as_u16(),
                    message: format!("AI request failed: {}", other.as_u16()),
                },
            });
        }

        Ok(response.json().await?)
    }

    /// Upload a clip to `/api/speech-to-text`
    ///
    /// # Errors
    ///
    /// Returns `Stt` if the relay reports a failure
    pub async fn transcribe_clip(&self, clip: AudioClip) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(clip.data)
            .file_name(clip.file_name)
            .mime_str(&clip.mime_type)
            .map_err(|e| Error::Stt(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .post("/api/speech-to-text")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            return Err(Error::Stt(body.error.unwrap_or_else(|| {
                format!("Speech-to-text failed: {}", status.as_u16())
            })));
        }

        let body: TranscriptBody = response.json().await?;
        Ok(body.text.unwrap_or_default())
    }

    /// Fetch synthesized speech from `/api/text-to-speech`
    ///
    /// # Errors
    ///
    /// Returns `Tts` with the relay's `{ error }` message, or
    /// `TTS request failed: <status>` when the body carries none
    pub async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>> {
        let body = SpeechBody {
            text,
            voice_id: self.voice_id.as_deref(),
        };

        let response = self.post("/api/text-to-speech").json(&body).send().await?;

        let status = response.status();
        let is_audio = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("audio/"));

        if !status.is_success() || !is_audio {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            return Err(Error::Tts(body.error.unwrap_or_else(|| {
                format!("TTS request failed: {}", status.as_u16())
            })));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ChatBackend for RelayClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        RelayClient::chat(self, request).await
    }
}

#[async_trait]
impl Transcriber for RelayClient {
    async fn transcribe(&self, clip: AudioClip) -> Result<String> {
        self.transcribe_clip(clip).await
    }
}

#[async_trait]
impl Synthesizer for RelayClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.synthesize_speech(text).await
    }
}
