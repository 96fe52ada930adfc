//! Text-to-speech (TTS) relay to the upstream provider

use async_trait::async_trait;
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};

use super::Synthesizer;
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    url: String,
    model: String,
    default_voice: String,
    api_key: Option<SecretString>,
}

#[derive(serde::Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(serde::Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

impl TextToSpeech {
    /// Create a new TTS instance from voice configuration
    #[must_use]
    pub fn new(config: &VoiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.tts_url.trim_end_matches('/').to_string(),
            model: config.tts_model.clone(),
            default_voice: config.tts_voice.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Voice used when the caller names none
    #[must_use]
    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }

    /// Whether a provider credential is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Synthesize text with the given voice
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for empty text, `Tts` when the credential is
    /// missing, and `Upstream` carrying the provider status when synthesis fails
    pub async fn synthesize_with_voice(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Text is required".to_string()));
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Tts("text-to-speech credential not configured".to_string()))?;

        let voice_id = if voice_id.trim().is_empty() {
            self.default_voice.as_str()
        } else {
            voice_id
        };

        let url = format!("{}/{voice_id}", self.url);
        let request = SpeechRequest {
            text,
            model_id: &self.model,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        tracing::debug!(voice = voice_id, chars = text.chars().count(), "starting synthesis");

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key.expose_secret())
            .header(header::ACCEPT, "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let is_audio = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("audio/") || ct == "application/octet-stream");

        if !status.is_success() || !is_audio {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "TTS API error");
            let status = if status.is_success() { 502 } else { status.as_u16() };
            return Err(Error::Upstream {
                status,
                message: provider_error_message(&body)
                    .unwrap_or_else(|| format!("TTS request failed: {status}")),
            });
        }

        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.synthesize_with_voice(text, &self.default_voice).await
    }
}

/// Decode the provider's structured error body
///
/// Accepts `{"detail": {"message": ..}}`, `{"detail": ".."}` and `{"error": ".."}`.
fn provider_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = value.get("detail");

    detail
        .and_then(|d| d.get("message"))
        .and_then(serde_json::Value::as_str)
        .or_else(|| detail.and_then(serde_json::Value::as_str))
        .or_else(|| value.get("error").and_then(serde_json::Value::as_str))
        .map(ToString::to_string)
}
