//! Speech-to-text (STT) relay to the upstream provider

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::{AudioClip, Transcriber};
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Response from the transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Transcribes speech to text
///
/// No language is pinned so the provider auto-detects English and Telugu.
pub struct SpeechToText {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl SpeechToText {
    /// Create a new STT instance from voice configuration
    #[must_use]
    pub fn new(config: &VoiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.stt_url.clone(),
            model: config.stt_model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Whether a provider credential is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Transcribe one audio clip
    ///
    /// An empty transcript is a valid result.
    ///
    /// # Errors
    ///
    /// Returns error if the clip is empty, the credential is missing, or the
    /// provider call fails
    pub async fn transcribe_clip(&self, clip: AudioClip) -> Result<String> {
        if clip.data.is_empty() {
            return Err(Error::Stt("No audio file provided".to_string()));
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Stt("speech-to-text credential not configured".to_string()))?;

        tracing::debug!(
            file = %clip.file_name,
            audio_bytes = clip.data.len(),
            "starting transcription"
        );

        let part = reqwest::multipart::Part::bytes(clip.data)
            .file_name(clip.file_name)
            .mime_str(&clip.mime_type)
            .map_err(|e| Error::Stt(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model_id", self.model.clone());

        let response = self
            .client
            .post(&self.url)
            .header("xi-api-key", api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "STT API error");
            return Err(Error::Stt(format!(
                "Speech-to-text failed: {}",
                status.as_u16()
            )));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        let text = result.text.unwrap_or_default();
        tracing::info!(transcript = %crate::chat::truncate(&text, 100), "transcription complete");
        Ok(text)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, clip: AudioClip) -> Result<String> {
        self.transcribe_clip(clip).await
    }
}
