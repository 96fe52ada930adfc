//! Voice relay endpoints for speech-to-text and text-to-speech

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Multipart, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::RelayState;
use crate::Error;
use crate::voice::AudioClip;

/// Multipart field carrying the recording
const AUDIO_FIELD: &str = "audio";

/// Build voice router
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/speech-to-text", post(speech_to_text))
        .route("/text-to-speech", post(text_to_speech))
        .with_state(state)
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Transcribe an uploaded recording
///
/// Accepts multipart form data with the clip in the `audio` field.
async fn speech_to_text(
    State(state): State<Arc<RelayState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscribeResponse>, VoiceError> {
    let clip = match multipart {
        Ok(form) => read_audio_field(form).await?,
        Err(e) => {
            tracing::debug!(error = %e, "request is not multipart");
            None
        }
    };

    let clip = clip.ok_or_else(|| VoiceError::Failed("No audio file provided".to_string()))?;
    let text = state.stt.transcribe_clip(clip).await?;

    Ok(Json(TranscribeResponse { text }))
}

/// Pull the `audio` part out of a multipart form
async fn read_audio_field(mut form: Multipart) -> Result<Option<AudioClip>, VoiceError> {
    while let Some(field) = form.next_field().await.map_err(|e| {
        tracing::warn!(error = %e, "malformed multipart body");
        VoiceError::Failed("No audio file provided".to_string())
    })? {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("audio.webm").to_string();
        let mime_type = field.content_type().unwrap_or("audio/webm").to_string();
        let data = field.bytes().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to read audio field");
            VoiceError::Failed("No audio file provided".to_string())
        })?;

        tracing::debug!(file = %file_name, audio_bytes = data.len(), "received audio");
        return Ok(Some(AudioClip {
            data: data.to_vec(),
            file_name,
            mime_type,
        }));
    }

    Ok(None)
}

/// Synthesis request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub voice_id: Option<String>,
}

/// Synthesize text to speech
///
/// Returns audio in MP3 format
async fn text_to_speech(
    State(state): State<Arc<RelayState>>,
    body: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Response, VoiceError> {
    let Json(request) = body.map_err(|_| VoiceError::BadRequest("Text is required".to_string()))?;

    let voice_id = request
        .voice_id
        .as_deref()
        .unwrap_or_else(|| state.tts.default_voice());

    let audio = state
        .tts
        .synthesize_with_voice(&request.text, voice_id)
        .await?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

/// Voice API errors
#[derive(Debug)]
pub enum VoiceError {
    BadRequest(String),
    /// Provider answered with a failure status, passed through to the caller
    Upstream(StatusCode, String),
    Failed(String),
}

impl From<Error> for VoiceError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidInput(msg) => Self::BadRequest(msg),
            Error::Upstream { status, message } => Self::Upstream(
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message,
            ),
            Error::Stt(msg) | Error::Tts(msg) => Self::Failed(msg),
            other => {
                tracing::error!(error = %other, "voice relay failed");
                Self::Failed("Voice request failed".to_string())
            }
        }
    }
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let (status, error) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Upstream(status, msg) => (status, msg),
            Self::Failed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
