//! Voice processing module
//!
//! Handles push-to-talk capture, the speech relays and playback.

mod capture;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use playback::{AudioPlayback, AudioSink, PlaybackHandle, PlaybackOutcome, Player};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

use async_trait::async_trait;

use crate::Result;

/// One finite recorded utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioClip {
    /// Wrap WAV bytes produced by [`samples_to_wav`]
    #[must_use]
    pub fn wav(data: Vec<u8>) -> Self {
        Self {
            data,
            file_name: "audio.wav".to_string(),
            mime_type: "audio/wav".to_string(),
        }
    }
}

/// Records audio for the duration of a press-and-hold gesture
pub trait Recorder {
    /// Begin recording (press)
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be opened
    fn start(&mut self) -> Result<()>;

    /// Stop recording and yield the clip (release)
    ///
    /// # Errors
    ///
    /// Returns error if the clip cannot be encoded
    fn finish(&mut self) -> Result<AudioClip>;
}

/// Turns one audio clip into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a clip; an empty string means no speech was detected
    async fn transcribe(&self, clip: AudioClip) -> Result<String>;
}

/// Turns assistant text into playable audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize speech for the given text
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}
