//! Turn orchestration: capture, transcription, chat turn and spoken reply
//!
//! The presentation phase is a single enum published over a watch channel and
//! only changed at the transitions below:
//!
//! ```text
//! idle --press--> listening --release--> processing
//! processing --reply (text mode)--> idle
//! processing --reply (voice mode)--> concerned | reassuring --playback--> speaking --end--> idle
//! processing --no speech / failure--> idle
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::conversation::{ConversationEngine, ErrorObserver, Message};
use crate::voice::{PlaybackOutcome, Player, Recorder, Synthesizer, Transcriber};
use crate::{Error, Result};

/// Presentation phase of the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Listening,
    Processing,
    Speaking,
    Concerned,
    Reassuring,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
            Self::Concerned => "concerned",
            Self::Reassuring => "reassuring",
        };
        f.write_str(name)
    }
}

/// Session-level input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Push-to-talk input, replies spoken aloud
    #[default]
    Voice,
    /// Typed input, replies shown only
    Text,
}

/// Speech side of a voice session
pub struct VoiceIo {
    pub recorder: Box<dyn Recorder>,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub player: Player,
}

/// Sequences one turn at a time and drives the phase indicator
pub struct TurnOrchestrator {
    engine: ConversationEngine,
    voice: Option<VoiceIo>,
    mode: InputMode,
    phase: watch::Sender<Phase>,
    on_error: Option<ErrorObserver>,
}

impl TurnOrchestrator {
    /// Create an orchestrator for a text-only session
    #[must_use]
    pub fn new(engine: ConversationEngine) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            engine,
            voice: None,
            mode: InputMode::Text,
            phase,
            on_error: None,
        }
    }

    /// Attach speech capture, relays and playback, switching to voice mode
    #[must_use]
    pub fn with_voice(mut self, voice: VoiceIo) -> Self {
        self.voice = Some(voice);
        self.mode = InputMode::Voice;
        self
    }

    /// Register the observer for transcription and synthesis failures
    #[must_use]
    pub fn on_error(mut self, observer: ErrorObserver) -> Self {
        self.on_error = Some(observer);
        self
    }

    /// Subscribe to phase changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Current input mode
    #[must_use]
    pub const fn mode(&self) -> InputMode {
        self.mode
    }

    /// Switch input mode; voice mode requires attached voice IO
    ///
    /// # Errors
    ///
    /// Returns `Config` when switching to voice without voice IO
    pub fn set_mode(&mut self, mode: InputMode) -> Result<()> {
        if mode == InputMode::Voice && self.voice.is_none() {
            return Err(Error::Config("voice mode needs audio devices".to_string()));
        }
        self.mode = mode;
        Ok(())
    }

    /// Conversation history
    #[must_use]
    pub const fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Clear conversation history
    pub fn clear(&mut self) {
        self.engine.clear();
    }

    /// Begin recording (`idle -> listening`)
    ///
    /// Returns false if the press was ignored because a turn is in progress
    /// or the session is in text mode.
    ///
    /// # Errors
    ///
    /// Returns error if the recorder cannot start
    pub fn press(&mut self) -> Result<bool> {
        if self.phase() != Phase::Idle || self.mode != InputMode::Voice {
            return Ok(false);
        }
        let Some(voice) = self.voice.as_mut() else {
            return Ok(false);
        };

        voice.recorder.start()?;
        self.set_phase(Phase::Listening);
        Ok(true)
    }

    /// Stop recording and run the turn (`listening -> processing -> ...`)
    ///
    /// Returns the assistant reply, or `None` if no turn ran or it failed.
    pub async fn release(&mut self) -> Option<Message> {
        if self.phase() != Phase::Listening {
            return None;
        }
        let voice = self.voice.as_mut()?;

        self.phase.send_replace(Phase::Processing);

        let clip = match voice.recorder.finish() {
            Ok(clip) => clip,
            Err(e) => return self.abandon(&e),
        };

        let transcript = match voice.transcriber.transcribe(clip).await {
            Ok(text) => text,
            Err(e) => return self.abandon(&e),
        };

        let text = transcript.trim();
        if text.is_empty() {
            tracing::info!("no speech detected");
            self.set_phase(Phase::Idle);
            return None;
        }

        self.run_turn(text).await
    }

    /// Run a typed turn
    ///
    /// Blank text and submissions during another turn are ignored.
    pub async fn submit_text(&mut self, text: &str) -> Option<Message> {
        if text.trim().is_empty() || self.phase() != Phase::Idle {
            return None;
        }
        self.set_phase(Phase::Processing);
        self.run_turn(text).await
    }

    async fn run_turn(&mut self, text: &str) -> Option<Message> {
        let Some(reply) = self.engine.send_message(text).await else {
            self.set_phase(Phase::Idle);
            return None;
        };

        let mood = if reply.is_emergency() {
            Phase::Concerned
        } else {
            Phase::Reassuring
        };

        if let (InputMode::Voice, Some(voice)) = (self.mode, self.voice.as_mut()) {
            self.phase.send_replace(mood);
            if let Err(e) = speak(voice, &self.phase, &reply.content).await {
                tracing::warn!(error = %e, "spoken reply failed");
                self.report(&e);
            }
        }

        self.set_phase(Phase::Idle);
        Some(reply)
    }

    fn abandon(&self, error: &Error) -> Option<Message> {
        tracing::warn!(error = %error, "voice turn abandoned");
        self.report(error);
        self.set_phase(Phase::Idle);
        None
    }

    fn report(&self, error: &Error) {
        if let Some(observer) = &self.on_error {
            observer(error);
        }
    }

    fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            tracing::debug!(from = %previous, to = %phase, "phase changed");
        }
    }
}

/// Synthesize and play a reply; phase moves to speaking once playback starts
async fn speak(voice: &mut VoiceIo, phase: &watch::Sender<Phase>, text: &str) -> Result<()> {
    let audio = voice.synthesizer.synthesize(text).await?;
    let handle = voice.player.start(audio).await;
    phase.send_replace(Phase::Speaking);
    tracing::debug!(playback = handle.id(), "speaking");

    match handle.wait().await {
        PlaybackOutcome::Finished | PlaybackOutcome::Stopped => Ok(()),
        PlaybackOutcome::Failed(reason) => {
            Err(Error::Audio(format!("Audio playback failed: {reason}")))
        }
    }
}
