//! Audio playback with a single active utterance
//!
//! [`Player`] owns the playback slot. Starting a new utterance stops the
//! previous one and waits for its resources to be released first.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Blocking audio output
///
/// Implementations must return promptly once `stop` is set.
pub trait AudioSink: Send + Sync + 'static {
    /// Play encoded audio until it ends or `stop` is raised
    ///
    /// # Errors
    ///
    /// Returns error if decoding or the output device fails
    fn play(&self, audio: &[u8], stop: &AtomicBool) -> Result<()>;
}

/// How a playback ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Audio played to the end
    Finished,
    /// Stopped explicitly or superseded by newer audio
    Stopped,
    /// Output failed
    Failed(String),
}

/// Awaitable end of one playback
pub struct PlaybackHandle {
    id: u64,
    outcome: oneshot::Receiver<PlaybackOutcome>,
}

impl PlaybackHandle {
    /// Sequence number of this playback
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the playback to end
    pub async fn wait(self) -> PlaybackOutcome {
        self.outcome
            .await
            .unwrap_or_else(|_| PlaybackOutcome::Failed("playback task dropped".to_string()))
    }
}

struct ActivePlayback {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Drop for ActivePlayback {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Owner of the single playback slot
pub struct Player {
    sink: Arc<dyn AudioSink>,
    active: Option<ActivePlayback>,
    next_id: u64,
}

impl Player {
    /// Create a player over an audio sink
    #[must_use]
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            active: None,
            next_id: 0,
        }
    }

    /// Start playing audio, stopping any previous playback first
    pub async fn start(&mut self, audio: Vec<u8>) -> PlaybackHandle {
        self.stop().await;

        self.next_id += 1;
        let id = self.next_id;
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();

        let sink = Arc::clone(&self.sink);
        let flag = Arc::clone(&stop);
        let task = tokio::task::spawn_blocking(move || {
            let outcome = match sink.play(&audio, &flag) {
                Ok(()) if flag.load(Ordering::SeqCst) => PlaybackOutcome::Stopped,
                Ok(()) => PlaybackOutcome::Finished,
                Err(e) => {
                    tracing::warn!(error = %e, playback = id, "audio playback failed");
                    PlaybackOutcome::Failed(e.to_string())
                }
            };
            drop(audio);
            tracing::debug!(playback = id, outcome = ?outcome, "playback ended");
            let _ = tx.send(outcome);
        });

        self.active = Some(ActivePlayback { stop, task });
        PlaybackHandle { id, outcome: rx }
    }

    /// Stop the active playback and wait for it to release its resources
    ///
    /// Returns true if something was playing.
    pub async fn stop(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };

        let was_running = !active.task.is_finished();
        active.stop.store(true, Ordering::SeqCst);
        if let Err(e) = (&mut active.task).await {
            tracing::warn!(error = %e, "playback task panicked");
        }
        was_running
    }

    /// Whether audio is currently playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.task.is_finished())
    }
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
            c.channels() == channels
                && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
        };

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| supports(c, 1))
            .or_else(|| {
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| supports(c, 2))
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { config })
    }

    /// Play decoded mono samples until done or stopped
    fn play_samples(&self, samples: Vec<f32>, stop: &AtomicBool) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let channels = self.config.channels as usize;
        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(Mutex::new(None::<String>));

        let samples_cb = Arc::clone(&samples);
        let position_cb = Arc::clone(&position);
        let failed_cb = Arc::clone(&failed);

        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position_cb.load(Ordering::Relaxed);
                        let sample = samples_cb.get(pos).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        if pos < samples_cb.len() {
                            position_cb.store(pos + 1, Ordering::Relaxed);
                        }
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio playback error");
                    if let Ok(mut slot) = failed_cb.lock() {
                        *slot = Some(err.to_string());
                    }
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        while position.load(Ordering::Relaxed) < sample_count
            && !stop.load(Ordering::SeqCst)
            && start.elapsed() < timeout
        {
            if let Some(err) = failed.lock().ok().and_then(|mut f| f.take()) {
                return Err(Error::Audio(err));
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");
        Ok(())
    }
}

impl AudioSink for AudioPlayback {
    fn play(&self, audio: &[u8], stop: &AtomicBool) -> Result<()> {
        let samples = decode_for_playback(audio)?;
        self.play_samples(samples, stop)
    }
}

/// Decode a synthesized reply, treating a body with no audio frames as a failure
fn decode_for_playback(audio: &[u8]) -> Result<Vec<f32>> {
    let samples = decode_mp3(audio)?;
    if samples.is_empty() {
        return Err(Error::Audio("no decodable audio frames".to_string()));
    }
    Ok(samples)
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink that plays for a fixed time and tracks concurrency
    struct TimedSink {
        duration: Duration,
        playing: AtomicUsize,
        max_playing: AtomicUsize,
    }

    impl TimedSink {
        fn new(duration: Duration) -> Arc<Self> {
            Arc::new(Self {
                duration,
                playing: AtomicUsize::new(0),
                max_playing: AtomicUsize::new(0),
            })
        }
    }

    impl AudioSink for TimedSink {
        fn play(&self, audio: &[u8], stop: &AtomicBool) -> Result<()> {
            if audio == b"bad" {
                return Err(Error::Audio("corrupt audio".to_string()));
            }
            let now = self.playing.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_playing.fetch_max(now, Ordering::SeqCst);

            let start = Instant::now();
            while start.elapsed() < self.duration && !stop.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }

            self.playing.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn playback_runs_to_completion() {
        let sink = TimedSink::new(Duration::from_millis(20));
        let mut player = Player::new(sink);

        let handle = player.start(b"audio".to_vec()).await;
        assert_eq!(handle.wait().await, PlaybackOutcome::Finished);
    }

    #[tokio::test]
    async fn new_playback_stops_previous_first() {
        let sink = TimedSink::new(Duration::from_secs(5));
        let mut player = Player::new(Arc::clone(&sink) as Arc<dyn AudioSink>);

        let first = player.start(b"one".to_vec()).await;
        let second = player.start(b"two".to_vec()).await;
        let third = player.start(b"three".to_vec()).await;

        assert_eq!(first.wait().await, PlaybackOutcome::Stopped);
        assert_eq!(second.wait().await, PlaybackOutcome::Stopped);
        assert!(third.id() > 2);

        assert!(player.stop().await);
        assert_eq!(third.wait().await, PlaybackOutcome::Stopped);
        assert_eq!(sink.max_playing.load(Ordering::SeqCst), 1);
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn failure_is_distinct_from_completion() {
        let sink = TimedSink::new(Duration::from_millis(10));
        let mut player = Player::new(sink);

        let handle = player.start(b"bad".to_vec()).await;
        assert!(matches!(handle.wait().await, PlaybackOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn stop_without_playback_is_noop() {
        let mut player = Player::new(TimedSink::new(Duration::ZERO));
        assert!(!player.stop().await);
    }

    #[test]
    fn undecodable_reply_is_a_playback_error() {
        for body in [&b"<html>not audio</html>"[..], b"", b"definitely not an mp3"] {
            let result = decode_for_playback(body);
            assert!(matches!(result, Err(Error::Audio(_))), "{result:?}");
        }
    }
}
