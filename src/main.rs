use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use laxmi_gateway::api::RelayServerBuilder;
use laxmi_gateway::client::RelayClient;
use laxmi_gateway::conversation::{ConversationEngine, ErrorObserver, Message};
use laxmi_gateway::orchestrator::{InputMode, Phase, TurnOrchestrator, VoiceIo};
use laxmi_gateway::voice::{
    AudioCapture, AudioPlayback, PlaybackOutcome, Player, Recorder, TextToSpeech,
};
use laxmi_gateway::Config;

/// Laxmi - bilingual health guidance over voice and text
#[derive(Parser)]
#[command(name = "laxmi", version, about)]
struct Cli {
    /// Port for the relay server
    #[arg(long, env = "LAXMI_PORT")]
    port: Option<u16>,

    /// Relay server URL used by `chat` and `talk`
    #[arg(long, env = "LAXMI_RELAY_URL")]
    relay_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server (default)
    Serve,
    /// Text consultation against a relay server
    Chat,
    /// Push-to-talk voice consultation against a relay server
    Talk,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! I'm Dr. Laxmi. How are you feeling today?")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,laxmi_gateway=info",
        1 => "info,laxmi_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(url) = cli.relay_url {
        config.client.relay_url = url;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Chat => chat(&config).await,
        Command::Talk => talk(&config).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestTts { text } => test_tts(&config, &text).await,
    }
}

/// Run the relay server until interrupted
async fn serve(config: &Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.server.port,
        model = %config.chat.model,
        "starting laxmi relay"
    );

    let server = RelayServerBuilder::new(config).build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

const DISCLAIMER: &str = "Dr. Laxmi is an AI assistant for general health information only. \
It does not diagnose conditions or prescribe medication and is no substitute for a \
licensed doctor. In an emergency call 108 or go to the nearest hospital.";

fn error_printer() -> ErrorObserver {
    Arc::new(|e| eprintln!("  ! {e}"))
}

fn print_reply(message: &Message) {
    if message.is_emergency() {
        println!("\n  [URGENT] Please seek medical help immediately.");
    }
    println!("\nDr. Laxmi: {}", message.content);

    let Some(suggestions) = &message.suggestions else {
        return;
    };
    let lists = [
        ("Medications", &suggestions.medications),
        ("Do", &suggestions.dos),
        ("Avoid", &suggestions.donts),
    ];
    for (title, items) in lists {
        if let Some(items) = items.as_ref().filter(|i| !i.is_empty()) {
            println!("  {title}:");
            for item in items {
                println!("    - {item}");
            }
        }
    }
}

/// Interactive text consultation
async fn chat(config: &Config) -> anyhow::Result<()> {
    let client = RelayClient::new(&config.client);
    let mut engine = ConversationEngine::new(Arc::new(client)).on_error(error_printer());

    println!("{DISCLAIMER}\n");
    println!("Dr. Laxmi (text). Type your symptoms, /clear to reset, /quit to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                engine.clear();
                println!("(conversation cleared)");
            }
            text => {
                if let Some(reply) = engine.send_message(text).await {
                    print_reply(&reply);
                } else if let Some(last) = engine.messages().last().filter(|_| !text.is_empty()) {
                    println!("\nDr. Laxmi: {}", last.content);
                }
            }
        }
        println!();
    }

    Ok(())
}

/// Push-to-talk consultation: Enter starts recording, Enter again stops
#[allow(clippy::future_not_send)]
async fn talk(config: &Config) -> anyhow::Result<()> {
    let client = Arc::new(RelayClient::new(&config.client).with_voice(&config.voice.tts_voice));
    let engine = ConversationEngine::new(client.clone()).on_error(error_printer());

    let voice = VoiceIo {
        recorder: Box::new(AudioCapture::new()?),
        transcriber: client.clone(),
        synthesizer: client,
        player: Player::new(Arc::new(AudioPlayback::new()?)),
    };

    let mut orchestrator = TurnOrchestrator::new(engine)
        .with_voice(voice)
        .on_error(error_printer());
    if !config.voice.enabled {
        orchestrator.set_mode(InputMode::Text)?;
    }

    let mut phases = orchestrator.subscribe();
    tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            if phase != Phase::Idle {
                println!("  ({phase}...)");
            }
        }
    });

    println!("{DISCLAIMER}\n");
    println!("Dr. Laxmi (voice). Press Enter to start talking and Enter again to stop.");
    println!("Type a message to send it as text; /text, /voice, /clear, /quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let reply = match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                orchestrator.clear();
                println!("(conversation cleared)");
                continue;
            }
            "/text" => {
                orchestrator.set_mode(InputMode::Text)?;
                println!("(text mode: replies are not spoken)");
                continue;
            }
            "/voice" => {
                orchestrator.set_mode(InputMode::Voice)?;
                println!("(voice mode)");
                continue;
            }
            "" if orchestrator.phase() == Phase::Listening => orchestrator.release().await,
            "" => {
                if orchestrator.press()? {
                    println!("Listening... press Enter when done.");
                }
                continue;
            }
            text => orchestrator.submit_text(text).await,
        };

        if let Some(reply) = reply {
            print_reply(&reply);
        }
        println!();
    }

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {} Hz", laxmi_gateway::voice::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        // Clear buffer each second
        capture.clear_buffer();
    }

    let clip = capture.finish()?;
    println!("\n---");
    println!("Last second encoded to {} bytes of WAV", clip.data.len());
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test TTS output directly against the speech provider
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TextToSpeech::new(&config.voice);

    println!("Synthesizing speech...");
    let mp3_data = tts
        .synthesize_with_voice(text, tts.default_voice())
        .await
        .map_err(|e| anyhow::anyhow!("TTS synthesis failed: {e}"))?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    let mut player = Player::new(Arc::new(AudioPlayback::new()?));
    match player.start(mp3_data).await.wait().await {
        PlaybackOutcome::Failed(reason) => anyhow::bail!("playback failed: {reason}"),
        PlaybackOutcome::Finished | PlaybackOutcome::Stopped => {}
    }

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
