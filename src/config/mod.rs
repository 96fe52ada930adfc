//! Configuration management for the Laxmi gateway
//!
//! Values are layered `env > toml > default`.

pub mod file;

use secrecy::SecretString;

use crate::Result;

/// Default chat completions endpoint (OpenAI-compatible gateway)
pub const DEFAULT_CHAT_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "google/gemini-2.5-flash";

/// Default speech-to-text endpoint
pub const DEFAULT_STT_URL: &str = "https://api.elevenlabs.io/v1/speech-to-text";

/// Default STT model (auto-detects English and Telugu)
pub const DEFAULT_STT_MODEL: &str = "scribe_v1";

/// Default text-to-speech base URL, the voice id is appended as a path segment
pub const DEFAULT_TTS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

/// Default TTS model
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";

/// Default TTS voice: soft, caring female voice
pub const DEFAULT_TTS_VOICE: &str = "EXAVITQu4vr4xnSDxMaL";

/// Default relay server port
pub const DEFAULT_PORT: u16 = 18790;

/// Laxmi gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat gateway configuration
    pub chat: ChatConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Relay server configuration
    pub server: ServerConfig,

    /// Relay client configuration
    pub client: ClientConfig,
}

/// Chat gateway configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Chat completions endpoint URL
    pub url: String,

    /// Model identifier
    pub model: String,

    /// LLM gateway credential (`LAXMI_LLM_API_KEY`)
    pub api_key: Option<SecretString>,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Speak assistant replies aloud
    pub enabled: bool,

    /// Speech-to-text endpoint URL
    pub stt_url: String,

    /// STT model
    pub stt_model: String,

    /// Text-to-speech base URL
    pub tts_url: String,

    /// TTS model
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// Speech provider credential (`ELEVENLABS_API_KEY`)
    pub api_key: Option<SecretString>,
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Key required from relay callers (`LAXMI_RELAY_KEY`); open when unset
    pub relay_key: Option<SecretString>,

    /// Global requests-per-minute limit; unlimited when unset
    pub rate_limit_rpm: Option<u32>,
}

/// Relay client configuration: the base URL/credential pair used to reach the relays
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the relay server
    pub relay_url: String,

    /// Credential presented to the relay server (`LAXMI_CLIENT_KEY`)
    pub api_key: Option<SecretString>,
}

impl Config {
    /// Load configuration from the environment and the optional config file
    ///
    /// # Errors
    ///
    /// Returns error if a numeric environment override cannot be parsed
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed config file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a numeric environment override cannot be parsed
    pub fn from_sources<F>(fc: file::LaxmiConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chat = ChatConfig {
            url: env("LAXMI_LLM_URL")
                .or(fc.chat.url)
                .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string()),
            model: env("LAXMI_LLM_MODEL")
                .or(fc.chat.model)
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            api_key: secret(env("LAXMI_LLM_API_KEY").or(fc.api_keys.llm)),
        };

        let voice = VoiceConfig {
            enabled: env("LAXMI_VOICE_ENABLED")
                .map(|v| parse_bool("LAXMI_VOICE_ENABLED", &v))
                .transpose()?
                .or(fc.voice.enabled)
                .unwrap_or(true),
            stt_url: env("LAXMI_STT_URL")
                .or(fc.voice.stt_url)
                .unwrap_or_else(|| DEFAULT_STT_URL.to_string()),
            stt_model: env("LAXMI_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            tts_url: env("LAXMI_TTS_URL")
                .or(fc.voice.tts_url)
                .unwrap_or_else(|| DEFAULT_TTS_URL.to_string()),
            tts_model: env("LAXMI_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            tts_voice: env("LAXMI_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string()),
            api_key: secret(env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs)),
        };

        let port = match env("LAXMI_PORT") {
            Some(raw) => Some(
                raw.parse::<u16>()
                    .map_err(|e| crate::Error::Config(format!("invalid LAXMI_PORT {raw:?}: {e}")))?,
            ),
            None => fc.server.port,
        };

        let rate_limit_rpm = match env("LAXMI_RATE_LIMIT_RPM") {
            Some(raw) => Some(raw.parse::<u32>().map_err(|e| {
                crate::Error::Config(format!("invalid LAXMI_RATE_LIMIT_RPM {raw:?}: {e}"))
            })?),
            None => fc.server.rate_limit_rpm,
        };

        let port = port.unwrap_or(DEFAULT_PORT);
        let server = ServerConfig {
            port,
            relay_key: secret(env("LAXMI_RELAY_KEY").or(fc.api_keys.relay)),
            rate_limit_rpm,
        };

        let client = ClientConfig {
            relay_url: env("LAXMI_RELAY_URL")
                .or(fc.client.relay_url)
                .unwrap_or_else(|| format!("http://127.0.0.1:{port}")),
            api_key: secret(env("LAXMI_CLIENT_KEY").or(fc.api_keys.client)),
        };

        Ok(Self {
            chat,
            voice,
            server,
            client,
        })
    }
}

/// Treat empty strings as unset
fn secret(value: Option<String>) -> Option<SecretString> {
    value.filter(|v| !v.trim().is_empty()).map(SecretString::from)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(crate::Error::Config(format!("invalid {key} {raw:?}"))),
    }
}
