//! TOML configuration file loading
//!
//! Supports `~/.config/laxmi/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct LaxmiConfigFile {
    /// Chat gateway configuration
    #[serde(default)]
    pub chat: ChatFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Relay server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Relay client configuration
    #[serde(default)]
    pub client: ClientFileConfig,

    /// Provider credentials
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Chat gateway configuration
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    /// Chat completions endpoint URL
    pub url: Option<String>,

    /// Model identifier (e.g. "google/gemini-2.5-flash")
    pub model: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable spoken replies
    pub enabled: Option<bool>,

    /// Speech-to-text endpoint URL
    pub stt_url: Option<String>,

    /// STT model (e.g. "scribe_v1")
    pub stt_model: Option<String>,

    /// Text-to-speech base URL (voice id is appended)
    pub tts_url: Option<String>,

    /// TTS model (e.g. "eleven_multilingual_v2")
    pub tts_model: Option<String>,

    /// TTS voice identifier
    pub tts_voice: Option<String>,
}

/// Relay server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Port to listen on
    pub port: Option<u16>,

    /// Global requests-per-minute limit
    pub rate_limit_rpm: Option<u32>,
}

/// Relay client configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    /// Base URL of the relay server
    pub relay_url: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub llm: Option<String>,
    pub elevenlabs: Option<String>,
    pub relay: Option<String>,
    pub client: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `LaxmiConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> LaxmiConfigFile {
    config_file_path().map_or_else(LaxmiConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> LaxmiConfigFile {
    if !path.exists() {
        return LaxmiConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                LaxmiConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            LaxmiConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse(content: &str) -> crate::Result<LaxmiConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/laxmi/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("laxmi").join("config.toml"))
}
