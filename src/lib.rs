//! Laxmi Gateway - bilingual health guidance over voice and text
//!
//! This library provides:
//! - Relays that keep provider credentials server-side (chat, STT, TTS)
//! - A conversation engine with bounded history and safe fallbacks
//! - A push-to-talk turn orchestrator with single-playback audio
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Front ends                         │
//! │     laxmi chat   │   laxmi talk   │   web client    │
//! └────────────────────┬────────────────────────────────┘
//!                      │  /api/chat  /api/speech-to-text
//!                      │  /api/text-to-speech
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Relay server                        │
//! │   Chat relay  │  Transcription  │  Synthesis        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │     LLM gateway (tool calling)  │  ElevenLabs       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod chat;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod orchestrator;
pub mod voice;

pub use chat::{ChatReply, ChatRequest, HistoryEntry, Role, Suggestions};
pub use client::RelayClient;
pub use config::Config;
pub use conversation::{ConversationEngine, Message};
pub use error::{Error, Result};
pub use orchestrator::{InputMode, Phase, TurnOrchestrator};
