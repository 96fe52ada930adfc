//! Shared test utilities
//!
//! Fake upstream providers run as real axum servers on an ephemeral port so
//! the relays are exercised over HTTP end to end.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use laxmi_gateway::Config;
use laxmi_gateway::api::RelayServerBuilder;
use laxmi_gateway::config::file::LaxmiConfigFile;
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const LLM_KEY: &str = "test-llm-key";
pub const SPEECH_KEY: &str = "test-speech-key";
pub const RELAY_KEY: &str = "test-relay-key";

/// Serve a router on an ephemeral local port and return its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{addr}")
}

/// Build configuration from explicit overrides only
pub fn config_with(vars: &[(&str, &str)]) -> Config {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    Config::from_sources(LaxmiConfigFile::default(), |key| env.get(key).cloned())
        .expect("valid test config")
}

/// Configuration pointing every relay at the given fake upstream
pub fn upstream_config(upstream: &str, extra: &[(&str, &str)]) -> Config {
    let chat_url = format!("{upstream}/v1/chat/completions");
    let stt_url = format!("{upstream}/v1/speech-to-text");
    let tts_url = format!("{upstream}/v1/text-to-speech");

    let mut vars = vec![
        ("LAXMI_LLM_URL", chat_url.as_str()),
        ("LAXMI_STT_URL", stt_url.as_str()),
        ("LAXMI_TTS_URL", tts_url.as_str()),
        ("LAXMI_LLM_API_KEY", LLM_KEY),
        ("ELEVENLABS_API_KEY", SPEECH_KEY),
    ];
    vars.extend_from_slice(extra);
    config_with(&vars)
}

/// Relay router built from configuration
pub fn relay_router(config: &Config) -> Router {
    RelayServerBuilder::new(config).build().router()
}

/// Start a relay server on an ephemeral port and return its base URL
pub async fn spawn_relay(config: &Config) -> String {
    spawn_server(relay_router(config)).await
}

/// Requests seen by the fake upstream
#[derive(Clone, Default)]
pub struct Recorded {
    pub chat: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
    pub speech: Arc<Mutex<Vec<(HeaderMap, Vec<(String, usize)>)>>>,
    pub synthesis: Arc<Mutex<Vec<(String, HeaderMap, Value)>>>,
}

impl Recorded {
    pub fn chat_bodies(&self) -> Vec<Value> {
        self.chat.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }
}

/// Canned behaviour of the fake upstream
#[derive(Clone)]
pub enum ChatScript {
    /// Answer every turn with a structured call chosen from the message
    Doctor,
    /// Answer with free text instead of a structured call
    PlainText(Option<String>),
    /// Fail with the given status
    Status(u16),
}

#[derive(Clone)]
pub enum SpeechScript {
    Transcript(Option<String>),
    Status(u16),
}

#[derive(Clone)]
pub enum SynthesisScript {
    Audio(Vec<u8>),
    Status(u16, Value),
}

#[derive(Clone)]
struct UpstreamState {
    recorded: Recorded,
    chat: ChatScript,
    speech: SpeechScript,
    synthesis: SynthesisScript,
}

/// A fake LLM gateway and speech provider
pub struct FakeUpstream {
    pub url: String,
    pub recorded: Recorded,
}

/// Builder for [`FakeUpstream`]
pub struct FakeUpstreamBuilder {
    chat: ChatScript,
    speech: SpeechScript,
    synthesis: SynthesisScript,
}

impl FakeUpstream {
    pub fn builder() -> FakeUpstreamBuilder {
        FakeUpstreamBuilder {
            chat: ChatScript::Doctor,
            speech: SpeechScript::Transcript(Some("I have a headache".to_string())),
            synthesis: SynthesisScript::Audio(b"ID3fake-mp3".to_vec()),
        }
    }

    pub async fn start() -> Self {
        Self::builder().start().await
    }
}

impl FakeUpstreamBuilder {
    pub fn chat(mut self, script: ChatScript) -> Self {
        self.chat = script;
        self
    }

    pub fn speech(mut self, script: SpeechScript) -> Self {
        self.speech = script;
        self
    }

    pub fn synthesis(mut self, script: SynthesisScript) -> Self {
        self.synthesis = script;
        self
    }

    pub async fn start(self) -> FakeUpstream {
        let recorded = Recorded::default();
        let state = UpstreamState {
            recorded: recorded.clone(),
            chat: self.chat,
            speech: self.speech,
            synthesis: self.synthesis,
        };

        let router = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .route("/v1/speech-to-text", post(speech_to_text))
            .route("/v1/text-to-speech/{voice_id}", post(text_to_speech))
            .with_state(state);

        FakeUpstream {
            url: spawn_server(router).await,
            recorded,
        }
    }
}

/// Structured `medical_response` completion
pub fn tool_call_completion(arguments: &Value) -> Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "medical_response",
                        "arguments": arguments.to_string()
                    }
                }]
            }
        }]
    })
}

fn doctor_reply(message: &str) -> Value {
    let lower = message.to_lowercase();
    if lower.contains("breathe") || lower.contains("chest") {
        json!({
            "response": "This sounds serious. Please call emergency services (108) right away.",
            "isEmergency": true
        })
    } else {
        json!({
            "response": "A headache is often caused by dehydration or stress.",
            "isEmergency": false,
            "suggestions": {
                "medications": ["Paracetamol 500mg"],
                "dos": ["Drink water", "Rest in a dark room"],
                "donts": ["Avoid screens"]
            }
        })
    }
}

async fn chat_completions(
    State(state): State<UpstreamState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state
        .recorded
        .chat
        .lock()
        .unwrap()
        .push((headers, body.clone()));

    let last_user = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();

    match state.chat {
        ChatScript::Doctor => Json(tool_call_completion(&doctor_reply(&last_user))).into_response(),
        ChatScript::PlainText(content) => Json(json!({
            "choices": [{ "message": { "role": "assistant", "content": content, "tool_calls": null } }]
        }))
        .into_response(),
        ChatScript::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            "upstream secret detail",
        )
            .into_response(),
    }
}

async fn speech_to_text(
    State(state): State<UpstreamState>,
    headers: HeaderMap,
    mut form: Multipart,
) -> Response {
    let mut fields = Vec::new();
    while let Some(field) = form.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let len = field.bytes().await.unwrap().len();
        fields.push((name, len));
    }
    state.recorded.speech.lock().unwrap().push((headers, fields));

    match state.speech {
        SpeechScript::Transcript(Some(text)) => Json(json!({ "text": text })).into_response(),
        SpeechScript::Transcript(None) => Json(json!({ "language_code": "en" })).into_response(),
        SpeechScript::Status(code) => {
            (StatusCode::from_u16(code).unwrap(), "provider detail").into_response()
        }
    }
}

async fn text_to_speech(
    State(state): State<UpstreamState>,
    Path(voice_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state
        .recorded
        .synthesis
        .lock()
        .unwrap()
        .push((voice_id, headers, body));

    match state.synthesis {
        SynthesisScript::Audio(audio) => {
            ([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response()
        }
        SynthesisScript::Status(code, body) => {
            (StatusCode::from_u16(code).unwrap(), Json(body)).into_response()
        }
    }
}
