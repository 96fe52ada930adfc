//! Relay endpoint integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use laxmi_gateway::chat::{EMPTY_REPLY_RESPONSE, RELAY_FALLBACK_RESPONSE};
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::{ChatScript, FakeUpstream, LLM_KEY, RELAY_KEY, config_with, relay_router, upstream_config};

fn chat_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = relay_router(&config_with(&[]));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn structured_reply_is_relayed_verbatim() {
    let upstream = FakeUpstream::start().await;
    let app = relay_router(&upstream_config(&upstream.url, &[]));

    let response = app
        .oneshot(chat_request(&json!({
            "message": "I have a headache",
            "history": [
                { "role": "user", "content": "Hello" },
                { "role": "assistant", "content": "Namaste! How can I help?" }
            ]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["isEmergency"], false);
    assert_eq!(json["suggestions"]["medications"][0], "Paracetamol 500mg");
    assert_eq!(json["suggestions"]["dos"].as_array().unwrap().len(), 2);
    assert!(json["response"].as_str().unwrap().contains("headache"));
}

#[tokio::test]
async fn upstream_request_carries_persona_history_and_forced_tool() {
    let upstream = FakeUpstream::start().await;
    let app = relay_router(&upstream_config(&upstream.url, &[]));

    app.oneshot(chat_request(&json!({
        "message": "I have a fever",
        "history": [{ "role": "user", "content": "Hello" }]
    })))
    .await
    .unwrap();

    let recorded = upstream.recorded.chat.lock().unwrap();
    let (headers, body) = &recorded[0];

    assert_eq!(
        headers[header::AUTHORIZATION].to_str().unwrap(),
        format!("Bearer {LLM_KEY}")
    );
    assert_eq!(body["model"], "google/gemini-2.5-flash");

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"].as_str().unwrap().contains("Telugu"));
    assert_eq!(messages[1]["content"], "Hello");
    assert_eq!(messages[2], json!({ "role": "user", "content": "I have a fever" }));

    assert_eq!(body["tool_choice"]["function"]["name"], "medical_response");
    let params = &body["tools"][0]["function"]["parameters"];
    assert_eq!(params["required"], json!(["response", "isEmergency"]));
}

#[tokio::test]
async fn plain_text_reply_gets_safe_defaults() {
    let upstream = FakeUpstream::builder()
        .chat(ChatScript::PlainText(Some("Please rest and drink fluids.".to_string())))
        .start()
        .await;
    let app = relay_router(&upstream_config(&upstream.url, &[]));

    let response = app
        .oneshot(chat_request(&json!({ "message": "I feel tired" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["response"], "Please rest and drink fluids.");
    assert_eq!(json["isEmergency"], false);
    assert_eq!(json["suggestions"], json!({}));
}

#[tokio::test]
async fn empty_upstream_reply_asks_for_more_detail() {
    let upstream = FakeUpstream::builder()
        .chat(ChatScript::PlainText(None))
        .start()
        .await;
    let app = relay_router(&upstream_config(&upstream.url, &[]));

    let response = app
        .oneshot(chat_request(&json!({ "message": "hmm" })))
        .await
        .unwrap();

    let json = json_body(response).await;
    assert_eq!(json["response"], EMPTY_REPLY_RESPONSE);
}

#[tokio::test]
async fn rate_limit_and_payment_required_are_distinct() {
    for (upstream_status, expected) in [
        (429, StatusCode::TOO_MANY_REQUESTS),
        (402, StatusCode::PAYMENT_REQUIRED),
    ] {
        let upstream = FakeUpstream::builder()
            .chat(ChatScript::Status(upstream_status))
            .start()
            .await;
        let app = relay_router(&upstream_config(&upstream.url, &[]));

        let response = app
            .oneshot(chat_request(&json!({ "message": "hello" })))
            .await
            .unwrap();

        assert_eq!(response.status(), expected);
        let json = json_body(response).await;
        assert!(json["error"].is_string());
        assert!(json.get("response").is_none());
    }
}

#[tokio::test]
async fn upstream_failure_returns_fallback_reply() {
    let upstream = FakeUpstream::builder()
        .chat(ChatScript::Status(503))
        .start()
        .await;
    let app = relay_router(&upstream_config(&upstream.url, &[]));

    let response = app
        .oneshot(chat_request(&json!({ "message": "hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "AI request failed: 503");
    assert_eq!(json["response"], RELAY_FALLBACK_RESPONSE);
    assert_eq!(json["isEmergency"], false);
    assert_eq!(json["suggestions"], json!({}));
    assert!(!json.to_string().contains("secret"));
}

#[tokio::test]
async fn missing_credential_returns_fallback_reply() {
    let upstream = FakeUpstream::start().await;
    let chat_url = format!("{}/v1/chat/completions", upstream.url);
    let app = relay_router(&config_with(&[("LAXMI_LLM_URL", chat_url.as_str())]));

    let response = app
        .oneshot(chat_request(&json!({ "message": "hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["response"], RELAY_FALLBACK_RESPONSE);
    assert!(upstream.recorded.chat.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_message_is_rejected_before_upstream() {
    let upstream = FakeUpstream::start().await;
    let app = relay_router(&upstream_config(&upstream.url, &[]));

    for body in [json!({}), json!({ "message": "   " })] {
        let response = app.clone().oneshot(chat_request(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(upstream.recorded.chat.lock().unwrap().is_empty());
}

#[tokio::test]
async fn preflight_is_answered_with_cors_headers() {
    let app = relay_router(&config_with(&[("LAXMI_RELAY_KEY", RELAY_KEY)]));

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/chat")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization, content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn relay_key_is_required_when_configured() {
    let upstream = FakeUpstream::start().await;
    let app = relay_router(&upstream_config(&upstream.url, &[("LAXMI_RELAY_KEY", RELAY_KEY)]));

    let response = app
        .clone()
        .oneshot(chat_request(&json!({ "message": "hello" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = chat_request(&json!({ "message": "hello" }));
    request.headers_mut().insert(
        header::AUTHORIZATION,
        "Bearer wrong-key".parse().unwrap(),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = chat_request(&json!({ "message": "hello" }));
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {RELAY_KEY}").parse().unwrap(),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Health stays open
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let upstream = FakeUpstream::start().await;
    let app = relay_router(&upstream_config(&upstream.url, &[("LAXMI_RATE_LIMIT_RPM", "1")]));

    let first = app
        .clone()
        .oneshot(chat_request(&json!({ "message": "hello" })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(chat_request(&json!({ "message": "hello again" })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(upstream.recorded.chat.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unauthenticated_requests_do_not_spend_quota() {
    let upstream = FakeUpstream::start().await;
    let app = relay_router(&upstream_config(
        &upstream.url,
        &[("LAXMI_RELAY_KEY", RELAY_KEY), ("LAXMI_RATE_LIMIT_RPM", "1")],
    ));

    let keyed = || {
        let mut request = chat_request(&json!({ "message": "hello" }));
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {RELAY_KEY}").parse().unwrap(),
        );
        request
    };

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(chat_request(&json!({ "message": "hello" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.clone().oneshot(keyed()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(keyed()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(upstream.recorded.chat.lock().unwrap().len(), 1);
}
