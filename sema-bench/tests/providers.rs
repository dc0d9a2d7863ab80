//! Provider adapter tests against a mock HTTP server

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sema_bench::config::{ConfigStore, ModelConfig};
use sema_bench::providers::{ClientOptions, InvokeOptions, ModelClient, ModelFactory, ProviderError};
use sema_bench::runner::RetryPolicy;

// =========================================================================
// Helpers
// =========================================================================

fn fast_options() -> ClientOptions {
    ClientOptions::default()
        .with_timeout(Duration::from_secs(5))
        .with_retry(RetryPolicy::default().with_delays(Duration::ZERO, Duration::ZERO))
}

fn client(config: ModelConfig) -> Arc<dyn ModelClient> {
    let factory = ModelFactory::new(Arc::new(ConfigStore::new()));
    factory
        .create_from_config(Arc::new(config), &fast_options())
        .expect("client should build")
}

fn openai_model(server: &MockServer) -> ModelConfig {
    ModelConfig::new("gpt-4o-mini", "openai")
        .with_base_url(format!("{}/v1", server.uri()))
        .with_api_key("sk-test")
        .with_temperature(Some(0.0))
}

fn chat_response(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

// =========================================================================
// OpenAI-compatible
// =========================================================================

#[tokio::test]
async fn test_openai_sends_user_message_and_extracts_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "Capital of France?"}],
            "temperature": 0.0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("Paris")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = client(openai_model(&server))
        .invoke("Capital of France?", &InvokeOptions::new())
        .await
        .unwrap();
    assert_eq!(answer, "Paris");
}

#[tokio::test]
async fn test_openai_override_wins() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4.1", "max_tokens": 8})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let options = InvokeOptions::new()
        .with_override("model", json!("gpt-4.1"))
        .with_override("max_tokens", json!(8));
    let answer = client(openai_model(&server)).invoke("hi", &options).await.unwrap();
    assert_eq!(answer, "ok");
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": {"message": "overloaded"}})),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("second try")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = client(openai_model(&server)).invoke("q", &InvokeOptions::new()).await.unwrap();
    assert_eq!(answer, "second try");
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("done")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = client(openai_model(&server)).invoke("q", &InvokeOptions::new()).await.unwrap();
    assert_eq!(answer, "done");
}

#[tokio::test]
async fn test_bad_request_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "invalid model", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(openai_model(&server))
        .invoke("q", &InvokeOptions::new())
        .await
        .unwrap_err();
    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid model");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_auth_error_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(openai_model(&server))
        .invoke("q", &InvokeOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Auth { status: 401, .. }), "{}", err);
}

#[tokio::test]
async fn test_empty_output_is_generation_error_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(openai_model(&server))
        .invoke("q", &InvokeOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Generation { .. }), "{}", err);
}

#[tokio::test]
async fn test_slow_response_is_timeout_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_response("late"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let options = ClientOptions::default()
        .with_timeout(Duration::from_millis(200))
        .with_retry(RetryPolicy::none());
    let factory = ModelFactory::new(Arc::new(ConfigStore::new()));
    let client = factory
        .create_from_config(Arc::new(openai_model(&server)), &options)
        .unwrap();

    let err = client.invoke("q", &InvokeOptions::new()).await.unwrap_err();
    assert!(
        matches!(err, ProviderError::Timeout { timeout_ms: 200 }),
        "{}",
        err
    );
}

// =========================================================================
// Anthropic
// =========================================================================

#[tokio::test]
async fn test_anthropic_headers_and_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"model": "claude-sonnet-4-5", "max_tokens": 4096})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Ed "}, {"type": "text", "text": "Wood"}],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ModelConfig::new("claude-sonnet-4-5", "claude")
        .with_base_url(format!("{}/v1", server.uri()))
        .with_api_key("ant-test");
    let answer = client(config).invoke("Who?", &InvokeOptions::new()).await.unwrap();
    assert_eq!(answer, "Ed Wood");
}

// =========================================================================
// Gemini
// =========================================================================

#[tokio::test]
async fn test_gemini_generate_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "g-test"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Color of the sky?"}]}],
            "generationConfig": {"maxOutputTokens": 16}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Blue"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ModelConfig::new("gemini-2.5-flash", "google")
        .with_base_url(format!("{}/v1beta", server.uri()))
        .with_api_key("g-test");
    let options = InvokeOptions::new().with_override("config", json!({"maxOutputTokens": 16}));
    let answer = client(config).invoke("Color of the sky?", &options).await.unwrap();
    assert_eq!(answer, "Blue");
}

// =========================================================================
// Ollama
// =========================================================================

#[tokio::test]
async fn test_ollama_native_chat_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.1:8b",
            "stream": false,
            "options": {"temperature": 0.0}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1:8b",
            "message": {"role": "assistant", "content": "42"},
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ModelConfig::new("llama3.1:8b", "ollama")
        .with_base_url(format!("{}/v1/", server.uri()))
        .with_temperature(Some(0.0));
    let client = client(config);
    assert_eq!(client.provider(), "ollama");
    assert_eq!(client.invoke("6 * 7?", &InvokeOptions::new()).await.unwrap(), "42");

    let no_proxy = std::env::var("NO_PROXY").unwrap_or_default();
    assert!(no_proxy.contains("localhost") || no_proxy.contains("127.0.0.1"));
}

#[tokio::test]
async fn test_ollama_error_string_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "model \"nope\" not found"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ModelConfig::new("nope", "ollama").with_base_url(server.uri());
    let err = client(config).invoke("q", &InvokeOptions::new()).await.unwrap_err();
    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("not found"));
        }
        other => panic!("unexpected error: {}", other),
    }
}
