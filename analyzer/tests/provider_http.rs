//! Provider adapters against a local HTTP endpoint.

mod common;

use std::time::Duration;

use common::MockServer;
use trash_analyzer::middleware::ApiKey;
use trash_analyzer::providers::{
    AnalysisRequest, GeminiProvider, ImageAttachment, OpenAiProvider, Provider, ProviderError,
    ProviderId, RetryConfig,
};

fn request(model: &str) -> AnalysisRequest {
    AnalysisRequest {
        model: model.to_string(),
        prompt: "Which trash type do you see?".to_string(),
        image: ImageAttachment::jpeg(vec![0xff, 0xd8, 0xff, 0xe0]),
        temperature: 0.7,
        max_tokens: 100,
    }
}

fn quick_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        multiplier: 2.0,
    }
}

const OPENAI_OK: &str = r#"{
    "id": "chatcmpl-1",
    "model": "gpt-4o",
    "choices": [{"index": 0, "message": {"role": "assistant", "content": "metal"}, "finish_reason": "stop"}],
    "usage": {"prompt_tokens": 300, "completion_tokens": 1, "total_tokens": 301}
}"#;

const GEMINI_OK: &str = r#"{
    "candidates": [{"content": {"role": "model", "parts": [{"text": "cardboard"}]}, "finishReason": "STOP"}],
    "usageMetadata": {"promptTokenCount": 270, "candidatesTokenCount": 2, "totalTokenCount": 272}
}"#;

#[tokio::test]
async fn openai_sends_bearer_key_and_vision_message() {
    let server = MockServer::start(vec![(200, OPENAI_OK.to_string())]).await;
    let provider = OpenAiProvider::with_base_url(
        ProviderId::OpenAi,
        ApiKey::new("o1"),
        server.base_url.clone(),
    )
    .with_retry(RetryConfig::none());

    let response = provider.analyze(&request("gpt-4o")).await.unwrap();
    assert_eq!(response.text, "metal");
    assert_eq!(response.provider, ProviderId::OpenAi);
    assert_eq!(response.usage.unwrap().total_tokens, 301);

    let captured = server.captured();
    assert_eq!(captured.len(), 1);
    assert!(captured[0].request_line.starts_with("POST /chat/completions"));
    assert_eq!(captured[0].header("authorization"), Some("Bearer o1"));

    let body = captured[0].json();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["messages"][0]["content"][0]["text"], "Which trash type do you see?");
    assert_eq!(
        body["messages"][0]["content"][1]["image_url"]["url"],
        "data:image/jpeg;base64,/9j/4A=="
    );
}

#[tokio::test]
async fn groq_reports_its_own_identity() {
    let server = MockServer::start(vec![(200, OPENAI_OK.to_string())]).await;
    let provider =
        OpenAiProvider::with_base_url(ProviderId::Groq, ApiKey::new("k1"), server.base_url.clone())
            .with_retry(RetryConfig::none());

    let response = provider
        .analyze(&request("meta-llama/llama-4-scout-17b-16e-instruct"))
        .await
        .unwrap();
    assert_eq!(response.provider, ProviderId::Groq);
    assert_eq!(server.captured()[0].header("authorization"), Some("Bearer k1"));
}

#[tokio::test]
async fn gemini_sends_key_header_and_inline_image() {
    let server = MockServer::start(vec![(200, GEMINI_OK.to_string())]).await;
    let provider = GeminiProvider::with_base_url(ApiKey::new("g1"), server.base_url.clone())
        .with_retry(RetryConfig::none());

    let response = provider.analyze(&request("gemini-2.0-flash")).await.unwrap();
    assert_eq!(response.text, "cardboard");
    assert_eq!(response.model, "gemini-2.0-flash");

    let captured = server.captured();
    assert!(
        captured[0]
            .request_line
            .starts_with("POST /models/gemini-2.0-flash:generateContent")
    );
    assert_eq!(captured[0].header("x-goog-api-key"), Some("g1"));
    let body = captured[0].json();
    assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["data"], "/9j/4A==");
    assert_eq!(body["generationConfig"]["temperature"], 0.7);
}

#[tokio::test]
async fn unauthorized_maps_to_auth_error_without_retry() {
    let server = MockServer::start(vec![
        (401, r#"{"error": "invalid api key"}"#.to_string()),
        (200, OPENAI_OK.to_string()),
    ])
    .await;
    let provider =
        OpenAiProvider::with_base_url(ProviderId::OpenAi, ApiKey::new("bad"), server.base_url.clone())
            .with_retry(quick_retry());

    let err = provider.analyze(&request("gpt-4o")).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProviderError>(),
        Some(ProviderError::Auth(_))
    ));
    assert_eq!(server.captured().len(), 1);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start(vec![
        (503, r#"{"error": "overloaded"}"#.to_string()),
        (200, GEMINI_OK.to_string()),
    ])
    .await;
    let provider = GeminiProvider::with_base_url(ApiKey::new("g1"), server.base_url.clone())
        .with_retry(quick_retry());

    let response = provider.analyze(&request("gemini-2.0-flash")).await.unwrap();
    assert_eq!(response.text, "cardboard");
    assert_eq!(server.captured().len(), 2);
}

#[tokio::test]
async fn unknown_model_maps_to_model_not_found() {
    let server = MockServer::start(vec![(404, r#"{"error": "no such model"}"#.to_string())]).await;
    let provider = GeminiProvider::with_base_url(ApiKey::new("g1"), server.base_url.clone())
        .with_retry(RetryConfig::none());

    let err = provider.analyze(&request("gemini-9")).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProviderError>(),
        Some(ProviderError::ModelNotFound(_))
    ));
}

#[tokio::test]
async fn unreachable_endpoint_fails() {
    let provider = OpenAiProvider::with_base_url(
        ProviderId::OpenAi,
        ApiKey::new("o1"),
        "http://127.0.0.1:1",
    )
    .with_retry(RetryConfig::none());

    assert!(provider.analyze(&request("gpt-4o")).await.is_err());
}

#[tokio::test]
async fn refusal_with_null_content_is_an_error() {
    let server = MockServer::start(vec![(
        200,
        r#"{"choices":[{"message":{"content":null,"refusal":"I can't help"},"finish_reason":"stop"}]}"#
            .to_string(),
    )])
    .await;
    let provider =
        OpenAiProvider::with_base_url(ProviderId::OpenAi, ApiKey::new("o1"), server.base_url.clone())
            .with_retry(RetryConfig::none());

    let err = provider.analyze(&request("gpt-4o")).await.unwrap_err();
    assert!(err.to_string().contains("I can't help"), "{err:#}");
}

#[tokio::test]
async fn bad_request_mentioning_network_is_not_retried() {
    let server = MockServer::start(vec![
        (
            400,
            r#"{"error":{"message":"Invalid image: network fetch of image_url failed"}}"#.to_string(),
        ),
        (200, OPENAI_OK.to_string()),
    ])
    .await;
    let provider =
        OpenAiProvider::with_base_url(ProviderId::Groq, ApiKey::new("k1"), server.base_url.clone())
            .with_retry(quick_retry());

    let err = provider
        .analyze(&request("meta-llama/llama-4-scout-17b-16e-instruct"))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProviderError>(),
        Some(ProviderError::Http { status, .. }) if status.as_u16() == 400
    ));
    assert_eq!(server.captured().len(), 1);
}
