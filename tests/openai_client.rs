//! HTTP-level tests for the OpenAI-compatible completion client

use chatlog::{
    ChatMessage, CompletionClient, CompletionRequest, HistoryAdapter, InMemoryStore,
    MemoryRegistry, MemoryStoreOptions, OpenAIClient, RequestOptions,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-abc",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn client(server: &MockServer) -> OpenAIClient {
    OpenAIClient::new("test-key".to_string(), format!("{}/v1", server.uri()))
        .with_retry_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn test_request_shape_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "stream": false,
            "messages": [{"role": "user", "content": "Hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hi!")))
        .expect(1)
        .mount(&server)
        .await;

    let request = CompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("Hello")]);
    let completion = client(&server)
        .create(&request, &RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(completion.first_content(), Some("Hi!"));
    assert_eq!(completion.created, 1700000000);
}

#[tokio::test]
async fn test_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let request = CompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("Hello")]);
    let completion = client(&server)
        .create(&request, &RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(completion.first_content(), Some("recovered"));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let request = CompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("Hello")]);
    let err = client(&server)
        .create(&request, &RequestOptions::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("401"));
    assert!(err.to_string().contains("invalid api key"));
}

#[tokio::test]
async fn test_max_attempts_option() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let request = CompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("Hello")]);
    let options = RequestOptions {
        max_attempts: Some(2),
        ..RequestOptions::default()
    };
    let result = client(&server).create(&request, &options).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_single_attempt_does_not_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let request = CompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("Hello")]);
    let options = RequestOptions {
        max_attempts: Some(1),
        ..RequestOptions::default()
    };
    assert!(client(&server).create(&request, &options).await.is_err());
}

#[tokio::test]
async fn test_undecodable_success_body_is_not_resent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"unexpected\": true}"))
        .expect(1)
        .mount(&server)
        .await;

    let request = CompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("Hello")]);
    let err = client(&server)
        .create(&request, &RequestOptions::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Response decode error"));
}

#[tokio::test]
async fn test_adapter_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Berlin")))
        .mount(&server)
        .await;

    let registry = MemoryRegistry::new();
    let store = Arc::new(InMemoryStore::new(&registry, MemoryStoreOptions::default()));
    let adapter = HistoryAdapter::new(
        Arc::new(client(&server)),
        store,
        "123e4567-e89b-12d3-a456-426614174000",
        "user-1",
    );

    let request = CompletionRequest::new(
        "gpt-4o-mini",
        vec![ChatMessage::user("What is the capital of Germany?")],
    );
    let response = adapter.create(request, None).await.unwrap();

    assert_eq!(response.reply(), "Berlin");
    assert_eq!(response.history.len(), 1);
    assert_eq!(response.history[0].model, "gpt-4o-mini");
    assert_eq!(response.history[0].created_at, 1700000000);
}
