//! HTTP provider tests against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use ragforge::gateways::{
    EmbeddingGateway, EmbeddingProvider, GenerationGateway, HttpEmbeddingProvider,
    HttpGenerationProvider,
};
use tracing_subscriber::EnvFilter;
use url::Url;

fn base_url(server: &MockServer) -> Url {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Url::parse(&server.base_url()).unwrap()
}

#[tokio::test]
async fn embedding_provider_posts_model_and_prompt() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/embeddings")
                .json_body_partial(r#"{"model": "nomic-embed-text"}"#);
            then.status(200)
                .json_body(serde_json::json!({"embedding": [0.1, 0.2, 0.3]}));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(base_url(&server), "nomic-embed-text").unwrap();
    let embedding = provider.embed("refund policy").await.unwrap();

    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    mock.assert_async().await;
}

#[tokio::test]
async fn empty_embedding_body_is_a_backend_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(200).json_body(serde_json::json!({"embedding": []}));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(base_url(&server), "nomic-embed-text").unwrap();
    assert!(provider.embed("refund policy").await.is_err());
}

#[tokio::test]
async fn failed_probe_degrades_gateway_without_further_requests() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(500);
        })
        .await;

    let provider = HttpEmbeddingProvider::new(base_url(&server), "nomic-embed-text").unwrap();
    let gateway = EmbeddingGateway::connect(Arc::new(provider), Duration::from_secs(1)).await;

    assert!(gateway.is_degraded());
    assert!(gateway.embed("first").await.is_unavailable());
    assert!(gateway.embed("second").await.is_unavailable());
    // Only the startup probe ever reached the backend.
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn healthy_probe_lets_calls_through() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(200)
                .json_body(serde_json::json!({"embedding": [1.0, 0.0]}));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(base_url(&server), "nomic-embed-text").unwrap();
    let gateway = EmbeddingGateway::connect(Arc::new(provider), Duration::from_secs(1)).await;

    assert!(!gateway.is_degraded());
    assert_eq!(gateway.embed("hello").await.ok().unwrap(), vec![1.0, 0.0]);
}

#[tokio::test]
async fn generation_provider_sends_filled_prompt() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("Refunds take 5 days.")
                .body_contains("Question: refund timeline?");
            then.status(200)
                .json_body(serde_json::json!({"response": "Five business days."}));
        })
        .await;

    let provider = HttpGenerationProvider::new(base_url(&server), "llama3").unwrap();
    let gateway = GenerationGateway::new(Arc::new(provider), Duration::from_secs(1));

    let answer = gateway
        .generate("Refunds take 5 days.", "refund timeline?")
        .await;
    assert_eq!(answer.ok().unwrap(), "Five business days.");
    mock.assert_async().await;
}

#[tokio::test]
async fn generation_error_status_is_unavailable_for_that_call_only() {
    let server = MockServer::start_async().await;
    let failing = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(503);
        })
        .await;

    let provider = HttpGenerationProvider::new(base_url(&server), "llama3").unwrap();
    let gateway = GenerationGateway::new(Arc::new(provider), Duration::from_secs(1));

    assert!(gateway.generate("ctx", "q").await.is_unavailable());

    failing.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200)
                .json_body(serde_json::json!({"response": "recovered"}));
        })
        .await;

    assert_eq!(gateway.generate("ctx", "q").await.ok().unwrap(), "recovered");
}
