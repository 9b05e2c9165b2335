//! End-to-end: gRPC client, connector server, provider connector, mock provider API.

use gateway_core::Connector;
use gateway_providers::{
    cohere, openai, ClientSlot, CohereCodec, OpenAICodec, ProviderConnector,
};
use gateway_server::proto::connector_service_client::ConnectorServiceClient;
use gateway_server::proto::{self, PromptParameters};
use gateway_server::{error_kind, Server, ServerConfig, API_KEY_HEADER};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tonic::transport::Channel;
use tonic::{Code, Request};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(connector: Arc<dyn Connector>) -> ConnectorServiceClient<Channel> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(
        ServerConfig::new().with_shutdown_timeout(Duration::from_secs(1)),
        connector,
    );
    tokio::spawn(server.serve(listener, std::future::pending::<String>()));

    ConnectorServiceClient::connect(format!("http://{addr}"))
        .await
        .unwrap()
}

fn openai_connector(mock: &MockServer) -> Arc<dyn Connector> {
    let settings = openai::default_settings().with_base_url(Some(&format!("{}/v1", mock.uri())));
    Arc::new(ProviderConnector::new(
        OpenAICodec,
        ClientSlot::with_lookup(settings, |_| Some("process-key".to_string())),
    ))
}

fn cohere_connector(mock: &MockServer) -> Arc<dyn Connector> {
    let settings = cohere::default_settings().with_base_url(Some(&format!("{}/v1", mock.uri())));
    Arc::new(ProviderConnector::new(
        CohereCodec,
        ClientSlot::with_lookup(settings, |_| Some("process-key".to_string())),
    ))
}

#[tokio::test]
async fn test_openai_prompt_with_tenant_key() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer tenant-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "max_tokens": 64,
            "user": "billing-app"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "four"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6}
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let mut client = serve(openai_connector(&mock)).await;
    let mut call = Request::new(proto::PromptRequest {
        model: 3,
        message: "2 + 2?".to_string(),
        parameters: Some(PromptParameters {
            max_tokens: Some(64),
            ..Default::default()
        }),
        application_id: Some("billing-app".to_string()),
    });
    call.metadata_mut()
        .insert(API_KEY_HEADER, "tenant-key".parse().unwrap());

    let response = client.prompt(call).await.unwrap().into_inner();
    assert_eq!(response.content, "four");
    assert_eq!(response.total_tokens, 6);
}

#[tokio::test]
async fn test_openai_upstream_failure_surfaces_body() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&mock)
        .await;

    let mut client = serve(openai_connector(&mock)).await;
    let status = client
        .prompt(proto::PromptRequest {
            message: "hello".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Internal);
    assert!(status.message().contains("rate limited"));
    assert_eq!(error_kind(&status), Some("upstream"));
}

#[tokio::test]
async fn test_openai_sse_stream_relayed() {
    let mock = MockServer::start().await;
    let body = [
        r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
        r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#,
        r#"{"choices":[{"index":0,"delta":{"content":"lo"}}]}"#,
        r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        "[DONE]",
    ]
    .iter()
    .map(|event| format!("data: {event}\n\n"))
    .collect::<String>();
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&mock)
        .await;

    let mut client = serve(openai_connector(&mock)).await;
    let mut stream = client
        .stream_prompt(proto::PromptRequest {
            model: 1,
            message: "hello".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.message().await.unwrap() {
        chunks.push(chunk);
    }

    let text: String = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(text, "Hello");
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[3].finish_reason(), proto::FinishReason::Done);
}

#[tokio::test]
async fn test_cohere_ndjson_stream_relayed() {
    let mock = MockServer::start().await;
    let body = concat!(
        r#"{"is_finished":false,"event_type":"text-generation","text":"Hel"}"#, "\n",
        r#"{"is_finished":false,"event_type":"text-generation","text":"lo"}"#, "\n",
        r#"{"is_finished":true,"event_type":"stream-end","finish_reason":"MAX_TOKENS"}"#, "\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .and(header("authorization", "Bearer process-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/stream+json"))
        .expect(1)
        .mount(&mock)
        .await;

    let mut client = serve(cohere_connector(&mock)).await;
    let mut stream = client
        .stream_prompt(proto::PromptRequest {
            message: "hello".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.message().await.unwrap() {
        chunks.push(chunk);
    }

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].content, "Hel");
    assert_eq!(chunks[1].content, "lo");
    assert_eq!(chunks[2].finish_reason(), proto::FinishReason::Limit);
}

#[tokio::test]
async fn test_cohere_malformed_line_ends_stream_with_error() {
    let mock = MockServer::start().await;
    let body = concat!(r#"{"is_finished":false,"text":"Hel"}"#, "\n", "garbage\n");
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/stream+json"))
        .mount(&mock)
        .await;

    let mut client = serve(cohere_connector(&mock)).await;
    let mut stream = client
        .stream_prompt(proto::PromptRequest {
            message: "hello".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(stream.message().await.unwrap().unwrap().content, "Hel");
    let status = stream.message().await.unwrap_err();
    assert_eq!(error_kind(&status), Some("stream"));
}
