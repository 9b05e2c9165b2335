//! OpenAI-style chat completions provider.
//!
//! Unary calls go to `POST {base}/chat/completions`. Streaming uses the same
//! endpoint with `stream: true` and reads server-sent events until `[DONE]`.

use crate::client::{error_from_response, upstream_error, ClientFactory, ProviderSettings};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_core::{
    FinishReason, GatewayError, GatewayResult, ModelId, NativeStream, PromptRequest,
    PromptResponse, ProviderClient, ProviderCodec, ProviderId, StreamChunk,
};
use reqwest::Client;
use reqwest_eventsource::{retry, Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the default credential
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const PROVIDER: ProviderId = ProviderId::OpenAI;

/// Native finish signals
const FINISH_REASONS: &[(&str, FinishReason)] = &[
    ("stop", FinishReason::Done),
    ("length", FinishReason::Limit),
    ("tool_calls", FinishReason::Done),
    ("content_filter", FinishReason::Done),
    ("function_call", FinishReason::Done),
];

/// Default settings for this provider
#[must_use]
pub fn default_settings() -> ProviderSettings {
    ProviderSettings::new(PROVIDER, DEFAULT_BASE_URL, API_KEY_ENV)
}

/// Models addressable through the wire enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenAIModel {
    /// `gpt-3.5-turbo`, code 1
    Gpt35Turbo4k,
    /// `gpt-3.5-turbo-16k`, code 2
    Gpt35Turbo16k,
    /// `gpt-4`, code 3
    Gpt4_8k,
    /// `gpt-4-32k`, code 4
    Gpt4_32k,
}

impl OpenAIModel {
    /// Model used for code 0 and unknown codes
    pub const DEFAULT: Self = Self::Gpt35Turbo4k;

    /// Every model
    pub const ALL: [Self; 4] = [
        Self::Gpt35Turbo4k,
        Self::Gpt35Turbo16k,
        Self::Gpt4_8k,
        Self::Gpt4_32k,
    ];

    /// Resolve a wire code
    #[must_use]
    pub fn from_code(model: ModelId) -> Self {
        match model.code() {
            2 => Self::Gpt35Turbo16k,
            3 => Self::Gpt4_8k,
            4 => Self::Gpt4_32k,
            _ => Self::DEFAULT,
        }
    }

    /// Native model name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gpt35Turbo4k => "gpt-3.5-turbo",
            Self::Gpt35Turbo16k => "gpt-3.5-turbo-16k",
            Self::Gpt4_8k => "gpt-4",
            Self::Gpt4_32k => "gpt-4-32k",
        }
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

/// Chat completions request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    /// Native model name
    pub model: String,
    /// Conversation; always a single user turn here
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling mass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Output token cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Frequency penalty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Presence penalty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// End-user tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Stream flag
    pub stream: bool,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role
    pub role: String,
    /// Text
    #[serde(default)]
    pub content: Option<String>,
}

/// Unary response body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Candidates; only the first is used
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

/// Unary candidate
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// Generated message
    pub message: Option<ChatMessage>,
    /// Native finish signal
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChatUsage {
    /// Prompt tokens
    pub prompt_tokens: Option<u32>,
    /// Completion tokens
    pub completion_tokens: Option<u32>,
    /// Total tokens
    pub total_tokens: Option<u32>,
}

/// One streamed event payload
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    /// Deltas; may be empty
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// Streamed candidate
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    /// Content delta
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Native finish signal, on the last event only
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Streamed delta
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    /// Text to append
    #[serde(default)]
    pub content: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the chat completions API
pub struct OpenAIClient {
    http: Client,
    api_key: SecretString,
    completions_url: String,
}

impl ClientFactory for OpenAIClient {
    fn from_credential(http: Client, api_key: SecretString, settings: &ProviderSettings) -> Self {
        Self {
            http,
            api_key,
            completions_url: settings.endpoint("chat/completions"),
        }
    }
}

impl OpenAIClient {
    fn post(&self, body: &ChatCompletionRequest) -> reqwest::RequestBuilder {
        self.http
            .post(&self.completions_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
    }
}

#[async_trait]
impl ProviderClient for OpenAIClient {
    type Request = ChatCompletionRequest;
    type Response = ChatCompletionResponse;
    type Chunk = ChatCompletionChunk;

    async fn complete(&self, request: &ChatCompletionRequest) -> GatewayResult<ChatCompletionResponse> {
        debug!(model = %request.model, url = %self.completions_url, "Sending request to OpenAI");

        let response = self
            .post(request)
            .send()
            .await
            .map_err(|e| GatewayError::upstream(PROVIDER, None, format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response).await);
        }

        response.json().await.map_err(|e| {
            GatewayError::upstream(PROVIDER, None, format!("Failed to parse response: {e}"))
        })
    }

    async fn open_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> GatewayResult<NativeStream<ChatCompletionChunk>> {
        debug!(model = %request.model, "Starting streaming request to OpenAI");

        let mut event_source = EventSource::new(self.post(request)).map_err(|e| {
            GatewayError::upstream(PROVIDER, None, format!("Failed to create event source: {e}"))
        })?;
        event_source.set_retry_policy(Box::new(retry::Never));

        // Nothing is handed out until the provider has accepted the request.
        match event_source.next().await {
            Some(Ok(Event::Open)) => trace!("OpenAI stream opened"),
            Some(Ok(Event::Message(_))) => {
                event_source.close();
                return Err(GatewayError::upstream(
                    PROVIDER,
                    None,
                    "event stream delivered data before opening",
                ));
            }
            Some(Err(e)) => {
                event_source.close();
                return Err(open_error(e).await);
            }
            None => {
                return Err(GatewayError::upstream(
                    PROVIDER,
                    None,
                    "event stream closed before opening",
                ));
            }
        }

        let stream = try_stream! {
            let mut es = event_source;

            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(msg)) => {
                        let data = msg.data.trim();
                        if data == "[DONE]" {
                            break;
                        }

                        let chunk: ChatCompletionChunk = serde_json::from_str(data).map_err(|e| {
                            GatewayError::stream(PROVIDER, format!("Malformed stream event: {e}"))
                        })?;
                        yield chunk;
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        error!(error = %e, "OpenAI stream error");
                        es.close();
                        Err::<(), _>(GatewayError::stream(PROVIDER, e.to_string()))?;
                    }
                }
            }

            es.close();
        };

        Ok(Box::pin(stream))
    }
}

/// Read the rejected response so its body reaches the caller
async fn open_error(err: reqwest_eventsource::Error) -> GatewayError {
    use reqwest_eventsource::Error;

    match err {
        Error::InvalidStatusCode(_, response) => error_from_response(PROVIDER, response).await,
        Error::InvalidContentType(content_type, response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let mut error = upstream_error(PROVIDER, status, &body);
            if let GatewayError::Upstream { message, .. } = &mut error {
                *message = format!("unexpected content type {content_type:?}: {message}");
            }
            error
        }
        Error::Transport(e) => GatewayError::upstream(PROVIDER, None, format!("Request failed: {e}")),
        other => GatewayError::upstream(PROVIDER, None, other.to_string()),
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Translator and normalizer for the chat completions API
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAICodec;

impl ProviderCodec for OpenAICodec {
    type Client = OpenAIClient;

    fn to_provider_request(&self, request: &PromptRequest, streaming: bool) -> ChatCompletionRequest {
        let parameters = &request.parameters;
        ChatCompletionRequest {
            model: OpenAIModel::from_code(request.model).as_str().to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(request.message.clone()),
            }],
            temperature: parameters.temperature,
            top_p: parameters.top_p,
            max_tokens: parameters.positive_max_tokens(),
            frequency_penalty: parameters.frequency_penalty,
            presence_penalty: parameters.presence_penalty,
            user: request.application_id.clone(),
            stream: streaming,
        }
    }

    fn from_provider_result(&self, result: ChatCompletionResponse) -> PromptResponse {
        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();
        let usage = result.usage.unwrap_or_default();

        PromptResponse::from_usage(
            content,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens,
        )
    }

    fn from_provider_chunk(&self, chunk: ChatCompletionChunk) -> GatewayResult<Option<StreamChunk>> {
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(None);
        };

        let content = choice.delta.content.unwrap_or_default();
        Ok(Some(match choice.finish_reason {
            Some(signal) => StreamChunk::finished(content, FinishReason::lookup(FINISH_REASONS, &signal)),
            None => StreamChunk::delta(content),
        }))
    }
}
