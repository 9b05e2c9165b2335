//! Cohere-style generate provider.
//!
//! The generate API has no SSE framing: with `stream: true` the response
//! body is newline-delimited JSON, one event per line. The client hands the
//! raw lines to the codec, which parses them.
//!
//! # Stream events
//! - `{"is_finished": false, "text": "..."}` for each delta
//! - `{"is_finished": true, "finish_reason": "COMPLETE", "response": {...}}` last

use crate::client::{error_from_response, ClientFactory, ProviderSettings};
use crate::lines::line_stream;
use async_trait::async_trait;
use futures::{future, stream, StreamExt};
use gateway_core::{
    FinishReason, GatewayError, GatewayResult, ModelId, NativeStream, PromptRequest,
    PromptResponse, ProviderClient, ProviderCodec, ProviderId, StreamChunk,
};
use reqwest::header::ACCEPT;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.cohere.ai/v1";

/// Environment variable holding the default credential
pub const API_KEY_ENV: &str = "COHERE_API_KEY";

const PROVIDER: ProviderId = ProviderId::Cohere;

/// Native finish signals
const FINISH_REASONS: &[(&str, FinishReason)] = &[
    ("COMPLETE", FinishReason::Done),
    ("MAX_TOKENS", FinishReason::Limit),
    ("ERROR", FinishReason::Error),
    ("ERROR_TOXIC", FinishReason::Error),
    ("ERROR_LIMIT", FinishReason::Limit),
    ("USER_CANCEL", FinishReason::Done),
];

/// Default settings for this provider
#[must_use]
pub fn default_settings() -> ProviderSettings {
    ProviderSettings::new(PROVIDER, DEFAULT_BASE_URL, API_KEY_ENV)
}

/// Models addressable through the wire enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CohereModel {
    /// `command`, code 1
    Command,
    /// `command-light`, code 2
    CommandLight,
    /// `command-nightly`, code 3
    CommandNightly,
    /// `command-light-nightly`, code 4
    CommandLightNightly,
}

impl CohereModel {
    /// Model used for code 0 and unknown codes
    pub const DEFAULT: Self = Self::Command;

    /// Every model
    pub const ALL: [Self; 4] = [
        Self::Command,
        Self::CommandLight,
        Self::CommandNightly,
        Self::CommandLightNightly,
    ];

    /// Resolve a wire code
    #[must_use]
    pub fn from_code(model: ModelId) -> Self {
        match model.code() {
            2 => Self::CommandLight,
            3 => Self::CommandNightly,
            4 => Self::CommandLightNightly,
            _ => Self::DEFAULT,
        }
    }

    /// Native model name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::CommandLight => "command-light",
            Self::CommandNightly => "command-nightly",
            Self::CommandLightNightly => "command-light-nightly",
        }
    }
}

// ============================================================================
// Cohere API Types
// ============================================================================

/// Generate request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    /// Native model name
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Output token cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling mass (`top_p` elsewhere)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<f32>,
    /// Frequency penalty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Presence penalty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Stream flag
    pub stream: bool,
}

/// Unary response body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    /// Candidates; only the first is used
    #[serde(default)]
    pub generations: Vec<Generation>,
    /// Billing metadata
    #[serde(default)]
    pub meta: Option<GenerateMeta>,
}

/// One candidate
#[derive(Debug, Clone, Deserialize)]
pub struct Generation {
    /// Generated text
    #[serde(default)]
    pub text: String,
    /// Native finish signal
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateMeta {
    /// Billed token counts
    #[serde(default)]
    pub billed_units: Option<BilledUnits>,
}

/// Billed token counts
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BilledUnits {
    /// Prompt tokens
    pub input_tokens: Option<u32>,
    /// Generated tokens
    pub output_tokens: Option<u32>,
}

/// One streamed event
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    /// Whether this is the last event
    #[serde(default)]
    pub is_finished: bool,
    /// Text delta
    #[serde(default)]
    pub text: Option<String>,
    /// Native finish signal, on the last event
    #[serde(default)]
    pub finish_reason: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the generate API
pub struct CohereClient {
    http: Client,
    token: SecretString,
    generate_url: String,
}

impl ClientFactory for CohereClient {
    fn from_credential(http: Client, api_key: SecretString, settings: &ProviderSettings) -> Self {
        Self {
            http,
            token: api_key,
            generate_url: settings.endpoint("generate"),
        }
    }
}

impl CohereClient {
    async fn send(&self, body: &GenerateRequest) -> GatewayResult<reqwest::Response> {
        let response = self
            .http
            .post(&self.generate_url)
            .bearer_auth(self.token.expose_secret())
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::upstream(PROVIDER, None, format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl ProviderClient for CohereClient {
    type Request = GenerateRequest;
    type Response = GenerateResponse;
    type Chunk = String;

    async fn complete(&self, request: &GenerateRequest) -> GatewayResult<GenerateResponse> {
        debug!(model = %request.model, url = %self.generate_url, "Sending request to Cohere");

        self.send(request).await?.json().await.map_err(|e| {
            GatewayError::upstream(PROVIDER, None, format!("Failed to parse response: {e}"))
        })
    }

    async fn open_stream(&self, request: &GenerateRequest) -> GatewayResult<NativeStream<String>> {
        debug!(model = %request.model, "Starting streaming request to Cohere");

        let response = self.send(request).await?;
        let status = response.status().as_u16();

        // A 200 whose body holds no lines at all is an upstream failure, not
        // a stream that ended early.
        let mut lines = line_stream(PROVIDER, response.bytes_stream());
        let Some(first) = lines.next().await else {
            return Err(GatewayError::upstream(
                PROVIDER,
                Some(status),
                "stream response has no body",
            ));
        };

        Ok(Box::pin(stream::once(future::ready(first)).chain(lines)))
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Translator and normalizer for the generate API
#[derive(Debug, Clone, Copy, Default)]
pub struct CohereCodec;

impl ProviderCodec for CohereCodec {
    type Client = CohereClient;

    fn to_provider_request(&self, request: &PromptRequest, streaming: bool) -> GenerateRequest {
        let parameters = &request.parameters;
        GenerateRequest {
            model: CohereModel::from_code(request.model).as_str().to_string(),
            prompt: request.message.clone(),
            temperature: parameters.temperature,
            max_tokens: parameters.positive_max_tokens(),
            p: parameters.top_p,
            frequency_penalty: parameters.frequency_penalty,
            presence_penalty: parameters.presence_penalty,
            stream: streaming,
        }
    }

    fn from_provider_result(&self, result: GenerateResponse) -> PromptResponse {
        let content = result
            .generations
            .into_iter()
            .next()
            .map(|generation| generation.text)
            .unwrap_or_default();
        let billed = result
            .meta
            .and_then(|meta| meta.billed_units)
            .unwrap_or_default();

        PromptResponse::from_usage(content, billed.input_tokens, billed.output_tokens, None)
    }

    fn from_provider_chunk(&self, line: String) -> GatewayResult<Option<StreamChunk>> {
        let event: StreamEvent = serde_json::from_str(&line).map_err(|e| {
            warn!(error = %e, "Failed to parse Cohere stream line");
            GatewayError::stream(PROVIDER, format!("Malformed stream line: {e}"))
        })?;

        if event.is_finished {
            // The final event repeats the whole text under `response`.
            let signal = event.finish_reason.unwrap_or_default();
            return Ok(Some(StreamChunk::finished(
                "",
                FinishReason::lookup(FINISH_REASONS, &signal),
            )));
        }

        Ok(event.text.map(StreamChunk::delta))
    }
}
