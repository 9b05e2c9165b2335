//! Wire types for `connector.v1`.
//!
//! ```text
//! service ConnectorService {
//!   rpc Prompt(PromptRequest) returns (PromptResponse);
//!   rpc StreamPrompt(PromptRequest) returns (stream StreamChunk);
//! }
//! ```
//!
//! The model is carried as a raw `int32` so that codes added later still
//! decode; each provider resolves it against its own model enum.

use gateway_core as domain;

/// Fully qualified service name
pub const SERVICE_NAME: &str = "connector.v1.ConnectorService";

/// Prompt request
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PromptRequest {
    /// Per-provider model code
    #[prost(int32, tag = "1")]
    pub model: i32,
    /// Prompt text
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
    /// Generation parameters
    #[prost(message, optional, tag = "3")]
    pub parameters: ::core::option::Option<PromptParameters>,
    /// Calling application tag
    #[prost(string, optional, tag = "4")]
    pub application_id: ::core::option::Option<::prost::alloc::string::String>,
}

/// Optional generation parameters
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct PromptParameters {
    /// Sampling temperature
    #[prost(float, optional, tag = "1")]
    pub temperature: ::core::option::Option<f32>,
    /// Output token cap; `0` means unset
    #[prost(uint32, optional, tag = "2")]
    pub max_tokens: ::core::option::Option<u32>,
    /// Nucleus sampling mass
    #[prost(float, optional, tag = "3")]
    pub top_p: ::core::option::Option<f32>,
    /// Frequency penalty
    #[prost(float, optional, tag = "4")]
    pub frequency_penalty: ::core::option::Option<f32>,
    /// Presence penalty
    #[prost(float, optional, tag = "5")]
    pub presence_penalty: ::core::option::Option<f32>,
}

/// Unary response
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PromptResponse {
    /// Generated text
    #[prost(string, tag = "1")]
    pub content: ::prost::alloc::string::String,
    /// Prompt tokens
    #[prost(uint32, tag = "2")]
    pub prompt_tokens: u32,
    /// Completion tokens
    #[prost(uint32, tag = "3")]
    pub completion_tokens: u32,
    /// Total tokens
    #[prost(uint32, tag = "4")]
    pub total_tokens: u32,
}

/// One streamed chunk
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamChunk {
    /// Text delta
    #[prost(string, tag = "1")]
    pub content: ::prost::alloc::string::String,
    /// Present on the terminal chunk only
    #[prost(enumeration = "FinishReason", optional, tag = "2")]
    pub finish_reason: ::core::option::Option<i32>,
}

/// Why a stream ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FinishReason {
    /// Not set
    Unspecified = 0,
    /// Natural completion
    Done = 1,
    /// Truncated by a token or length cap
    Limit = 2,
    /// Provider-side failure
    Error = 3,
}

#[allow(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
mod generated {
    include!(concat!(env!("OUT_DIR"), "/connector.v1.ConnectorService.rs"));
}

pub use generated::{connector_service_client, connector_service_server};

impl From<PromptParameters> for domain::ParameterBag {
    fn from(p: PromptParameters) -> Self {
        Self {
            temperature: p.temperature,
            max_tokens: p.max_tokens,
            frequency_penalty: p.frequency_penalty,
            presence_penalty: p.presence_penalty,
            top_p: p.top_p,
        }
    }
}

impl From<PromptRequest> for domain::PromptRequest {
    fn from(request: PromptRequest) -> Self {
        Self {
            model: domain::ModelId(request.model),
            message: request.message,
            parameters: request.parameters.map(Into::into).unwrap_or_default(),
            application_id: request.application_id.filter(|id| !id.is_empty()),
        }
    }
}

impl From<domain::PromptResponse> for PromptResponse {
    fn from(response: domain::PromptResponse) -> Self {
        Self {
            content: response.content,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
            total_tokens: response.total_tokens,
        }
    }
}

impl From<domain::FinishReason> for FinishReason {
    fn from(reason: domain::FinishReason) -> Self {
        match reason {
            domain::FinishReason::Done => Self::Done,
            domain::FinishReason::Limit => Self::Limit,
            domain::FinishReason::Error => Self::Error,
        }
    }
}

impl From<domain::StreamChunk> for StreamChunk {
    fn from(chunk: domain::StreamChunk) -> Self {
        Self {
            content: chunk.content,
            finish_reason: chunk
                .finish_reason
                .map(|reason| FinishReason::from(reason) as i32),
        }
    }
}
