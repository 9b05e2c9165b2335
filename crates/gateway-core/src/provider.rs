//! Provider contracts.
//!
//! A provider is plugged in by supplying two pieces:
//! - a [`ProviderClient`] that owns credentials and does the network I/O
//! - a [`ProviderCodec`] with the pure translation and normalization
//!   functions for that provider's request, result, and chunk shapes
//!
//! The two are composed into a [`Connector`], which is the only thing the
//! RPC layer sees. Both the SSE path and the raw line-stream path produce a
//! [`NativeStream`], so the relay loop never depends on the provider.

use crate::error::GatewayResult;
use crate::request::PromptRequest;
use crate::response::{PromptResponse, StreamChunk};
use crate::types::ProviderId;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of provider-native chunks
pub type NativeStream<T> = BoxStream<'static, GatewayResult<T>>;

/// Stream of canonical chunks
pub type ChunkStream = BoxStream<'static, GatewayResult<StreamChunk>>;

/// Network surface of one provider.
///
/// Implementations hold no per-call mutable state, so one instance can
/// serve any number of concurrent calls.
#[async_trait]
pub trait ProviderClient: Send + Sync + 'static {
    /// Provider-specific request body
    type Request: Send + Sync;
    /// Provider-specific unary result
    type Response: Send;
    /// Provider-specific stream element
    type Chunk: Send + 'static;

    /// Issue exactly one non-streaming call.
    ///
    /// Provider errors are returned unchanged; nothing is retried.
    async fn complete(&self, request: &Self::Request) -> GatewayResult<Self::Response>;

    /// Open a streaming call.
    ///
    /// Fails (after reading the provider's error body) instead of returning
    /// a stream when the provider rejects the request.
    async fn open_stream(&self, request: &Self::Request) -> GatewayResult<NativeStream<Self::Chunk>>;
}

/// Pure request translation and response normalization for one provider
pub trait ProviderCodec: Send + Sync + 'static {
    /// Client whose shapes this codec speaks
    type Client: ProviderClient;

    /// Map the canonical request onto the provider request.
    ///
    /// Total and side-effect free: unknown model codes fall back to the
    /// provider's default model and unsupported parameters are dropped.
    fn to_provider_request(
        &self,
        request: &PromptRequest,
        streaming: bool,
    ) -> <Self::Client as ProviderClient>::Request;

    /// Map a unary provider result onto the canonical response
    fn from_provider_result(
        &self,
        result: <Self::Client as ProviderClient>::Response,
    ) -> PromptResponse;

    /// Map one native chunk onto zero or one canonical chunk.
    ///
    /// Errors only when the chunk cannot be understood at all.
    fn from_provider_chunk(
        &self,
        chunk: <Self::Client as ProviderClient>::Chunk,
    ) -> GatewayResult<Option<StreamChunk>>;
}

/// Provider-agnostic prompt surface used by the RPC handlers
#[async_trait]
pub trait Connector: Send + Sync {
    /// Provider behind this connector
    fn provider(&self) -> ProviderId;

    /// Unary prompt.
    ///
    /// `credential` selects a request-scoped client instead of the
    /// process-wide one.
    async fn prompt(
        &self,
        request: &PromptRequest,
        credential: Option<&str>,
    ) -> GatewayResult<PromptResponse>;

    /// Open a canonical chunk stream.
    ///
    /// Returns an error, not a stream, when the stream cannot be opened.
    async fn stream_prompt(
        &self,
        request: &PromptRequest,
        credential: Option<&str>,
    ) -> GatewayResult<ChunkStream>;
}
