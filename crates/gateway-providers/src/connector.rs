//! Generic connector: translate, call, normalize.

use crate::client::{ClientFactory, ClientSlot};
use async_trait::async_trait;
use futures::future;
use futures_util::StreamExt;
use gateway_core::{
    ChunkStream, Connector, GatewayResult, PromptRequest, PromptResponse, ProviderClient,
    ProviderCodec, ProviderId,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A [`Connector`] built from one provider's codec and client slot
pub struct ProviderConnector<C>
where
    C: ProviderCodec,
{
    codec: Arc<C>,
    clients: ClientSlot<C::Client>,
}

impl<C> ProviderConnector<C>
where
    C: ProviderCodec,
    C::Client: ClientFactory,
{
    /// Compose a codec with a client slot
    #[must_use]
    pub fn new(codec: C, clients: ClientSlot<C::Client>) -> Self {
        Self {
            codec: Arc::new(codec),
            clients,
        }
    }

    /// The client slot
    #[must_use]
    pub fn clients(&self) -> &ClientSlot<C::Client> {
        &self.clients
    }
}

#[async_trait]
impl<C> Connector for ProviderConnector<C>
where
    C: ProviderCodec,
    C::Client: ClientFactory,
{
    fn provider(&self) -> ProviderId {
        self.clients.settings().provider
    }

    async fn prompt(
        &self,
        request: &PromptRequest,
        credential: Option<&str>,
    ) -> GatewayResult<PromptResponse> {
        let native = self.codec.to_provider_request(request, false);
        let client = self.clients.create_or_default(credential)?;

        let started = Instant::now();
        let result = client.complete(&native).await?;
        debug!(
            provider = %self.provider(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream call completed"
        );

        Ok(self.codec.from_provider_result(result))
    }

    async fn stream_prompt(
        &self,
        request: &PromptRequest,
        credential: Option<&str>,
    ) -> GatewayResult<ChunkStream> {
        let native = self.codec.to_provider_request(request, true);
        let client = self.clients.create_or_default(credential)?;

        let started = Instant::now();
        let upstream = client.open_stream(&native).await?;
        debug!(
            provider = %self.provider(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream stream opened"
        );

        let codec = Arc::clone(&self.codec);
        let chunks = upstream.filter_map(move |item| {
            let mapped = match item {
                Ok(native) => codec.from_provider_chunk(native).transpose(),
                Err(e) => Some(Err(e)),
            };
            future::ready(mapped)
        });

        Ok(Box::pin(chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProviderSettings;
    use futures::stream;
    use gateway_core::{FinishReason, GatewayError, NativeStream, StreamChunk};
    use secrecy::SecretString;

    /// Echoes the request; streams a fixed script.
    struct ScriptClient;

    #[async_trait]
    impl ProviderClient for ScriptClient {
        type Request = String;
        type Response = String;
        type Chunk = &'static str;

        async fn complete(&self, request: &String) -> GatewayResult<String> {
            if request == "fail" {
                return Err(GatewayError::upstream(ProviderId::Cohere, Some(500), "boom"));
            }
            Ok(format!("echo:{request}"))
        }

        async fn open_stream(&self, _request: &String) -> GatewayResult<NativeStream<&'static str>> {
            Ok(Box::pin(stream::iter(
                ["Hel", "skip", "lo", "end", "after"].map(Ok),
            )))
        }
    }

    impl ClientFactory for ScriptClient {
        fn from_credential(_: reqwest::Client, _: SecretString, _: &ProviderSettings) -> Self {
            Self
        }
    }

    struct ScriptCodec;

    impl ProviderCodec for ScriptCodec {
        type Client = ScriptClient;

        fn to_provider_request(&self, request: &PromptRequest, _streaming: bool) -> String {
            request.message.clone()
        }

        fn from_provider_result(&self, result: String) -> PromptResponse {
            PromptResponse::from_usage(result, Some(1), Some(2), None)
        }

        fn from_provider_chunk(&self, chunk: &'static str) -> GatewayResult<Option<StreamChunk>> {
            Ok(match chunk {
                "skip" => None,
                "end" => Some(StreamChunk::finished("", FinishReason::Done)),
                "after" => return Err(GatewayError::stream(ProviderId::Cohere, "bad chunk")),
                text => Some(StreamChunk::delta(text)),
            })
        }
    }

    fn connector() -> ProviderConnector<ScriptCodec> {
        let settings = ProviderSettings::new(ProviderId::Cohere, "http://localhost", "UNUSED");
        ProviderConnector::new(
            ScriptCodec,
            ClientSlot::with_lookup(settings, |_| Some("key".into())),
        )
    }

    #[tokio::test]
    async fn test_prompt_pipeline() {
        let response = connector()
            .prompt(&PromptRequest::new(0, "hello"), None)
            .await
            .unwrap();
        assert_eq!(response.content, "echo:hello");
        assert_eq!(response.total_tokens, 3);
    }

    #[tokio::test]
    async fn test_prompt_propagates_upstream_error() {
        let err = connector()
            .prompt(&PromptRequest::new(0, "fail"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_stream_preserves_order_and_skips_empty() {
        let items: Vec<_> = connector()
            .stream_prompt(&PromptRequest::new(0, "hi"), Some("tenant"))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 4);
        assert_eq!(items[0].as_ref().unwrap().content, "Hel");
        assert_eq!(items[1].as_ref().unwrap().content, "lo");
        assert_eq!(
            items[2].as_ref().unwrap().finish_reason,
            Some(FinishReason::Done)
        );
        assert!(items[3].is_err());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_call() {
        let settings = ProviderSettings::new(ProviderId::Cohere, "http://localhost", "UNSET");
        let connector =
            ProviderConnector::new(ScriptCodec, ClientSlot::with_lookup(settings, |_| None));
        let err = connector
            .prompt(&PromptRequest::new(0, "hello"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), gateway_core::ErrorKind::Configuration);
        assert_eq!(connector.provider(), ProviderId::Cohere);
    }
}
