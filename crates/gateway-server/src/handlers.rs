//! RPC handlers for the connector service.

use crate::error::{shutting_down, status_from_error};
use crate::proto::{
    self,
    connector_service_server::{ConnectorService, ConnectorServiceServer},
};
use crate::shutdown::{RequestGuard, ShutdownCoordinator};
use futures::StreamExt;
use gateway_core::{ChunkStream, Connector, FinishReason, GatewayError, PromptRequest};
use gateway_telemetry::{new_request_id, rpc_span};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, warn, Instrument};

/// Metadata key for a request-scoped provider credential
pub const API_KEY_HEADER: &str = "x-api-key";

/// Chunks buffered between the upstream reader and the client
const STREAM_BUFFER: usize = 1;

/// Sending half of a streamed response
pub type ChunkSender = mpsc::Sender<Result<proto::StreamChunk, Status>>;

/// Credential carried in the `x-api-key` metadata, if non-blank
#[must_use]
pub fn credential_from_metadata(metadata: &MetadataMap) -> Option<String> {
    metadata
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// How a relayed stream ended
#[derive(Debug)]
pub enum RelayOutcome {
    /// A chunk with a finish reason was delivered
    Finished(FinishReason),
    /// Upstream ended without a finish reason
    Ended,
    /// Upstream failed; the error was sent to the client
    Failed(GatewayError),
    /// The client went away
    Cancelled,
}

/// Forward upstream chunks to the client in order.
///
/// Stops after the first terminal chunk. Upstream is dropped as soon as the
/// client disconnects, without reading it further.
pub async fn relay(mut upstream: ChunkStream, tx: ChunkSender) -> RelayOutcome {
    loop {
        let next = tokio::select! {
            biased;
            () = tx.closed() => return RelayOutcome::Cancelled,
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                let finish = chunk.finish_reason;
                if tx.send(Ok(chunk.into())).await.is_err() {
                    return RelayOutcome::Cancelled;
                }
                if let Some(reason) = finish {
                    return RelayOutcome::Finished(reason);
                }
            }
            Some(Err(err)) => {
                // The client may already be gone; the outcome is the same.
                let _ = tx.send(Err(status_from_error(&err))).await;
                return RelayOutcome::Failed(err);
            }
            None => return RelayOutcome::Ended,
        }
    }
}

/// `ConnectorService` implementation over a single provider connector
#[derive(Clone)]
pub struct PromptHandler {
    connector: Arc<dyn Connector>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl std::fmt::Debug for PromptHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptHandler")
            .field("provider", &self.connector.provider())
            .finish_non_exhaustive()
    }
}

impl PromptHandler {
    /// Create a handler
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, shutdown: Arc<ShutdownCoordinator>) -> Self {
        Self { connector, shutdown }
    }

    /// Wrap the handler as a tonic service
    #[must_use]
    pub fn into_service(self) -> ConnectorServiceServer<Self> {
        ConnectorServiceServer::new(self)
    }

    fn admit(&self) -> Result<RequestGuard, Status> {
        RequestGuard::new(self.shutdown.clone()).ok_or_else(|| {
            debug!("Rejecting RPC during shutdown");
            shutting_down()
        })
    }
}

#[tonic::async_trait]
impl ConnectorService for PromptHandler {
    type StreamPromptStream = ReceiverStream<Result<proto::StreamChunk, Status>>;

    async fn prompt(
        &self,
        request: Request<proto::PromptRequest>,
    ) -> Result<Response<proto::PromptResponse>, Status> {
        let _guard = self.admit()?;
        let credential = credential_from_metadata(request.metadata());
        let request: PromptRequest = request.into_inner().into();
        let span = rpc_span!(new_request_id(), "Prompt", self.connector.provider());

        async {
            debug!(model = request.model.code(), "Prompt received");
            let start = Instant::now();
            match self.connector.prompt(&request, credential.as_deref()).await {
                Ok(response) => {
                    info!(
                        duration_ms = start.elapsed().as_millis(),
                        total_tokens = response.total_tokens,
                        "Prompt completed"
                    );
                    Ok(Response::new(response.into()))
                }
                Err(err) => {
                    error!(error = %err, kind = err.kind().as_str(), "Prompt failed");
                    Err(status_from_error(&err))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn stream_prompt(
        &self,
        request: Request<proto::PromptRequest>,
    ) -> Result<Response<Self::StreamPromptStream>, Status> {
        let guard = self.admit()?;
        let credential = credential_from_metadata(request.metadata());
        let request: PromptRequest = request.into_inner().into();
        let span = rpc_span!(new_request_id(), "StreamPrompt", self.connector.provider());

        let upstream = async {
            debug!(model = request.model.code(), "StreamPrompt received");
            self.connector
                .stream_prompt(&request, credential.as_deref())
                .await
                .map_err(|err| {
                    error!(error = %err, kind = err.kind().as_str(), "Stream could not be opened");
                    status_from_error(&err)
                })
        }
        .instrument(span.clone())
        .await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(
            async move {
                let _guard = guard;
                let start = Instant::now();
                match relay(upstream, tx).await {
                    RelayOutcome::Finished(reason) => {
                        info!(
                            finish_reason = %reason,
                            duration_ms = start.elapsed().as_millis(),
                            "Stream finished"
                        );
                    }
                    RelayOutcome::Ended => {
                        warn!("Upstream ended without a finish reason");
                    }
                    RelayOutcome::Failed(err) => {
                        error!(error = %err, "Stream failed");
                    }
                    RelayOutcome::Cancelled => {
                        info!("Stream cancelled by client");
                    }
                }
            }
            .instrument(span),
        );

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_kind;
    use async_trait::async_trait;
    use futures::stream;
    use gateway_core::{GatewayResult, PromptResponse, ProviderId, StreamChunk};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::task::Poll;
    use std::time::Duration;
    use tonic::Code;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct StubConnector {
        fail: bool,
        credentials: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Connector for StubConnector {
        fn provider(&self) -> ProviderId {
            ProviderId::OpenAI
        }

        async fn prompt(
            &self,
            request: &PromptRequest,
            credential: Option<&str>,
        ) -> GatewayResult<PromptResponse> {
            self.credentials.lock().unwrap().push(credential.map(ToOwned::to_owned));
            if self.fail {
                return Err(GatewayError::upstream(ProviderId::OpenAI, Some(500), "HTTP 500 - rate limited"));
            }
            Ok(PromptResponse::from_usage(format!("echo: {}", request.message), Some(1), Some(2), None))
        }

        async fn stream_prompt(
            &self,
            _request: &PromptRequest,
            credential: Option<&str>,
        ) -> GatewayResult<ChunkStream> {
            self.credentials.lock().unwrap().push(credential.map(ToOwned::to_owned));
            if self.fail {
                return Err(GatewayError::upstream(ProviderId::OpenAI, Some(401), "HTTP 401 - bad key"));
            }
            Ok(stream::iter(vec![
                Ok(StreamChunk::delta("Hel")),
                Ok(StreamChunk::finished("lo", FinishReason::Done)),
            ])
            .boxed())
        }
    }

    fn handler(connector: Arc<StubConnector>) -> PromptHandler {
        PromptHandler::new(connector, Arc::new(ShutdownCoordinator::with_defaults()))
    }

    fn wire_request(message: &str) -> Request<proto::PromptRequest> {
        Request::new(proto::PromptRequest {
            model: 1,
            message: message.to_string(),
            ..Default::default()
        })
    }

    async fn drain(mut rx: mpsc::Receiver<Result<proto::StreamChunk, Status>>) -> Vec<Result<proto::StreamChunk, Status>> {
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_relay_stops_after_terminal_chunk() {
        let polled_past_end = Arc::new(AtomicBool::new(false));
        let flag = polled_past_end.clone();
        let upstream = stream::iter(vec![
            Ok(StreamChunk::delta("a")),
            Ok(StreamChunk::delta("b")),
            Ok(StreamChunk::finished("", FinishReason::Limit)),
        ])
        .chain(stream::poll_fn(move |_| {
            flag.store(true, Ordering::SeqCst);
            Poll::Ready(None)
        }))
        .boxed();

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let task = tokio::spawn(relay(upstream, tx));
        let items = drain(rx).await;

        let contents: Vec<_> = items.iter().map(|item| item.as_ref().unwrap().content.clone()).collect();
        assert_eq!(contents, vec!["a", "b", ""]);
        assert_eq!(items[2].as_ref().unwrap().finish_reason(), proto::FinishReason::Limit);
        assert!(matches!(task.await.unwrap(), RelayOutcome::Finished(FinishReason::Limit)));
        assert!(!polled_past_end.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_relay_mid_stream_error_becomes_status() {
        let upstream = stream::iter(vec![
            Ok(StreamChunk::delta("partial")),
            Err(GatewayError::stream(ProviderId::Cohere, "connection reset")),
        ])
        .boxed();

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let task = tokio::spawn(relay(upstream, tx));
        let items = drain(rx).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().content, "partial");
        let status = items[1].as_ref().unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(error_kind(status), Some("stream"));
        assert!(status.message().contains("connection reset"));
        assert!(matches!(task.await.unwrap(), RelayOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_relay_upstream_eof_without_finish() {
        let upstream = stream::iter(vec![Ok(StreamChunk::delta("a"))]).boxed();

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let task = tokio::spawn(relay(upstream, tx));
        let items = drain(rx).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(task.await.unwrap(), RelayOutcome::Ended));
    }

    #[tokio::test]
    async fn test_relay_drops_upstream_on_cancel() {
        let dropped = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(dropped.clone());
        let upstream = stream::once(async { Ok(StreamChunk::delta("a")) })
            .chain(stream::pending())
            .map(move |item| {
                let _flag = &guard;
                item
            })
            .boxed();

        let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);
        let task = tokio::spawn(relay(upstream, tx));

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.content, "a");
        drop(rx);

        let outcome = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::Cancelled));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_credential_from_metadata() {
        let mut metadata = MetadataMap::new();
        assert_eq!(credential_from_metadata(&metadata), None);

        metadata.insert(API_KEY_HEADER, "  ".parse().unwrap());
        assert_eq!(credential_from_metadata(&metadata), None);

        metadata.insert(API_KEY_HEADER, "tenant-key".parse().unwrap());
        assert_eq!(credential_from_metadata(&metadata).as_deref(), Some("tenant-key"));
    }

    #[tokio::test]
    async fn test_prompt_success_passes_credential() {
        let connector = Arc::new(StubConnector::default());
        let mut request = wire_request("hello");
        request
            .metadata_mut()
            .insert(API_KEY_HEADER, "tenant-key".parse().unwrap());

        let response = handler(connector.clone()).prompt(request).await.unwrap().into_inner();

        assert_eq!(response.content, "echo: hello");
        assert_eq!(response.total_tokens, 3);
        assert_eq!(
            connector.credentials.lock().unwrap().as_slice(),
            &[Some("tenant-key".to_string())]
        );
    }

    #[tokio::test]
    async fn test_prompt_error_carries_kind() {
        let connector = Arc::new(StubConnector {
            fail: true,
            ..Default::default()
        });

        let status = handler(connector).prompt(wire_request("hello")).await.unwrap_err();

        assert_eq!(status.code(), Code::Internal);
        assert_eq!(error_kind(&status), Some("upstream"));
        assert!(status.message().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_stream_prompt_relays_chunks() {
        let connector = Arc::new(StubConnector::default());
        let stream = handler(connector.clone())
            .stream_prompt(wire_request("hi"))
            .await
            .unwrap()
            .into_inner();

        let chunks: Vec<_> = stream.map(Result::unwrap).collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "Hel");
        assert_eq!(chunks[1].finish_reason(), proto::FinishReason::Done);
        assert_eq!(connector.credentials.lock().unwrap().as_slice(), &[None]);
    }

    #[tokio::test]
    async fn test_stream_open_failure_is_rpc_error() {
        let connector = Arc::new(StubConnector {
            fail: true,
            ..Default::default()
        });

        let status = handler(connector).stream_prompt(wire_request("hi")).await.unwrap_err();
        assert_eq!(error_kind(&status), Some("upstream"));
        assert!(status.message().contains("bad key"));
    }

    #[tokio::test]
    async fn test_rpcs_rejected_during_shutdown() {
        let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_millis(50)));
        let connector = Arc::new(StubConnector::default());
        let handler = PromptHandler::new(connector.clone(), coordinator.clone());

        coordinator.trigger_shutdown("test").await;

        let status = handler.prompt(wire_request("late")).await.unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
        let status = handler.stream_prompt(wire_request("late")).await.unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
        assert!(connector.credentials.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_holds_request_guard_until_done() {
        let coordinator = Arc::new(ShutdownCoordinator::with_defaults());
        let handler = PromptHandler::new(Arc::new(StubConnector::default()), coordinator.clone());

        let stream = handler.stream_prompt(wire_request("hi")).await.unwrap().into_inner();
        let _: Vec<_> = stream.collect().await;

        tokio::time::timeout(Duration::from_secs(1), async {
            while coordinator.in_flight_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
