//! Transport seams: the query trait every request backend implements, the
//! typed socket events the event stream emits, and the connector factory
//! the supervisor uses to build both — mockable in tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;
use crate::registry::ProviderSpec;
use crate::types::BlockSummary;
use crate::wire::{RpcRequest, RpcResponse};

/// A request/response backend bound to one provider's request endpoint.
///
/// Implementations must be `Send + Sync`; they are stored as
/// `Arc<dyn QueryTransport>` and shared across tasks.
#[async_trait]
pub trait QueryTransport: Send + Sync + 'static {
    /// Send one JSON-RPC request and return the raw response.
    async fn send(&self, req: RpcRequest) -> Result<RpcResponse, TransportError>;

    /// Endpoint label for logs. Must not contain credentials.
    fn endpoint(&self) -> &str;
}

impl dyn QueryTransport {
    /// Send a request and decode its result into `T`.
    ///
    /// A JSON `null` result decodes into `None` when `T` is an `Option`,
    /// which is how absent objects (unknown hash, future block) surface.
    pub async fn call<T: DeserializeOwned>(
        &self,
        req: RpcRequest,
    ) -> Result<T, TransportError> {
        let resp = self.send(req).await?;
        let value = resp.into_result().map_err(TransportError::Rpc)?;
        serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// A typed message from the live event stream.
#[derive(Debug)]
pub enum SocketEvent {
    /// The provider announced a new head.
    NewHead(BlockSummary),
    /// The stream ended: server close, protocol error, or transport error.
    /// Emitted at most once per stream; recovery belongs to the supervisor.
    Closed { reason: String },
}

/// Close signal for a live event stream. Dropping the handle also closes.
pub struct StreamHandle {
    shutdown: Option<oneshot::Sender<()>>,
}

impl StreamHandle {
    pub fn new(shutdown: oneshot::Sender<()>) -> Self {
        Self {
            shutdown: Some(shutdown),
        }
    }

    /// Ask the stream task to close the socket and exit. Idempotent.
    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// An open event stream: the receiving end of the socket's typed events
/// plus the handle that closes it.
pub struct EventStream {
    pub events: mpsc::Receiver<SocketEvent>,
    pub handle: StreamHandle,
}

/// Factory for per-provider backends. The supervisor and health checker
/// are written against this seam so tests can drive them with scripted
/// implementations.
#[async_trait]
pub trait LedgerConnector: Send + Sync + 'static {
    /// Build a query transport for the provider's request endpoint.
    async fn query_transport(
        &self,
        spec: &ProviderSpec,
    ) -> Result<Arc<dyn QueryTransport>, TransportError>;

    /// Open the provider's event stream and subscribe to new heads.
    /// Success means the subscription is confirmed and events will flow.
    async fn open_event_stream(
        &self,
        spec: &ProviderSpec,
    ) -> Result<EventStream, TransportError>;
}
