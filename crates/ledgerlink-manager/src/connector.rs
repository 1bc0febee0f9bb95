//! The production connector: HTTP request transport + WebSocket event
//! stream, one pair per provider.

use std::sync::Arc;

use async_trait::async_trait;

use ledgerlink_core::error::TransportError;
use ledgerlink_core::registry::ProviderSpec;
use ledgerlink_core::transport::{EventStream, LedgerConnector, QueryTransport};
use ledgerlink_http::HttpQueryTransport;

/// Builds real network backends for a provider spec.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcConnector;

#[async_trait]
impl LedgerConnector for RpcConnector {
    async fn query_transport(
        &self,
        spec: &ProviderSpec,
    ) -> Result<Arc<dyn QueryTransport>, TransportError> {
        Ok(Arc::new(HttpQueryTransport::for_provider(spec)?))
    }

    async fn open_event_stream(&self, spec: &ProviderSpec) -> Result<EventStream, TransportError> {
        ledgerlink_ws::open_event_stream(spec).await
    }
}
