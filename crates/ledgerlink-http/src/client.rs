//! HTTP JSON-RPC query transport backed by `reqwest`.
//!
//! Point reads fail fast: no retries, no caching. Availability handling
//! lives in the registry/supervisor layer, not here.

use std::time::Duration;

use async_trait::async_trait;

use ledgerlink_core::error::TransportError;
use ledgerlink_core::registry::ProviderSpec;
use ledgerlink_core::transport::QueryTransport;
use ledgerlink_core::wire::{RpcRequest, RpcResponse};

/// One provider's request-endpoint client.
pub struct HttpQueryTransport {
    url: String,
    /// Credential-free endpoint label used in logs and errors.
    label: String,
    http: reqwest::Client,
    timeout_ms: u64,
}

impl HttpQueryTransport {
    /// Build a client for the provider's request endpoint, honoring its
    /// configured timeout.
    pub fn for_provider(spec: &ProviderSpec) -> Result<Self, TransportError> {
        Self::new(&spec.rpc_url, spec.redacted_rpc_url(), spec.timeout)
    }

    /// Build a client for an arbitrary endpoint URL.
    pub fn new(
        url: impl Into<String>,
        label: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            label: label.into(),
            http,
            timeout_ms: timeout.as_millis() as u64,
        })
    }
}

#[async_trait]
impl QueryTransport for HttpQueryTransport {
    async fn send(&self, req: RpcRequest) -> Result<RpcResponse, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout { ms: self.timeout_ms }
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(endpoint = %self.label, status, "request rejected");
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<RpcResponse>()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }

    fn endpoint(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ProviderSpec {
        ProviderSpec {
            name: "test".into(),
            rpc_url: "https://rpc.example/v2/topsecret".into(),
            ws_url: "wss://rpc.example/v2/topsecret".into(),
            api_key: Some("topsecret".into()),
            priority: 1,
            rate_limit: 25,
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn endpoint_label_is_redacted() {
        let client = HttpQueryTransport::for_provider(&spec()).unwrap();
        assert_eq!(client.endpoint(), "https://rpc.example/v2/***");
        assert!(!client.endpoint().contains("topsecret"));
    }
}
