//! Scripted mock backend for end-to-end manager tests.
//!
//! `MockNet` is the shared "network": per-provider behavior switches, a
//! block/transaction store served to scans and queries, a call log, and
//! the senders of every event stream opened so far (tests push heads and
//! closes through them). Streams opened earlier stay addressable so a test
//! can prove that a replaced socket's events go nowhere.

// Each integration-test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use ledgerlink_core::error::TransportError;
use ledgerlink_core::policy::ReconnectPolicy;
use ledgerlink_core::registry::{ProviderRegistry, ProviderSpec};
use ledgerlink_core::transport::{
    EventStream, LedgerConnector, QueryTransport, SocketEvent, StreamHandle,
};
use ledgerlink_core::types::{parse_hex_u64, BlockSummary};
use ledgerlink_core::wire::{RpcRequest, RpcResponse};
use ledgerlink_manager::{LedgerService, LedgerServiceConfig};

#[derive(Clone)]
pub struct Behavior {
    /// Request-endpoint reads succeed.
    pub requests_ok: bool,
    /// The event stream opens and the subscription confirms.
    pub stream_ok: bool,
    /// Request-endpoint reads never answer (exercises the timeout path).
    pub hang_requests: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            requests_ok: true,
            stream_ok: true,
            hang_requests: false,
        }
    }
}

#[derive(Default)]
struct NetInner {
    behaviors: HashMap<String, Behavior>,
    streams: Vec<mpsc::Sender<SocketEvent>>,
    calls: Vec<(String, String)>,
    blocks: HashMap<u64, Value>,
    transactions: HashMap<String, Value>,
    height: u64,
}

pub struct MockNet {
    inner: Mutex<NetInner>,
}

impl MockNet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(NetInner {
                height: 0x100,
                ..NetInner::default()
            }),
        })
    }

    pub fn set_behavior(&self, provider: &str, behavior: Behavior) {
        self.inner
            .lock()
            .unwrap()
            .behaviors
            .insert(provider.to_string(), behavior);
    }

    pub fn set_requests_ok(&self, provider: &str, ok: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.behaviors.entry(provider.to_string()).or_default().requests_ok = ok;
    }

    pub fn set_stream_ok(&self, provider: &str, ok: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.behaviors.entry(provider.to_string()).or_default().stream_ok = ok;
    }

    /// Store a block with the given transactions as `(hash, from, to)`.
    pub fn add_block(&self, height: u64, txs: &[(&str, &str, Option<&str>)]) {
        let transactions: Vec<Value> = txs
            .iter()
            .map(|(hash, from, to)| {
                json!({
                    "hash": hash,
                    "from": from,
                    "to": to,
                    "value": "0xde0b6b3a7640000",
                    "blockNumber": format!("{height:#x}"),
                })
            })
            .collect();
        let block = json!({
            "number": format!("{height:#x}"),
            "hash": format!("0xb{height:x}"),
            "parentHash": format!("0xb{:x}", height.saturating_sub(1)),
            "timestamp": format!("{:#x}", 1_700_000_000 + height),
            "transactions": transactions,
        });
        self.inner.lock().unwrap().blocks.insert(height, block);
    }

    pub fn add_transaction(&self, hash: &str, from: &str, to: &str) {
        let tx = json!({
            "hash": hash,
            "from": from,
            "to": to,
            "value": "0x0",
            "blockNumber": "0x1",
        });
        self.inner
            .lock()
            .unwrap()
            .transactions
            .insert(hash.to_string(), tx);
    }

    /// Number of calls of `method` seen across all providers.
    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(_, m)| m == method)
            .count()
    }

    /// Number of event streams opened so far.
    pub fn stream_count(&self) -> usize {
        self.inner.lock().unwrap().streams.len()
    }

    fn stream_sender(&self, index: usize) -> mpsc::Sender<SocketEvent> {
        self.inner.lock().unwrap().streams[index].clone()
    }

    fn latest_stream_sender(&self) -> mpsc::Sender<SocketEvent> {
        let inner = self.inner.lock().unwrap();
        inner.streams.last().expect("no stream opened yet").clone()
    }

    /// Announce a new head on the most recently opened stream.
    pub async fn push_head(&self, height: u64) {
        let sender = self.latest_stream_sender();
        let _ = sender
            .send(SocketEvent::NewHead(BlockSummary {
                height,
                hash: format!("0xb{height:x}"),
                timestamp: 1_700_000_000 + height,
            }))
            .await;
    }

    /// Announce a new head on a specific (possibly stale) stream.
    pub async fn push_head_on(&self, index: usize, height: u64) {
        let sender = self.stream_sender(index);
        let _ = sender
            .send(SocketEvent::NewHead(BlockSummary {
                height,
                hash: format!("0xb{height:x}"),
                timestamp: 1_700_000_000 + height,
            }))
            .await;
    }

    /// Kill the most recently opened stream.
    pub async fn push_closed(&self, reason: &str) {
        let sender = self.latest_stream_sender();
        let _ = sender
            .send(SocketEvent::Closed {
                reason: reason.to_string(),
            })
            .await;
    }

    fn behavior(&self, provider: &str) -> Behavior {
        self.inner
            .lock()
            .unwrap()
            .behaviors
            .get(provider)
            .cloned()
            .unwrap_or_default()
    }

    fn record_call(&self, provider: &str, method: &str) {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push((provider.to_string(), method.to_string()));
    }

    fn answer(&self, req: &RpcRequest) -> Result<Value, TransportError> {
        let inner = self.inner.lock().unwrap();
        match req.method.as_str() {
            "eth_blockNumber" => Ok(json!(format!("{:#x}", inner.height))),
            "eth_getBlockByNumber" => {
                let height = req.params[0]
                    .as_str()
                    .and_then(|s| parse_hex_u64(s).ok())
                    .unwrap_or(0);
                Ok(inner.blocks.get(&height).cloned().unwrap_or(Value::Null))
            }
            "eth_getTransactionByHash" => {
                let hash = req.params[0].as_str().unwrap_or("");
                Ok(inner.transactions.get(hash).cloned().unwrap_or(Value::Null))
            }
            "eth_getTransactionReceipt" => {
                let hash = req.params[0].as_str().unwrap_or("");
                if inner.transactions.contains_key(hash) {
                    Ok(json!({
                        "transactionHash": hash,
                        "blockNumber": "0x1",
                        "status": "0x1",
                        "gasUsed": "0x5208",
                    }))
                } else {
                    Ok(Value::Null)
                }
            }
            other => Err(TransportError::Http(format!("unhandled method {other}"))),
        }
    }
}

struct MockTransport {
    provider: String,
    net: Arc<MockNet>,
}

#[async_trait]
impl QueryTransport for MockTransport {
    async fn send(&self, req: RpcRequest) -> Result<RpcResponse, TransportError> {
        self.net.record_call(&self.provider, &req.method);
        let behavior = self.net.behavior(&self.provider);
        if behavior.hang_requests {
            std::future::pending::<()>().await;
        }
        if !behavior.requests_ok {
            return Err(TransportError::Http("connection refused".into()));
        }
        let result = self.net.answer(&req)?;
        Ok(RpcResponse {
            jsonrpc: "2.0".into(),
            id: req.id,
            result: Some(result),
            error: None,
        })
    }

    fn endpoint(&self) -> &str {
        &self.provider
    }
}

pub struct MockConnector {
    pub net: Arc<MockNet>,
}

#[async_trait]
impl LedgerConnector for MockConnector {
    async fn query_transport(
        &self,
        spec: &ProviderSpec,
    ) -> Result<Arc<dyn QueryTransport>, TransportError> {
        Ok(Arc::new(MockTransport {
            provider: spec.name.clone(),
            net: self.net.clone(),
        }))
    }

    async fn open_event_stream(&self, spec: &ProviderSpec) -> Result<EventStream, TransportError> {
        let behavior = self.net.behavior(&spec.name);
        if !behavior.stream_ok {
            return Err(TransportError::WebSocket("subscribe rejected".into()));
        }
        let (tx, rx) = mpsc::channel(64);
        let (close_tx, _close_rx) = oneshot::channel();
        self.net.inner.lock().unwrap().streams.push(tx);
        Ok(EventStream {
            events: rx,
            handle: StreamHandle::new(close_tx),
        })
    }
}

pub fn provider(name: &str, priority: u32) -> ProviderSpec {
    ProviderSpec {
        name: name.to_string(),
        rpc_url: format!("mock://{name}"),
        ws_url: format!("mock://{name}/ws"),
        api_key: None,
        priority,
        rate_limit: 10,
        timeout: Duration::from_secs(2),
    }
}

pub fn registry_of(providers: &[(&str, u32)]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for (name, priority) in providers {
        registry.register(provider(name, *priority)).unwrap();
    }
    registry
}

/// Build a service over the mock net. The periodic sweep interval is huge
/// so tests fully control when health changes.
pub fn test_service(net: &Arc<MockNet>, providers: &[(&str, u32)]) -> LedgerService {
    LedgerService::new(
        registry_of(providers),
        Arc::new(MockConnector { net: net.clone() }),
        LedgerServiceConfig {
            health_check_interval: Duration::from_secs(3_600),
            reconnect: ReconnectPolicy::default(),
        },
    )
    .unwrap()
}

/// Let spawned tasks run (and the paused clock advance a few ticks).
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}
