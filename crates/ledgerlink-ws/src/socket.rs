//! New-heads event socket.
//!
//! Opens the provider's event-stream endpoint, subscribes to new heads,
//! and forwards typed [`SocketEvent`]s until the socket dies or the handle
//! is closed. A dead socket is reported upward exactly once; this module
//! never reconnects on its own — recovery is the supervisor's job, so a
//! close handler can never race an in-flight connect attempt.

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use ledgerlink_core::error::TransportError;
use ledgerlink_core::registry::ProviderSpec;
use ledgerlink_core::transport::{EventStream, SocketEvent, StreamHandle};
use ledgerlink_core::types::{parse_hex_u64, BlockSummary};
use ledgerlink_core::wire::methods;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Open the provider's event stream and confirm the new-heads
/// subscription, all within the provider's configured timeout.
pub async fn open_event_stream(spec: &ProviderSpec) -> Result<EventStream, TransportError> {
    let label = spec.redacted_ws_url();
    let timeout_ms = spec.timeout.as_millis() as u64;

    let (ws, _) = tokio::time::timeout(spec.timeout, connect_async(&spec.ws_url))
        .await
        .map_err(|_| TransportError::Timeout { ms: timeout_ms })?
        .map_err(|e| TransportError::WebSocket(e.to_string()))?;

    let (mut write, mut read) = ws.split();

    let sub_req = methods::subscribe_new_heads(1);
    let msg =
        serde_json::to_string(&sub_req).map_err(|e| TransportError::Decode(e.to_string()))?;
    write
        .send(Message::Text(msg))
        .await
        .map_err(|e| TransportError::WebSocket(e.to_string()))?;

    // The subscription is only live once the node acknowledges it.
    let sub_id = tokio::time::timeout(spec.timeout, async {
        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| TransportError::WebSocket(e.to_string()))?;
            if let Message::Text(text) = msg {
                if let Some(ack) = parse_subscribe_ack(&text) {
                    return ack.map_err(TransportError::Rpc);
                }
            }
        }
        Err(TransportError::Closed(
            "stream ended before subscription was confirmed".into(),
        ))
    })
    .await
    .map_err(|_| TransportError::Timeout { ms: timeout_ms })??;

    info!(endpoint = %label, subscription = %sub_id, "event stream subscribed");

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(run_stream(label, write, read, tx, shutdown_rx));

    Ok(EventStream {
        events: rx,
        handle: StreamHandle::new(shutdown_tx),
    })
}

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsSource = futures::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

async fn run_stream(
    label: String,
    mut write: WsSink,
    mut read: WsSource,
    tx: mpsc::Sender<SocketEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            // Solicited close: no Closed event, the caller initiated it.
            _ = &mut shutdown => {
                let _ = write.send(Message::Close(None)).await;
                debug!(endpoint = %label, "event stream closed on request");
                return;
            }
            msg = read.next() => {
                match msg {
                    None => {
                        let _ = tx.send(SocketEvent::Closed {
                            reason: "stream ended".into(),
                        }).await;
                        return;
                    }
                    Some(Err(e)) => {
                        warn!(endpoint = %label, error = %e, "event stream error");
                        let _ = tx.send(SocketEvent::Closed {
                            reason: e.to_string(),
                        }).await;
                        return;
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Some(summary) = parse_new_head(&text) {
                            if tx.send(SocketEvent::NewHead(summary)).await.is_err() {
                                // Receiver gone — the connection was replaced.
                                return;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(endpoint = %label, "event stream closed by server");
                        let _ = tx.send(SocketEvent::Closed {
                            reason: "closed by server".into(),
                        }).await;
                        return;
                    }
                    Some(Ok(_)) => {} // binary / pong — ignore
                }
            }
        }
    }
}

/// Parse the `eth_subscribe` acknowledgement (request id 1).
/// Returns `None` for unrelated messages.
fn parse_subscribe_ack(text: &str) -> Option<Result<String, ledgerlink_core::wire::RpcError>> {
    let v: Value = serde_json::from_str(text).ok()?;
    if v.get("id")?.as_u64()? != 1 {
        return None;
    }
    if let Some(err) = v.get("error") {
        let err: ledgerlink_core::wire::RpcError = serde_json::from_value(err.clone()).ok()?;
        return Some(Err(err));
    }
    Some(Ok(v.get("result")?.as_str()?.to_string()))
}

/// Parse a new-heads notification into a [`BlockSummary`].
/// Returns `None` for confirmations, pings-in-text, or malformed payloads.
fn parse_new_head(text: &str) -> Option<BlockSummary> {
    let v: Value = serde_json::from_str(text).ok()?;
    if v.get("method")?.as_str()? != "eth_subscription" {
        return None;
    }
    let head = v.get("params")?.get("result")?;
    let height = parse_hex_u64(head.get("number")?.as_str()?).ok()?;
    let hash = head.get("hash")?.as_str()?.to_string();
    let timestamp = head
        .get("timestamp")
        .and_then(|t| t.as_str())
        .and_then(|t| parse_hex_u64(t).ok())
        .unwrap_or(0);
    Some(BlockSummary {
        height,
        hash,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_new_head_notification() {
        let msg = r#"{
            "jsonrpc":"2.0","method":"eth_subscription",
            "params":{
                "subscription":"0xabc",
                "result":{
                    "number":"0x12d687",
                    "hash":"0xdeadbeef",
                    "timestamp":"0x65f0c700"
                }
            }
        }"#;
        let head = parse_new_head(msg).unwrap();
        assert_eq!(head.height, 1_234_567);
        assert_eq!(head.hash, "0xdeadbeef");
        assert_eq!(head.timestamp, 0x65f0c700);
    }

    #[test]
    fn skip_subscription_confirmation() {
        let msg = r#"{"jsonrpc":"2.0","id":1,"result":"0xsubid"}"#;
        assert!(parse_new_head(msg).is_none());
    }

    #[test]
    fn ack_parses_subscription_id() {
        let msg = r#"{"jsonrpc":"2.0","id":1,"result":"0xsubid"}"#;
        assert_eq!(parse_subscribe_ack(msg).unwrap().unwrap(), "0xsubid");
    }

    #[test]
    fn ack_surfaces_node_rejection() {
        let msg = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"no subscriptions"}}"#;
        let err = parse_subscribe_ack(msg).unwrap().unwrap_err();
        assert_eq!(err.code, -32601);
    }

    #[test]
    fn ack_ignores_other_ids() {
        let msg = r#"{"jsonrpc":"2.0","id":7,"result":"0x1"}"#;
        assert!(parse_subscribe_ack(msg).is_none());
    }

    #[test]
    fn malformed_head_is_skipped() {
        let msg = r#"{
            "jsonrpc":"2.0","method":"eth_subscription",
            "params":{"subscription":"0x1","result":{"hash":"0x1"}}
        }"#;
        assert!(parse_new_head(msg).is_none());
    }
}
