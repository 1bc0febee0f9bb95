//! JSON-RPC 2.0 wire types and the request builders this system issues.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: RpcId,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Returns `true` if this is a successful response (result, no error).
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }

    /// Unwrap the result value or return the node's error.
    pub fn into_result(self) -> Result<Value, RpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// Builders for the ledger calls the connection manager issues.
pub mod methods {
    use super::*;

    /// `eth_blockNumber` — the lightweight read used by probes and
    /// connection attempts.
    pub fn current_height(id: u64) -> RpcRequest {
        RpcRequest::new(id, "eth_blockNumber", vec![])
    }

    /// `eth_getBlockByNumber` with the full transaction list.
    pub fn block_by_number(id: u64, number: u64) -> RpcRequest {
        RpcRequest::new(
            id,
            "eth_getBlockByNumber",
            vec![json!(format!("{number:#x}")), json!(true)],
        )
    }

    /// `eth_getTransactionByHash`.
    pub fn transaction_by_hash(id: u64, hash: &str) -> RpcRequest {
        RpcRequest::new(id, "eth_getTransactionByHash", vec![json!(hash)])
    }

    /// `eth_getTransactionReceipt`.
    pub fn receipt_by_hash(id: u64, hash: &str) -> RpcRequest {
        RpcRequest::new(id, "eth_getTransactionReceipt", vec![json!(hash)])
    }

    /// `eth_subscribe("newHeads")` — sent once per event-stream connection.
    pub fn subscribe_new_heads(id: u64) -> RpcRequest {
        RpcRequest::new(id, "eth_subscribe", vec![json!("newHeads")])
    }
}
