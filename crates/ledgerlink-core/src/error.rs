//! Error taxonomy for the connection manager.

use thiserror::Error;

use crate::wire::RpcError;

/// Errors that can occur while talking to a provider endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, DNS, TLS, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Event-stream connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(RpcError),

    /// Request exceeded the provider's configured timeout.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// The event stream ended or was closed by the remote side.
    #[error("event stream closed: {0}")]
    Closed(String),
}

/// Errors raised while building the provider registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A provider with the same name is already registered.
    #[error("provider already registered: {name}")]
    DuplicateProvider { name: String },
}

/// Errors raised by a connection attempt or the reconnect scheduler.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The registry currently has no healthy candidates.
    #[error("no healthy provider available")]
    NoHealthyProvider,

    /// Every healthy candidate was tried and every one failed.
    #[error("all {attempted} candidate providers failed")]
    AllProvidersFailed { attempted: usize },

    /// The reconnect attempt cap was reached; operator intervention required.
    #[error("gave up after {attempts} reconnect attempts")]
    MaxReconnectAttemptsExceeded { attempts: u32 },

    /// The coordinating task is gone (service shut down).
    #[error("connection supervisor is not running")]
    SupervisorGone,
}

/// Errors surfaced synchronously to point-read callers.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Input failed shape validation; no network call was made.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// There is no active connection; retry once reconnected.
    #[error("not connected to any provider")]
    NotConnected,

    /// The node answered with an empty result for a well-formed request.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The request reached the wire and failed there.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Fatal configuration problems, surfaced at startup and never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No providers were configured and no fallback applies.
    #[error("no providers configured")]
    NoProviders,
}
