//! ledgerlink-core — foundation types for the LedgerLink connection manager.
//!
//! # Overview
//!
//! LedgerLink maintains a single live connection to a ledger RPC network
//! across several interchangeable providers, fails over on error, and fans
//! block/transaction events out to subscribers. This crate defines the
//! pieces everything else is built on:
//!
//! - [`ProviderRegistry`] — priority-ordered provider arena with per-slot
//!   health records
//! - [`ReconnectPolicy`] — exponential backoff computation
//! - [`RpcRequest`] / [`RpcResponse`] — JSON-RPC wire types and the request
//!   builders this system issues
//! - [`QueryTransport`] / [`LedgerConnector`] — the seams concrete HTTP/WS
//!   backends implement
//! - [`SocketEvent`] — typed messages from the live event stream
//! - error taxonomy in [`error`]

pub mod error;
pub mod policy;
pub mod registry;
pub mod transport;
pub mod types;
pub mod wire;

pub use error::{ConfigError, ConnectError, QueryError, RegistryError, TransportError};
pub use policy::ReconnectPolicy;
pub use registry::{ProviderHealth, ProviderId, ProviderRegistry, ProviderSpec, ProviderStatus};
pub use transport::{EventStream, LedgerConnector, QueryTransport, SocketEvent, StreamHandle};
pub use types::{Block, BlockSummary, Transaction, TransactionReceipt};
pub use wire::{RpcError, RpcId, RpcRequest, RpcResponse};
