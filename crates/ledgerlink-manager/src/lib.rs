//! ledgerlink-manager — the coordination layer of LedgerLink.
//!
//! Owns the single live connection to the ledger network and everything
//! around it:
//!
//! - [`LedgerService`] — dependency-injected facade with an explicit
//!   `start()`/`shutdown()` lifecycle
//! - connection supervision with priority failover across providers
//! - reconnect scheduling with exponential backoff and an attempt cap
//! - [`HealthChecker`] — concurrent, timeout-bounded provider probes
//! - [`SubscriptionMultiplexer`] — durable block and address-transaction
//!   subscriptions that survive provider swaps
//! - [`QueryFacade`] — fail-fast point reads
//!
//! The supervisor is a single task consuming typed messages (commands,
//! socket events, timer firings), so connection state transitions are
//! serialized by construction.

pub mod connector;
pub mod health;
pub mod multiplexer;
pub mod query;
pub mod service;

mod state;
mod supervisor;

pub use connector::RpcConnector;
pub use health::{HealthChecker, ProbeReport};
pub use multiplexer::{
    AddressActivity, CallbackError, Direction, SubscriptionHandle, SubscriptionMultiplexer,
};
pub use query::QueryFacade;
pub use service::{LedgerService, LedgerServiceConfig};
pub use state::{ConnectionStats, ConnectionStatus, Phase, StatsSnapshot};
