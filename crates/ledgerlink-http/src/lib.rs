//! ledgerlink-http — HTTP JSON-RPC query transport.
//!
//! Implements [`ledgerlink_core::QueryTransport`] over `reqwest` for
//! probes and point reads. Deliberately thin: one request, one response,
//! typed errors. Failover and retry policy belong to the manager.

pub mod client;

pub use client::HttpQueryTransport;
