//! Shared connection state and aggregate counters.
//!
//! One mutex guards the whole connection record, so readers always see a
//! consistent pairing of phase and active provider — never `connected`
//! with no provider, or the reverse.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use ledgerlink_core::registry::{ProviderId, ProviderStatus};
use ledgerlink_core::transport::QueryTransport;

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Connected,
}

/// The provider currently holding the live socket.
pub(crate) struct ActiveConnection {
    pub id: ProviderId,
    pub name: String,
    pub transport: Arc<dyn QueryTransport>,
}

/// The single connection record, owned by the supervisor and read by the
/// status/query paths.
pub(crate) struct ConnState {
    pub phase: Phase,
    pub active: Option<ActiveConnection>,
    pub connected_at_ms: Option<u64>,
    pub last_height: Option<u64>,
    pub reconnect_attempts: u32,
}

impl ConnState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Disconnected,
            active: None,
            connected_at_ms: None,
            last_height: None,
            reconnect_attempts: 0,
        }
    }
}

pub(crate) type SharedState = Arc<Mutex<ConnState>>;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Monotonic counters for the life of the service.
#[derive(Default)]
pub struct ConnectionStats {
    pub(crate) blocks_seen: AtomicU64,
    pub(crate) address_matches: AtomicU64,
    pub(crate) callback_failures: AtomicU64,
    pub(crate) socket_drops: AtomicU64,
    pub(crate) reconnects: AtomicU64,
}

impl ConnectionStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_seen: self.blocks_seen.load(Ordering::Relaxed),
            address_matches: self.address_matches.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            socket_drops: self.socket_drops.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub blocks_seen: u64,
    pub address_matches: u64,
    pub callback_failures: u64,
    pub socket_drops: u64,
    pub reconnects: u64,
}

/// Everything the gateway's status endpoint needs, read from memory.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub current_provider: Option<String>,
    pub last_height: Option<u64>,
    pub connected_at_ms: Option<u64>,
    pub reconnect_attempts: u32,
    pub providers: Vec<ProviderStatus>,
    pub stats: StatsSnapshot,
}
