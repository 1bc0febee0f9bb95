//! Provider registry — the deterministic, priority-ordered view of
//! configured providers and the single place their health is tracked.
//!
//! Specs are immutable once registered; the mutable health record lives in
//! an indexed arena behind accessor/mutator methods so no component holds a
//! long-lived reference across a provider swap.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::RegistryError;

/// Stable handle into the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId(pub(crate) usize);

impl ProviderId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Immutable identity and connection parameters of a configured provider.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    /// Unique name, e.g. `"alchemy-mainnet"`.
    pub name: String,
    /// Request (HTTP JSON-RPC) endpoint.
    pub rpc_url: String,
    /// Event-stream (WebSocket) endpoint.
    pub ws_url: String,
    /// Credential embedded in the endpoint URLs, kept for log redaction.
    pub api_key: Option<String>,
    /// Lower is preferred; primary sort key for selection.
    pub priority: u32,
    /// Advertised requests/sec ceiling. Informational only.
    pub rate_limit: u32,
    /// Per-provider probe/connect/request timeout.
    pub timeout: Duration,
}

impl ProviderSpec {
    /// Request endpoint with the credential masked, safe for logs.
    pub fn redacted_rpc_url(&self) -> String {
        redact(&self.rpc_url, self.api_key.as_deref())
    }

    /// Event-stream endpoint with the credential masked, safe for logs.
    pub fn redacted_ws_url(&self) -> String {
        redact(&self.ws_url, self.api_key.as_deref())
    }
}

fn redact(url: &str, key: Option<&str>) -> String {
    match key {
        Some(key) if !key.is_empty() => url.replace(key, "***"),
        _ => url.to_string(),
    }
}

/// Mutable health record, updated only by the health checker and the
/// connection supervisor.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub is_healthy: bool,
    /// Unix millis of the last probe or connection attempt.
    pub last_checked_ms: Option<u64>,
    /// Latency of the last successful probe.
    pub latency_ms: Option<u64>,
    pub consecutive_failures: u32,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        // Healthy until proven otherwise, so the first connect attempt has
        // candidates before the first sweep completes.
        Self {
            is_healthy: true,
            last_checked_ms: None,
            latency_ms: None,
            consecutive_failures: 0,
        }
    }
}

/// Point-in-time view of one provider, as exposed to the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub priority: u32,
    #[serde(flatten)]
    pub health: ProviderHealth,
}

struct Slot {
    spec: ProviderSpec,
    health: Mutex<ProviderHealth>,
}

/// Priority-ordered provider arena. Registration happens once at startup;
/// afterwards only the per-slot health records mutate.
#[derive(Default)]
pub struct ProviderRegistry {
    slots: Vec<Slot>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider. Fails if the name is already taken.
    pub fn register(&mut self, spec: ProviderSpec) -> Result<ProviderId, RegistryError> {
        if self.slots.iter().any(|s| s.spec.name == spec.name) {
            return Err(RegistryError::DuplicateProvider { name: spec.name });
        }
        self.slots.push(Slot {
            spec,
            health: Mutex::new(ProviderHealth::default()),
        });
        Ok(ProviderId(self.slots.len() - 1))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All provider ids in registration order.
    pub fn ids(&self) -> Vec<ProviderId> {
        (0..self.slots.len()).map(ProviderId).collect()
    }

    /// Immutable spec for a provider.
    pub fn spec(&self, id: ProviderId) -> &ProviderSpec {
        &self.slots[id.0].spec
    }

    /// Snapshot of one provider's health record.
    pub fn health(&self, id: ProviderId) -> ProviderHealth {
        self.slots[id.0].health.lock().unwrap().clone()
    }

    /// Healthy providers, ascending by priority; ties keep registration
    /// order. An empty result is a valid state, not an error.
    pub fn healthy_in_priority_order(&self) -> Vec<ProviderId> {
        let mut healthy: Vec<(u32, ProviderId)> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.health.lock().unwrap().is_healthy)
            .map(|(i, s)| (s.spec.priority, ProviderId(i)))
            .collect();
        healthy.sort_by_key(|(priority, _)| *priority);
        healthy.into_iter().map(|(_, id)| id).collect()
    }

    /// Record a successful probe: healthy, latency stored, failure streak
    /// reset. The whole record is updated under one lock.
    pub fn mark_healthy(&self, id: ProviderId, latency: Duration) {
        let mut health = self.slots[id.0].health.lock().unwrap();
        health.is_healthy = true;
        health.last_checked_ms = Some(now_ms());
        health.latency_ms = Some(latency.as_millis() as u64);
        health.consecutive_failures = 0;
    }

    /// Record a failed probe or connection attempt.
    pub fn mark_unhealthy(&self, id: ProviderId) {
        let mut health = self.slots[id.0].health.lock().unwrap();
        health.is_healthy = false;
        health.last_checked_ms = Some(now_ms());
        health.consecutive_failures += 1;
    }

    /// Per-provider status list for the gateway.
    pub fn snapshot(&self) -> Vec<ProviderStatus> {
        self.slots
            .iter()
            .map(|s| ProviderStatus {
                name: s.spec.name.clone(),
                priority: s.spec.priority,
                health: s.health.lock().unwrap().clone(),
            })
            .collect()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
