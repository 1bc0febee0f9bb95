//! Health checker: maintains the registry's opinion of provider liveness,
//! independently of the active connection.
//!
//! Probes run concurrently — a single slow or unreachable provider must
//! not delay the verdict for the others — and each carries the provider's
//! own timeout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use ledgerlink_core::error::TransportError;
use ledgerlink_core::registry::{ProviderId, ProviderRegistry};
use ledgerlink_core::transport::{LedgerConnector, QueryTransport};
use ledgerlink_core::types::parse_hex_u64;
use ledgerlink_core::wire::methods;

/// Outcome of a single probe, as returned by the manual health-check call.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub name: String,
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

pub struct HealthChecker {
    registry: Arc<ProviderRegistry>,
    connector: Arc<dyn LedgerConnector>,
    /// Probe transports, built once per provider and reused across sweeps.
    transports: Mutex<HashMap<ProviderId, Arc<dyn QueryTransport>>>,
    req_id: AtomicU64,
}

impl HealthChecker {
    pub(crate) fn new(registry: Arc<ProviderRegistry>, connector: Arc<dyn LedgerConnector>) -> Self {
        Self {
            registry,
            connector,
            transports: Mutex::new(HashMap::new()),
            req_id: AtomicU64::new(1),
        }
    }

    async fn transport_for(&self, id: ProviderId) -> Result<Arc<dyn QueryTransport>, TransportError> {
        if let Some(t) = self.transports.lock().unwrap().get(&id) {
            return Ok(t.clone());
        }
        let t = self.connector.query_transport(self.registry.spec(id)).await?;
        self.transports.lock().unwrap().insert(id, t.clone());
        Ok(t)
    }

    /// Probe one provider with a lightweight height read and record the
    /// result in the registry.
    pub async fn probe(&self, id: ProviderId) -> ProbeReport {
        let spec = self.registry.spec(id);
        let name = spec.name.clone();
        let timeout = spec.timeout;
        let timeout_ms = timeout.as_millis() as u64;

        let started = Instant::now();
        let outcome: Result<(), TransportError> = async {
            let transport = self.transport_for(id).await?;
            let req = methods::current_height(self.req_id.fetch_add(1, Ordering::Relaxed));
            let height: String = tokio::time::timeout(timeout, transport.call(req))
                .await
                .map_err(|_| TransportError::Timeout { ms: timeout_ms })??;
            // A well-formed response is part of the health contract.
            parse_hex_u64(&height)
                .map_err(|e| TransportError::Decode(format!("bad height quantity: {e}")))?;
            Ok(())
        }
        .await;
        let latency = started.elapsed();

        match outcome {
            Ok(()) => {
                self.registry.mark_healthy(id, latency);
                ProbeReport {
                    name,
                    healthy: true,
                    latency_ms: Some(latency.as_millis() as u64),
                    error: None,
                }
            }
            Err(e) => {
                self.registry.mark_unhealthy(id);
                debug!(provider = %name, error = %e, "probe failed");
                ProbeReport {
                    name,
                    healthy: false,
                    latency_ms: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Probe every registered provider concurrently and apply the results.
    pub async fn run_sweep(&self) -> Vec<ProbeReport> {
        let reports = join_all(self.registry.ids().into_iter().map(|id| self.probe(id))).await;
        let healthy = reports.iter().filter(|r| r.healthy).count();
        info!(healthy, total = reports.len(), "provider health sweep complete");
        reports
    }
}

/// Periodic sweep loop. The first sweep runs one full interval after
/// startup; initial health comes from the connect attempt itself, and an
/// immediate sweep is always available on demand.
pub(crate) async fn run_periodic(checker: Arc<HealthChecker>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // consume the immediate first tick
    loop {
        ticker.tick().await;
        checker.run_sweep().await;
    }
}
