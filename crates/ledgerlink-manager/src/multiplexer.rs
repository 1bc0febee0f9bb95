//! Subscription multiplexer: fans new-block and address-transaction events
//! out to registered callbacks, exactly once per matching event, no matter
//! how many times the underlying connection has been replaced.
//!
//! Registration is durable: it is plain bookkeeping here, independent of
//! any socket. The supervisor feeds head events from whichever socket is
//! currently live, so surviving a failover requires no re-arming work from
//! subscribers.
//!
//! Address watching uses block-scanning (not every provider offers a
//! native per-address push stream): one full-block fetch per head, then a
//! membership check of each transaction's `from` and `to` against the
//! watched set. The two sides are evaluated separately — sender watchers
//! and recipient watchers are independent audiences.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use ledgerlink_core::error::QueryError;
use ledgerlink_core::transport::QueryTransport;
use ledgerlink_core::types::{normalize_address, Block, BlockSummary, Transaction};
use ledgerlink_core::wire::methods;

use crate::state::ConnectionStats;

/// Error type subscriber callbacks may return; failures are logged and
/// isolated, never propagated.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

type BlockCallback = Arc<dyn Fn(&BlockSummary) -> Result<(), CallbackError> + Send + Sync>;
type AddressCallback = Arc<dyn Fn(&AddressActivity) -> Result<(), CallbackError> + Send + Sync>;

/// Which side of a transaction matched the watched address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sender,
    Recipient,
}

/// A watched-address hit delivered to address subscribers.
#[derive(Debug, Clone)]
pub struct AddressActivity {
    /// The watched address (normalized lower-case).
    pub address: String,
    pub direction: Direction,
    pub transaction: Transaction,
    pub block: BlockSummary,
}

/// Opaque cancellation token returned by the subscribe calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

enum SubKind {
    Block,
    Address(String),
}

#[derive(Default)]
struct MuxState {
    next_handle: u64,
    kinds: HashMap<u64, SubKind>,
    blocks: HashMap<u64, BlockCallback>,
    /// address → handle → callback. An address with no callbacks is
    /// removed so the scanner can skip the block fetch entirely.
    addresses: HashMap<String, HashMap<u64, AddressCallback>>,
}

/// One head event queued for delivery, paired with the transport that was
/// active when it arrived (so the scan reads from the same provider).
pub(crate) struct ScanJob {
    pub summary: BlockSummary,
    pub transport: Arc<dyn QueryTransport>,
}

pub struct SubscriptionMultiplexer {
    state: Mutex<MuxState>,
    jobs: mpsc::UnboundedSender<ScanJob>,
    stats: Arc<ConnectionStats>,
    req_id: AtomicU64,
}

impl SubscriptionMultiplexer {
    pub(crate) fn new(
        stats: Arc<ConnectionStats>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ScanJob>) {
        let (jobs, rx) = mpsc::unbounded_channel();
        let mux = Arc::new(Self {
            state: Mutex::new(MuxState::default()),
            jobs,
            stats,
            req_id: AtomicU64::new(1),
        });
        (mux, rx)
    }

    /// Register a callback for every new block. Takes effect immediately
    /// if connected, otherwise from the next successful connect.
    pub fn subscribe_blocks<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&BlockSummary) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        let mut state = self.state.lock().unwrap();
        let handle = state.next_handle;
        state.next_handle += 1;
        state.kinds.insert(handle, SubKind::Block);
        state.blocks.insert(handle, Arc::new(callback));
        SubscriptionHandle(handle)
    }

    /// Register a callback for transactions touching `address`
    /// (case-insensitive). Multiple independent callers may watch the same
    /// address.
    pub fn subscribe_address<F>(
        &self,
        address: &str,
        callback: F,
    ) -> Result<SubscriptionHandle, QueryError>
    where
        F: Fn(&AddressActivity) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        let normalized = normalize_address(address).ok_or_else(|| QueryError::InvalidInput {
            reason: format!("malformed address: {address}"),
        })?;
        let mut state = self.state.lock().unwrap();
        let handle = state.next_handle;
        state.next_handle += 1;
        state.kinds.insert(handle, SubKind::Address(normalized.clone()));
        state
            .addresses
            .entry(normalized)
            .or_default()
            .insert(handle, Arc::new(callback));
        Ok(SubscriptionHandle(handle))
    }

    /// Cancel a subscription. Returns `false` for an unknown handle.
    /// Removing the last callback for an address stops scanning for it.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.kinds.remove(&handle.0) {
            None => false,
            Some(SubKind::Block) => state.blocks.remove(&handle.0).is_some(),
            Some(SubKind::Address(addr)) => {
                let Some(callbacks) = state.addresses.get_mut(&addr) else {
                    return false;
                };
                let removed = callbacks.remove(&handle.0).is_some();
                if callbacks.is_empty() {
                    state.addresses.remove(&addr);
                }
                removed
            }
        }
    }

    /// Addresses currently being scanned for.
    pub fn watched_addresses(&self) -> Vec<String> {
        self.state.lock().unwrap().addresses.keys().cloned().collect()
    }

    /// Number of live subscriptions of both kinds.
    pub fn subscription_count(&self) -> usize {
        self.state.lock().unwrap().kinds.len()
    }

    /// Called by the supervisor for every head event from the live socket.
    pub(crate) fn on_new_head(&self, summary: BlockSummary, transport: Arc<dyn QueryTransport>) {
        self.stats.blocks_seen.fetch_add(1, Ordering::Relaxed);
        if self.jobs.send(ScanJob { summary, transport }).is_err() {
            warn!("delivery worker is gone; dropping head event");
        }
    }

    /// Deliver the block summary to all block subscribers. Callbacks are
    /// cloned out first so user code never runs under the lock.
    fn deliver_block(&self, summary: &BlockSummary) {
        let callbacks: Vec<(u64, BlockCallback)> = {
            let state = self.state.lock().unwrap();
            state.blocks.iter().map(|(h, cb)| (*h, cb.clone())).collect()
        };
        for (handle, callback) in callbacks {
            if let Err(e) = callback(summary) {
                self.stats.callback_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subscription = handle,
                    height = summary.height,
                    error = %e,
                    "block subscriber failed"
                );
            }
        }
    }

    /// Scan one block's transactions against the watched-address set.
    async fn scan_addresses(&self, job: &ScanJob) {
        let watched: HashMap<String, Vec<(u64, AddressCallback)>> = {
            let state = self.state.lock().unwrap();
            state
                .addresses
                .iter()
                .map(|(addr, cbs)| {
                    (
                        addr.clone(),
                        cbs.iter().map(|(h, cb)| (*h, cb.clone())).collect(),
                    )
                })
                .collect()
        };
        if watched.is_empty() {
            return;
        }

        let req = methods::block_by_number(
            self.req_id.fetch_add(1, Ordering::Relaxed),
            job.summary.height,
        );
        let block: Option<Block> = match job.transport.call(req).await {
            Ok(block) => block,
            Err(e) => {
                warn!(height = job.summary.height, error = %e, "block fetch for address scan failed");
                return;
            }
        };
        let Some(block) = block else {
            debug!(height = job.summary.height, "block not yet available for address scan");
            return;
        };

        for tx in &block.transactions {
            self.notify_side(&watched, &tx.from, Direction::Sender, tx, &job.summary);
            if let Some(to) = &tx.to {
                self.notify_side(&watched, to, Direction::Recipient, tx, &job.summary);
            }
        }
    }

    fn notify_side(
        &self,
        watched: &HashMap<String, Vec<(u64, AddressCallback)>>,
        address: &str,
        direction: Direction,
        tx: &Transaction,
        block: &BlockSummary,
    ) {
        let normalized = address.to_ascii_lowercase();
        let Some(callbacks) = watched.get(&normalized) else {
            return;
        };
        let activity = AddressActivity {
            address: normalized,
            direction,
            transaction: tx.clone(),
            block: block.clone(),
        };
        for (handle, callback) in callbacks {
            self.stats.address_matches.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = callback(&activity) {
                self.stats.callback_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subscription = handle,
                    address = %activity.address,
                    tx = %tx.hash,
                    error = %e,
                    "address subscriber failed"
                );
            }
        }
    }
}

/// Delivery worker: consumes head events in arrival order so block
/// callbacks and per-block scans happen in provider emission order.
pub(crate) async fn run_worker(
    mux: Arc<SubscriptionMultiplexer>,
    mut jobs: mpsc::UnboundedReceiver<ScanJob>,
) {
    while let Some(job) = jobs.recv().await {
        mux.deliver_block(&job.summary);
        mux.scan_addresses(&job).await;
    }
}
