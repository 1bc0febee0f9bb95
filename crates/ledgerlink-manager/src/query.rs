//! Query facade: stateless point reads against the current connection.
//!
//! Inputs are validated before any network call; a disconnected manager
//! answers `NotConnected` immediately rather than hanging; absent results
//! become `NotFound`. No caching and no retries — the subscription path
//! self-heals through reconnection, point reads are the caller's to retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ledgerlink_core::error::{QueryError, TransportError};
use ledgerlink_core::transport::QueryTransport;
use ledgerlink_core::types::{is_hex_hash, parse_hex_u64, Block, Transaction, TransactionReceipt};
use ledgerlink_core::wire::methods;

use crate::state::{Phase, SharedState};

pub struct QueryFacade {
    state: SharedState,
    req_id: AtomicU64,
}

impl QueryFacade {
    pub(crate) fn new(state: SharedState) -> Self {
        Self {
            state,
            req_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.req_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Clone the active transport out of the state lock; the lock is never
    /// held across the request itself.
    fn active_transport(&self) -> Result<Arc<dyn QueryTransport>, QueryError> {
        let state = self.state.lock().unwrap();
        match (&state.phase, &state.active) {
            (Phase::Connected, Some(active)) => Ok(active.transport.clone()),
            _ => Err(QueryError::NotConnected),
        }
    }

    fn validate_hash(hash: &str) -> Result<(), QueryError> {
        if is_hex_hash(hash) {
            Ok(())
        } else {
            Err(QueryError::InvalidInput {
                reason: format!("malformed hash: {hash}"),
            })
        }
    }

    pub async fn transaction(&self, hash: &str) -> Result<Transaction, QueryError> {
        Self::validate_hash(hash)?;
        let transport = self.active_transport()?;
        let tx: Option<Transaction> = transport
            .call(methods::transaction_by_hash(self.next_id(), hash))
            .await?;
        tx.ok_or_else(|| QueryError::NotFound {
            what: format!("transaction {hash}"),
        })
    }

    pub async fn transaction_receipt(&self, hash: &str) -> Result<TransactionReceipt, QueryError> {
        Self::validate_hash(hash)?;
        let transport = self.active_transport()?;
        let receipt: Option<TransactionReceipt> = transport
            .call(methods::receipt_by_hash(self.next_id(), hash))
            .await?;
        receipt.ok_or_else(|| QueryError::NotFound {
            what: format!("receipt for {hash}"),
        })
    }

    pub async fn block_by_number(&self, number: u64) -> Result<Block, QueryError> {
        let transport = self.active_transport()?;
        let block: Option<Block> = transport
            .call(methods::block_by_number(self.next_id(), number))
            .await?;
        block.ok_or_else(|| QueryError::NotFound {
            what: format!("block {number}"),
        })
    }

    pub async fn current_height(&self) -> Result<u64, QueryError> {
        let transport = self.active_transport()?;
        let height: String = transport
            .call(methods::current_height(self.next_id()))
            .await?;
        parse_hex_u64(&height).map_err(|e| {
            QueryError::Transport(TransportError::Decode(format!("bad height quantity: {e}")))
        })
    }
}
