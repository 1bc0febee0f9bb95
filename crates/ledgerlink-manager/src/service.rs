//! The dependency-injected service facade.
//!
//! No global singleton: every `LedgerService` is explicitly constructed
//! with its registry and connector, so tests run several isolated
//! instances in one process. `start()` spawns the coordinating tasks;
//! `shutdown()` tears them down and is safe to call twice.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use ledgerlink_core::error::{ConfigError, ConnectError, QueryError};
use ledgerlink_core::policy::ReconnectPolicy;
use ledgerlink_core::registry::ProviderRegistry;
use ledgerlink_core::transport::LedgerConnector;
use ledgerlink_core::types::{Block, BlockSummary, Transaction, TransactionReceipt};

use crate::health::{self, HealthChecker, ProbeReport};
use crate::multiplexer::{
    self, AddressActivity, CallbackError, ScanJob, SubscriptionHandle, SubscriptionMultiplexer,
};
use crate::query::QueryFacade;
use crate::state::{ConnState, ConnectionStats, ConnectionStatus, Phase, SharedState};
use crate::supervisor::{Command, Supervisor};

/// Tunables for one service instance.
#[derive(Debug, Clone)]
pub struct LedgerServiceConfig {
    /// Period of the background health sweep.
    pub health_check_interval: Duration,
    /// Reconnect backoff parameters.
    pub reconnect: ReconnectPolicy,
}

impl Default for LedgerServiceConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// The connection manager's public face, as consumed by the gateway layer.
pub struct LedgerService {
    registry: Arc<ProviderRegistry>,
    connector: Arc<dyn LedgerConnector>,
    config: LedgerServiceConfig,
    state: SharedState,
    stats: Arc<ConnectionStats>,
    mux: Arc<SubscriptionMultiplexer>,
    query: QueryFacade,
    health: Arc<HealthChecker>,
    commands: mpsc::UnboundedSender<Command>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    scan_rx: Mutex<Option<mpsc::UnboundedReceiver<ScanJob>>>,
    supervisor_task: Mutex<Option<JoinHandle<()>>>,
    aux_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LedgerService {
    /// Build a service over an already-populated registry. An empty
    /// registry is a configuration error: resolution (including the public
    /// fallback) happens before this point.
    pub fn new(
        registry: ProviderRegistry,
        connector: Arc<dyn LedgerConnector>,
        config: LedgerServiceConfig,
    ) -> Result<Self, ConfigError> {
        if registry.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        let registry = Arc::new(registry);
        let state: SharedState = Arc::new(Mutex::new(ConnState::new()));
        let stats = Arc::new(ConnectionStats::default());
        let (mux, scan_rx) = SubscriptionMultiplexer::new(stats.clone());
        let query = QueryFacade::new(state.clone());
        let health = Arc::new(HealthChecker::new(registry.clone(), connector.clone()));
        let (commands, command_rx) = mpsc::unbounded_channel();

        Ok(Self {
            registry,
            connector,
            config,
            state,
            stats,
            mux,
            query,
            health,
            commands,
            command_rx: Mutex::new(Some(command_rx)),
            scan_rx: Mutex::new(Some(scan_rx)),
            supervisor_task: Mutex::new(None),
            aux_tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the coordinating tasks (first call only) and issue a connect.
    ///
    /// An `Err` means the first attempt failed; the service keeps running
    /// with a backoff retry scheduled, so callers may treat the error as
    /// advisory. Calling `start()` again after the manager stood down
    /// re-triggers a connection attempt.
    pub async fn start(&self) -> Result<(), ConnectError> {
        if let Some(command_rx) = self.command_rx.lock().unwrap().take() {
            let supervisor = Supervisor::new(
                self.registry.clone(),
                self.connector.clone(),
                self.state.clone(),
                self.stats.clone(),
                self.mux.clone(),
                self.config.reconnect.clone(),
                command_rx,
            );
            *self.supervisor_task.lock().unwrap() = Some(tokio::spawn(supervisor.run()));

            let mut aux = self.aux_tasks.lock().unwrap();
            if let Some(scan_rx) = self.scan_rx.lock().unwrap().take() {
                aux.push(tokio::spawn(multiplexer::run_worker(self.mux.clone(), scan_rx)));
            }
            aux.push(tokio::spawn(health::run_periodic(
                self.health.clone(),
                self.config.health_check_interval,
            )));
        }

        let (reply, result) = oneshot::channel();
        self.commands
            .send(Command::Connect { reply })
            .map_err(|_| ConnectError::SupervisorGone)?;
        result.await.map_err(|_| ConnectError::SupervisorGone)?
    }

    /// Gracefully close the active connection and stay disconnected.
    /// Idempotent: disconnecting twice is a no-op the second time.
    pub async fn disconnect(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Disconnect { reply }).is_ok() {
            let _ = done.await;
        }
    }

    /// Stop all tasks and close the connection. Idempotent; the process
    /// termination hook.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        let supervisor = self.supervisor_task.lock().unwrap().take();
        if let Some(task) = supervisor {
            let _ = task.await;
        }
        let aux: Vec<JoinHandle<()>> = self.aux_tasks.lock().unwrap().drain(..).collect();
        for task in aux {
            task.abort();
        }
    }

    /// Pure read of current in-memory state; never probes.
    pub fn connection_status(&self) -> ConnectionStatus {
        let (is_connected, current_provider, last_height, connected_at_ms, reconnect_attempts) = {
            let state = self.state.lock().unwrap();
            (
                state.phase == Phase::Connected,
                state.active.as_ref().map(|a| a.name.clone()),
                state.last_height,
                state.connected_at_ms,
                state.reconnect_attempts,
            )
        };
        ConnectionStatus {
            is_connected,
            current_provider,
            last_height,
            connected_at_ms,
            reconnect_attempts,
            providers: self.registry.snapshot(),
            stats: self.stats.snapshot(),
        }
    }

    /// Immediate out-of-band probe sweep, in addition to the periodic one.
    pub async fn perform_health_check(&self) -> Vec<ProbeReport> {
        self.health.run_sweep().await
    }

    pub async fn transaction(&self, hash: &str) -> Result<Transaction, QueryError> {
        self.query.transaction(hash).await
    }

    pub async fn transaction_receipt(&self, hash: &str) -> Result<TransactionReceipt, QueryError> {
        self.query.transaction_receipt(hash).await
    }

    pub async fn block_by_number(&self, number: u64) -> Result<Block, QueryError> {
        self.query.block_by_number(number).await
    }

    pub async fn current_height(&self) -> Result<u64, QueryError> {
        self.query.current_height().await
    }

    pub fn subscribe_blocks<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&BlockSummary) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.mux.subscribe_blocks(callback)
    }

    pub fn subscribe_address<F>(
        &self,
        address: &str,
        callback: F,
    ) -> Result<SubscriptionHandle, QueryError>
    where
        F: Fn(&AddressActivity) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.mux.subscribe_address(address, callback)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.mux.unsubscribe(handle)
    }
}
