//! Connection supervisor: owns the single live connection.
//!
//! One coordinating task consumes typed messages — external commands,
//! socket events from the currently installed stream, and the reconnect
//! timer — so a close event can never race an in-flight connect attempt.
//! Socket events are only ever read from the *current* stream; when the
//! connection is replaced, the old stream's receiver is dropped and its
//! remaining events go nowhere.
//!
//! Reconnection policy: at most one pending timer. A fresh disconnect
//! while a timer is pending schedules nothing; a successful connect
//! clears the timer and resets the attempt counter; a failed scheduled
//! attempt backs off further until the attempt cap, which is terminal
//! until the process restarts.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use ledgerlink_core::error::{ConnectError, TransportError};
use ledgerlink_core::policy::ReconnectPolicy;
use ledgerlink_core::registry::{ProviderRegistry, ProviderSpec};
use ledgerlink_core::transport::{EventStream, LedgerConnector, QueryTransport, SocketEvent};
use ledgerlink_core::types::BlockSummary;
use ledgerlink_core::wire::methods;

use crate::multiplexer::SubscriptionMultiplexer;
use crate::state::{now_ms, ActiveConnection, Phase, SharedState};
use crate::ConnectionStats;

/// External requests to the coordinating task.
pub(crate) enum Command {
    Connect {
        reply: oneshot::Sender<Result<(), ConnectError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

enum Wake {
    Command(Option<Command>),
    Socket(Option<SocketEvent>),
    ReconnectDue,
}

pub(crate) struct Supervisor {
    registry: Arc<ProviderRegistry>,
    connector: Arc<dyn LedgerConnector>,
    state: SharedState,
    stats: Arc<ConnectionStats>,
    mux: Arc<SubscriptionMultiplexer>,
    policy: ReconnectPolicy,
    commands: mpsc::UnboundedReceiver<Command>,
    socket: Option<EventStream>,
    reconnect_at: Option<Instant>,
    gave_up: bool,
}

impl Supervisor {
    pub(crate) fn new(
        registry: Arc<ProviderRegistry>,
        connector: Arc<dyn LedgerConnector>,
        state: SharedState,
        stats: Arc<ConnectionStats>,
        mux: Arc<SubscriptionMultiplexer>,
        policy: ReconnectPolicy,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            registry,
            connector,
            state,
            stats,
            mux,
            policy,
            commands,
            socket: None,
            reconnect_at: None,
            gave_up: false,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                cmd = self.commands.recv() => Wake::Command(cmd),
                ev = Self::next_socket_event(&mut self.socket) => Wake::Socket(ev),
                () = Self::sleep_until_opt(self.reconnect_at) => Wake::ReconnectDue,
            };
            match wake {
                Wake::Command(None) | Wake::Command(Some(Command::Shutdown)) => {
                    self.close_connection("shutting down");
                    debug!("connection supervisor stopped");
                    return;
                }
                Wake::Command(Some(Command::Connect { reply })) => {
                    let result = self.connect().await;
                    if let Err(e) = &result {
                        warn!(error = %e, "connect failed; scheduling retry");
                        self.schedule_reconnect();
                    }
                    let _ = reply.send(result);
                }
                Wake::Command(Some(Command::Disconnect { reply })) => {
                    // Solicited: cancel any pending retry, close, stay down.
                    self.reconnect_at = None;
                    self.close_connection("disconnect requested");
                    let _ = reply.send(());
                }
                Wake::Socket(Some(SocketEvent::NewHead(summary))) => {
                    self.on_new_head(summary);
                }
                Wake::Socket(Some(SocketEvent::Closed { reason })) => {
                    self.on_socket_lost(&reason);
                }
                Wake::Socket(None) => {
                    self.on_socket_lost("event channel closed");
                }
                Wake::ReconnectDue => {
                    self.reconnect_at = None;
                    self.on_reconnect_due().await;
                }
            }
        }
    }

    async fn next_socket_event(socket: &mut Option<EventStream>) -> Option<SocketEvent> {
        match socket {
            Some(stream) => stream.events.recv().await,
            None => std::future::pending().await,
        }
    }

    async fn sleep_until_opt(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// Walk the healthy candidates in priority order and install the first
    /// provider that passes both the request-endpoint read and the
    /// event-stream open.
    async fn connect(&mut self) -> Result<(), ConnectError> {
        if self.state.lock().unwrap().phase == Phase::Connected {
            return Ok(());
        }
        self.state.lock().unwrap().phase = Phase::Connecting;

        let candidates = self.registry.healthy_in_priority_order();
        if candidates.is_empty() {
            self.state.lock().unwrap().phase = Phase::Disconnected;
            return Err(ConnectError::NoHealthyProvider);
        }

        let mut attempted = 0usize;
        for id in candidates {
            let spec = self.registry.spec(id).clone();
            attempted += 1;
            debug!(provider = %spec.name, priority = spec.priority, "trying candidate");
            match self.try_provider(&spec).await {
                Ok((transport, stream, latency)) => {
                    self.registry.mark_healthy(id, latency);
                    self.install(id, &spec, transport, stream);
                    info!(
                        provider = %spec.name,
                        latency_ms = latency.as_millis() as u64,
                        "connected"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(provider = %spec.name, error = %e, "candidate failed");
                    self.registry.mark_unhealthy(id);
                }
            }
        }

        self.state.lock().unwrap().phase = Phase::Disconnected;
        Err(ConnectError::AllProvidersFailed { attempted })
    }

    async fn try_provider(
        &self,
        spec: &ProviderSpec,
    ) -> Result<(Arc<dyn QueryTransport>, EventStream, Duration), TransportError> {
        let timeout_ms = spec.timeout.as_millis() as u64;
        let transport = self.connector.query_transport(spec).await?;

        let started = Instant::now();
        let _height: String = tokio::time::timeout(
            spec.timeout,
            transport.call(methods::current_height(1)),
        )
        .await
        .map_err(|_| TransportError::Timeout { ms: timeout_ms })??;
        let latency = started.elapsed();

        let stream = tokio::time::timeout(spec.timeout, self.connector.open_event_stream(spec))
            .await
            .map_err(|_| TransportError::Timeout { ms: timeout_ms })??;

        Ok((transport, stream, latency))
    }

    fn install(
        &mut self,
        id: ledgerlink_core::registry::ProviderId,
        spec: &ProviderSpec,
        transport: Arc<dyn QueryTransport>,
        stream: EventStream,
    ) {
        if let Some(mut old) = self.socket.take() {
            old.handle.close();
        }
        self.socket = Some(stream);
        // Successful connect supersedes any pending retry.
        self.reconnect_at = None;
        self.gave_up = false;

        let was_reconnect = {
            let mut state = self.state.lock().unwrap();
            let was_reconnect = state.reconnect_attempts > 0;
            state.phase = Phase::Connected;
            state.active = Some(ActiveConnection {
                id,
                name: spec.name.clone(),
                transport,
            });
            state.connected_at_ms = Some(now_ms());
            state.reconnect_attempts = 0;
            was_reconnect
        };
        if was_reconnect {
            self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_new_head(&mut self, summary: BlockSummary) {
        let transport = {
            let mut state = self.state.lock().unwrap();
            state.last_height = Some(summary.height);
            state.active.as_ref().map(|a| a.transport.clone())
        };
        if let Some(transport) = transport {
            self.mux.on_new_head(summary, transport);
        }
    }

    /// Unsolicited socket loss: demote the provider, go Disconnected, and
    /// hand recovery to the scheduler. Never retries in-line.
    fn on_socket_lost(&mut self, reason: &str) {
        self.socket = None;
        let lost = {
            let mut state = self.state.lock().unwrap();
            if state.phase != Phase::Connected {
                None
            } else {
                let lost = state.active.as_ref().map(|a| (a.id, a.name.clone()));
                state.phase = Phase::Disconnected;
                state.active = None;
                state.connected_at_ms = None;
                lost
            }
        };
        let Some((id, name)) = lost else {
            return;
        };
        self.stats.socket_drops.fetch_add(1, Ordering::Relaxed);
        self.registry.mark_unhealthy(id);
        warn!(provider = %name, reason, "connection lost");
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_at.is_some() || self.gave_up {
            return;
        }
        let attempts = self.state.lock().unwrap().reconnect_attempts;
        match self.policy.delay_before(attempts + 1) {
            None => {
                self.gave_up = true;
                error!(
                    error = %ConnectError::MaxReconnectAttemptsExceeded { attempts },
                    "standing down; operator intervention or restart required"
                );
            }
            Some(delay) => {
                self.state.lock().unwrap().reconnect_attempts = attempts + 1;
                self.reconnect_at = Some(Instant::now() + delay);
                info!(
                    attempt = attempts + 1,
                    max_attempts = self.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "reconnect scheduled"
                );
            }
        }
    }

    async fn on_reconnect_due(&mut self) {
        let attempt = self.state.lock().unwrap().reconnect_attempts;
        info!(attempt, "attempting reconnect");
        match self.connect().await {
            Ok(()) => {}
            // Same treatment as a fresh disconnect: back off further.
            Err(e) => {
                warn!(attempt, error = %e, "reconnect failed");
                self.schedule_reconnect();
            }
        }
    }

    /// Close the active connection cleanly. Idempotent.
    fn close_connection(&mut self, why: &str) {
        if let Some(mut stream) = self.socket.take() {
            stream.handle.close();
        }
        let was_connected = {
            let mut state = self.state.lock().unwrap();
            let was_connected = state.phase == Phase::Connected;
            state.phase = Phase::Disconnected;
            state.active = None;
            state.connected_at_ms = None;
            was_connected
        };
        if was_connected {
            info!(why, "disconnected");
        }
    }
}
