//! End-to-end failover behavior: priority selection, failure accounting,
//! the reconnect schedule, and status consistency.

mod common;

use common::*;

use ledgerlink_core::error::ConnectError;
use ledgerlink_manager::ConnectionStatus;
use std::time::Duration;

fn assert_consistent(status: &ConnectionStatus) {
    assert_eq!(
        status.is_connected,
        status.current_provider.is_some(),
        "connected flag and active provider disagree: {status:?}"
    );
}

fn provider_failures(status: &ConnectionStatus, name: &str) -> u32 {
    status
        .providers
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.health.consecutive_failures)
        .unwrap_or_else(|| panic!("provider {name} missing from status"))
}

#[tokio::test(start_paused = true)]
async fn connect_selects_first_healthy_by_priority() {
    let net = MockNet::new();
    net.set_requests_ok("alpha", false);
    let service = test_service(&net, &[("alpha", 1), ("beta", 2)]);

    service.start().await.unwrap();

    let status = service.connection_status();
    assert_consistent(&status);
    assert!(status.is_connected);
    assert_eq!(status.current_provider.as_deref(), Some("beta"));
    assert_eq!(provider_failures(&status, "alpha"), 1);
    assert_eq!(provider_failures(&status, "beta"), 0);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn probe_timeout_is_a_candidate_failure() {
    let net = MockNet::new();
    net.set_behavior(
        "alpha",
        Behavior {
            hang_requests: true,
            ..Behavior::default()
        },
    );
    let service = test_service(&net, &[("alpha", 1), ("beta", 2)]);

    service.start().await.unwrap();

    let status = service.connection_status();
    assert_eq!(status.current_provider.as_deref(), Some("beta"));
    assert_eq!(provider_failures(&status, "alpha"), 1);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn all_candidates_failing_is_reported_and_counted() {
    let net = MockNet::new();
    net.set_requests_ok("alpha", false);
    net.set_requests_ok("beta", false);
    let service = test_service(&net, &[("alpha", 1), ("beta", 2)]);

    let err = service.start().await.unwrap_err();
    assert!(matches!(err, ConnectError::AllProvidersFailed { attempted: 2 }));

    let status = service.connection_status();
    assert_consistent(&status);
    assert!(!status.is_connected);
    assert_eq!(provider_failures(&status, "alpha"), 1);
    assert_eq!(provider_failures(&status, "beta"), 1);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn empty_healthy_set_is_no_healthy_provider() {
    let net = MockNet::new();
    net.set_requests_ok("alpha", false);
    let service = test_service(&net, &[("alpha", 1)]);

    // First attempt tries (and demotes) the only candidate.
    let err = service.start().await.unwrap_err();
    assert!(matches!(err, ConnectError::AllProvidersFailed { attempted: 1 }));

    // Second attempt finds nothing healthy to try at all.
    let err = service.start().await.unwrap_err();
    assert!(matches!(err, ConnectError::NoHealthyProvider));

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unexpected_close_fails_over_and_resets_attempts() {
    let net = MockNet::new();
    let service = test_service(&net, &[("alpha", 1), ("beta", 2)]);

    service.start().await.unwrap();
    assert_eq!(
        service.connection_status().current_provider.as_deref(),
        Some("alpha")
    );

    // Alpha's socket dies and its endpoint goes dark.
    net.set_requests_ok("alpha", false);
    net.push_closed("connection reset").await;
    settle().await;

    let status = service.connection_status();
    assert_consistent(&status);
    assert!(!status.is_connected);
    assert_eq!(status.reconnect_attempts, 1);
    assert_eq!(status.stats.socket_drops, 1);

    // The retry fires ~5s later and lands on beta.
    tokio::time::sleep(Duration::from_millis(5_200)).await;
    settle().await;

    let status = service.connection_status();
    assert_consistent(&status);
    assert!(status.is_connected);
    assert_eq!(status.current_provider.as_deref(), Some("beta"));
    assert_eq!(status.reconnect_attempts, 0, "successful connect resets the counter");
    assert_eq!(status.stats.reconnects, 1);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_schedule_backs_off_and_caps() {
    let net = MockNet::new();
    let service = test_service(&net, &[("alpha", 1)]);

    service.start().await.unwrap();
    let probes_before = net.call_count("eth_blockNumber");

    net.set_requests_ok("alpha", false);
    net.push_closed("connection reset").await;
    settle().await;

    // Delays double from 5s: attempts fire at +5, +15, +35, +75, +155.
    let checkpoints: &[(u64, u32)] = &[
        (4_000, 1),   // timer still pending
        (2_000, 2),   // +6s: first retry failed, second scheduled
        (10_000, 3),  // +16s
        (20_000, 4),  // +36s
        (40_000, 5),  // +76s
        (80_000, 5),  // +156s: fifth retry failed, cap reached
        (400_000, 5), // long after: still standing down
    ];
    for (advance_ms, expected_attempts) in checkpoints {
        tokio::time::sleep(Duration::from_millis(*advance_ms)).await;
        settle().await;
        let status = service.connection_status();
        assert_consistent(&status);
        assert!(!status.is_connected);
        assert_eq!(
            status.reconnect_attempts, *expected_attempts,
            "attempt counter at +{advance_ms}ms"
        );
    }

    // Standing down means no in-line retries either: the dead provider was
    // never probed again (retries found no healthy candidate).
    assert_eq!(net.call_count("eth_blockNumber"), probes_before);
    assert_eq!(net.stream_count(), 1);

    // Operator intervention: bring the provider back, sweep, reconnect.
    net.set_requests_ok("alpha", true);
    let reports = service.perform_health_check().await;
    assert!(reports.iter().all(|r| r.healthy));
    service.start().await.unwrap();

    let status = service.connection_status();
    assert!(status.is_connected);
    assert_eq!(status.reconnect_attempts, 0);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn solicited_disconnect_does_not_reconnect() {
    let net = MockNet::new();
    let service = test_service(&net, &[("alpha", 1)]);

    service.start().await.unwrap();
    service.disconnect().await;
    // Idempotent: a second disconnect is a no-op.
    service.disconnect().await;

    let status = service.connection_status();
    assert_consistent(&status);
    assert!(!status.is_connected);
    assert_eq!(status.reconnect_attempts, 0);

    tokio::time::sleep(Duration::from_secs(600)).await;
    settle().await;
    assert!(!service.connection_status().is_connected);
    assert_eq!(net.stream_count(), 1, "no reconnect after a requested disconnect");

    // The service is still running; connecting again is allowed.
    service.start().await.unwrap();
    assert!(service.connection_status().is_connected);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent() {
    let net = MockNet::new();
    let service = test_service(&net, &[("alpha", 1)]);

    service.start().await.unwrap();
    service.shutdown().await;
    service.shutdown().await;

    let status = service.connection_status();
    assert_consistent(&status);
    assert!(!status.is_connected);

    // After shutdown the supervisor is gone for good.
    let err = service.start().await.unwrap_err();
    assert!(matches!(err, ConnectError::SupervisorGone));
}
