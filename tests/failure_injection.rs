//! Failure injection tests for the resilient client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resilient_client::net::CallError;
use resilient_client::{CircuitState, Client, ClientError, ConnectionState};
use tonic::Code;

mod common;

use common::{fast_config, MockTransport};

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

#[tokio::test(start_paused = true)]
async fn test_initial_connect_failure_is_fail_fast() {
    let transport = MockTransport::healthy();
    transport.refuse_dials(true);

    let mut config = fast_config();
    config.server.address = "127.0.0.1:59999".into();

    let err = match Client::with_transport(config, transport.clone()).await {
        Ok(_) => panic!("client should not be constructed"),
        Err(e) => e,
    };
    match err {
        ClientError::Connect { address, .. } => assert_eq!(address, "127.0.0.1:59999"),
        other => panic!("unexpected error: {other}"),
    }

    tokio::time::sleep(secs(5.0)).await;
    assert_eq!(transport.dial_count(), 1, "no loops may run after a failed start");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_under_sustained_failures() {
    let transport = MockTransport::programmable(|_, _| async { Err(CallError::transient("unavailable")) });
    let client = Client::with_transport(fast_config(), transport.clone()).await.unwrap();

    tokio::time::sleep(secs(5.5)).await;
    assert_eq!(client.circuit_state(), CircuitState::Open);
    let snapshot = client.metrics();
    assert_eq!(snapshot.failed_requests, 5);
    assert_eq!(snapshot.circuit_breaker_state, "OPEN");

    // Open: cycles are skipped without touching the server or the counters.
    tokio::time::sleep(secs(10.0)).await;
    assert_eq!(transport.call_count(), 5);
    assert_eq!(client.metrics().total_requests, 5);

    assert!(client.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_recovers_after_open_duration() {
    let failing = Arc::new(AtomicBool::new(true));
    let flag = failing.clone();
    let transport = MockTransport::programmable(move |_, _| {
        let failing = flag.load(Ordering::SeqCst);
        async move {
            if failing {
                Err(CallError::transient("unavailable"))
            } else {
                Ok("Hello".to_string())
            }
        }
    });
    let client = Client::with_transport(fast_config(), transport.clone()).await.unwrap();

    tokio::time::sleep(secs(5.5)).await;
    assert_eq!(client.circuit_state(), CircuitState::Open);
    failing.store(false, Ordering::SeqCst);

    tokio::time::sleep(secs(35.0)).await;
    assert_eq!(client.circuit_state(), CircuitState::Closed);
    let snapshot = client.metrics();
    assert_eq!(snapshot.failed_requests, 5);
    assert!(snapshot.successful_requests >= 3);
    assert_eq!(snapshot.circuit_breaker_state, "CLOSED");

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_exhaustion_is_recorded_once() {
    let transport = MockTransport::programmable(|_, _| async { Err(CallError::transient("connection reset")) });
    let mut config = fast_config();
    config.requests.interval_secs = 3600;
    config.health_check.keep_alive_secs = 5;

    let client = Client::with_transport(config, transport.clone()).await.unwrap();
    transport.refuse_dials(true);

    // Probe fails at 5s; five dials with 1+2+5+10s of backoff end at 23s.
    tokio::time::sleep(secs(24.0)).await;

    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.reconnect_exhausted_count(), 1);
    // One initial dial plus five reconnect attempts; the health loop may
    // already have started the next sequence.
    assert!(transport.dial_count() >= 6);
    assert_eq!(client.metrics().reconnect_count, 0);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_health_checker_heals_after_outage() {
    let down = Arc::new(AtomicBool::new(true));
    let flag = down.clone();
    let transport = MockTransport::programmable(move |_, _| {
        let down = flag.load(Ordering::SeqCst);
        async move {
            if down {
                Err(CallError::transient("connection reset"))
            } else {
                Ok("Hello".to_string())
            }
        }
    });
    let mut config = fast_config();
    config.requests.interval_secs = 3600;
    config.health_check.keep_alive_secs = 5;

    let client = Client::with_transport(config, transport.clone()).await.unwrap();
    transport.refuse_dials(true);

    tokio::time::sleep(secs(10.0)).await;
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.metrics().reconnect_count, 0);

    transport.refuse_dials(false);
    down.store(false, Ordering::SeqCst);

    // Reconnect attempts run at 5, 6, 8 and 13 seconds.
    tokio::time::sleep(secs(4.0)).await;
    assert_eq!(client.connection_state(), ConnectionState::Connected);
    assert_eq!(client.metrics().reconnect_count, 1);
    assert_eq!(client.reconnect_exhausted_count(), 0);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_shutdown_tears_down_once() {
    let transport = MockTransport::healthy();
    let client = Arc::new(Client::with_transport(fast_config(), transport.clone()).await.unwrap());

    tokio::time::sleep(secs(2.5)).await;

    let a = tokio::spawn({
        let client = client.clone();
        async move { client.shutdown().await }
    });
    let b = tokio::spawn({
        let client = client.clone();
        async move { client.shutdown().await }
    });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert!(a ^ b, "exactly one caller performs the teardown");
    client.closed().await;
    assert_eq!(transport.released_count(), 1);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert!(!client.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_retry_backoff() {
    let transport = MockTransport::programmable(|_, _| async { Err(CallError::transient("unavailable")) });
    let mut config = fast_config();
    config.requests.max_retries = 3;

    let client = Client::with_transport(config, transport.clone()).await.unwrap();

    // First attempt at 1s, then a 1s backoff before the retry.
    tokio::time::sleep(secs(1.5)).await;
    let started = tokio::time::Instant::now();
    assert!(client.shutdown().await);

    assert!(started.elapsed() < secs(0.5));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_errors_are_not_retried() {
    let transport = MockTransport::programmable(|_, _| async {
        Err(CallError::Fatal {
            code: Code::InvalidArgument,
            message: "name rejected".into(),
        })
    });
    let mut config = fast_config();
    config.requests.max_retries = 3;

    let client = Client::with_transport(config, transport.clone()).await.unwrap();
    tokio::time::sleep(secs(1.5)).await;

    assert_eq!(transport.call_count(), 1);
    assert_eq!(client.metrics().failed_requests, 1);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_success_rate_reflects_outcomes() {
    let transport = MockTransport::programmable(|n, _| async move {
        if n == 4 {
            Err(CallError::transient("unavailable"))
        } else {
            Ok("Hello".to_string())
        }
    });
    let client = Client::with_transport(fast_config(), transport.clone()).await.unwrap();

    tokio::time::sleep(secs(4.5)).await;
    let snapshot = client.metrics();
    assert_eq!(snapshot.total_requests, 4);
    assert_eq!(snapshot.successful_requests, 3);
    assert_eq!(snapshot.failed_requests, 1);
    assert_eq!(snapshot.success_rate, 75.0);
    assert!(snapshot.last_request_timestamp.is_some());

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_request_ids_are_attached_and_unique() {
    let transport = MockTransport::healthy();
    let client = Client::with_transport(fast_config(), transport.clone()).await.unwrap();

    tokio::time::sleep(secs(3.5)).await;
    client.shutdown().await;

    let ids: Vec<String> = transport
        .seen_calls()
        .into_iter()
        .map(|call| call.request_id.expect("request id attached"))
        .collect();
    assert_eq!(ids.len(), 3);
    let unique: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 3);
    assert!(transport.seen_calls().iter().all(|c| c.name.starts_with("client-")));
}

#[tokio::test(start_paused = true)]
async fn test_request_ids_can_be_disabled() {
    let transport = MockTransport::healthy();
    let mut config = fast_config();
    config.requests.generate_request_id = false;

    let client = Client::with_transport(config, transport.clone()).await.unwrap();
    tokio::time::sleep(secs(2.5)).await;
    client.shutdown().await;

    let calls = transport.seen_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.request_id.is_none()));
}
