//! End-to-end scenarios against a mock downstream.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use guarded_caller::http::{CALL_ATTEMPTS_HEADER, FALLBACK_HEADER};
use guarded_caller::resilience::CircuitState;

mod common;

fn header(res: &reqwest::Response, name: &str) -> Option<String> {
    res.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

#[tokio::test]
async fn test_immediate_response_passes_through() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let backend = common::start_programmable_backend(move || {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            (200, "Hello from Service B!".into())
        }
    })
    .await;

    let caller = common::start_caller(common::config_for(backend)).await;
    let res = common::client().get(caller.call_url()).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(header(&res, FALLBACK_HEADER), None);
    assert_eq!(header(&res, CALL_ATTEMPTS_HEADER).as_deref(), Some("1"));
    assert!(header(&res, "x-request-id").is_some());
    assert_eq!(res.text().await.unwrap(), "Hello from Service B!");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_downstream_exhausts_retries_into_fallback() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let backend = common::start_programmable_backend(move || {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(2)).await;
            (200, "Hello from Service B (after a delay)!".into())
        }
    })
    .await;

    let caller = common::start_caller(common::config_for(backend)).await;
    let res = common::client().get(caller.call_url()).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(header(&res, FALLBACK_HEADER).as_deref(), Some("timeout"));
    assert_eq!(header(&res, CALL_ATTEMPTS_HEADER).as_deref(), Some("3"));
    let body = res.text().await.unwrap();
    assert!(body.contains("service-b is currently unavailable"), "{body}");
    assert!(body.contains("timed out"), "{body}");

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    let snapshot = &caller.registry.snapshots()[0];
    assert_eq!(snapshot.circuit.failures, 3);
    assert_eq!(snapshot.circuit.state, CircuitState::Closed);
}

#[tokio::test]
async fn test_open_circuit_falls_back_without_network() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let backend = common::start_programmable_backend(move || {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            (500, "boom".into())
        }
    })
    .await;

    let mut config = common::config_for(backend);
    config.timeouts.attempt_ms = 2000;
    config.circuit_breaker.sliding_window_size = 2;
    config.circuit_breaker.minimum_calls = 2;
    config.circuit_breaker.wait_duration_in_open_ms = 60_000;
    let caller = common::start_caller(config).await;
    let client = common::client();

    for _ in 0..2 {
        let res = client.get(caller.call_url()).send().await.unwrap();
        assert_eq!(header(&res, FALLBACK_HEADER).as_deref(), Some("application_error"));
        assert_eq!(header(&res, CALL_ATTEMPTS_HEADER).as_deref(), Some("1"));
    }
    assert_eq!(caller.registry.snapshots()[0].circuit.state, CircuitState::Open);

    let start = Instant::now();
    let res = client.get(caller.call_url()).send().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(header(&res, FALLBACK_HEADER).as_deref(), Some("circuit_open"));
    assert!(res.text().await.unwrap().contains("circuit open"));
    assert_eq!(hits.load(Ordering::SeqCst), 2, "no request may reach the downstream");
    assert!(elapsed < Duration::from_millis(1000), "took {elapsed:?}");
}

#[tokio::test]
async fn test_connection_refused_is_retried() {
    let backend = common::closed_port().await;
    let caller = common::start_caller(common::config_for(backend)).await;

    let res = common::client().get(caller.call_url()).send().await.unwrap();

    assert_eq!(header(&res, FALLBACK_HEADER).as_deref(), Some("transport_failure"));
    assert_eq!(header(&res, CALL_ATTEMPTS_HEADER).as_deref(), Some("3"));
    assert!(res.text().await.unwrap().contains("connection failed"));
}

#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let backend = common::start_programmable_backend(move || {
        let h = h.clone();
        async move {
            if h.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            (200, "Hello from Service B!".into())
        }
    })
    .await;

    let caller = common::start_caller(common::config_for(backend)).await;
    let res = common::client().get(caller.call_url()).send().await.unwrap();

    assert_eq!(header(&res, FALLBACK_HEADER), None);
    assert_eq!(header(&res, CALL_ATTEMPTS_HEADER).as_deref(), Some("2"));
    assert_eq!(res.text().await.unwrap(), "Hello from Service B!");
}

#[tokio::test]
async fn test_greeting_and_health() {
    let backend = common::closed_port().await;
    let caller = common::start_caller(common::config_for(backend)).await;
    let client = common::client();

    let hello = client.get(caller.url("/service-a/hello")).send().await.unwrap();
    assert_eq!(hello.text().await.unwrap(), "Hello from Service A!");

    let health = client.get(caller.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
}
