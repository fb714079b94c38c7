//! Cross-module scenario tests from `spec.md` §8 (S1–S3, S6), exercised
//! through the public [`beacon_pool::Client`] facade rather than the
//! internal `call::call` function directly.

#![cfg(feature = "test-support")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_client::{Backend, Event};
use beacon_pool::mock::MockBackend;
use beacon_pool::{Client, ScopeOverride};
use beacon_pool::scope::{retry_every_limit, select_all};
use tokio_util::sync::CancellationToken;

/// S1 — all-success, first-success pool: exactly one attempt wins and the
/// call returns promptly.
#[tokio::test]
async fn s1_all_success_first_success_returns_ok() {
    let backends: Vec<Arc<dyn Backend>> = (0..3)
        .map(|i| {
            Arc::new(MockBackend::new(
                format!("backend-{i}"),
                Duration::from_millis(10),
                Duration::from_millis(10),
                0.0,
            )) as Arc<dyn Backend>
        })
        .collect();

    let client = Client::new(backends).with([
        ScopeOverride::Select(select_all()),
        ScopeOverride::Concurrency(3),
    ]);

    let result = client
        .call(|backend| async move { backend.beacon_block_header("32").await.map(|_| ()) })
        .await;
    assert!(result.is_ok());
}

/// S2 — all-fail exhaustion: retry limit 3 (4 attempts) * 3 backends = 12
/// `CallLog`s in the resulting `PoolError`.
#[tokio::test]
async fn s2_all_fail_exhaustion_trace_length() {
    let backends: Vec<Arc<dyn Backend>> = (0..3)
        .map(|i| {
            Arc::new(MockBackend::new(format!("backend-{i}"), Duration::ZERO, Duration::ZERO, 1.0))
                as Arc<dyn Backend>
        })
        .collect();

    let client = Client::new(backends).with([
        ScopeOverride::Select(select_all()),
        ScopeOverride::Concurrency(3),
        ScopeOverride::Retry(retry_every_limit(Duration::from_millis(1), 3)),
    ]);

    let result = client
        .call(|backend| async move { backend.beacon_block_header("32").await.map(|_| ()) })
        .await;

    match result {
        Err(beacon_pool::EngineError::Pool(err)) => assert_eq!(err.trace.len(), 12),
        other => panic!("expected PoolError, got {other:?}"),
    }
}

/// S3 — broadcast override: 32 backends, first-success + concurrency 1
/// overridden to broadcast; every backend is invoked at least once.
#[tokio::test]
async fn s3_broadcast_calls_every_selected_backend() {
    let backends: Vec<Arc<dyn Backend>> = (0..32)
        .map(|i| {
            Arc::new(MockBackend::new(format!("backend-{i}"), Duration::ZERO, Duration::ZERO, 0.0))
                as Arc<dyn Backend>
        })
        .collect();

    let client = Client::new(backends.clone()).with([
        ScopeOverride::Select(select_all()),
        ScopeOverride::Concurrency(1),
        ScopeOverride::FirstSuccess(false),
    ]);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let result = client
        .call(move |backend| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                backend.beacon_block_header("32").await.map(|_| ())
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 32);
}

struct StreamingBackend {
    address: String,
    starts: Arc<AtomicUsize>,
}

#[async_trait]
impl Backend for StreamingBackend {
    fn name(&self) -> &str {
        "streaming"
    }
    fn address(&self) -> &str {
        &self.address
    }
    fn events_capability(&self) -> bool {
        true
    }
    async fn events(
        &self,
        _topics: &[String],
        cancel: CancellationToken,
        _handler: Arc<dyn Fn(Event) + Send + Sync>,
    ) -> beacon_client::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        cancel.cancelled().await;
        Ok(())
    }
}

/// S6 — subscription reconciliation: pool {A,B} subscribes to "block",
/// pool updates to {B,C}: A's stream is cancelled, C starts a new stream,
/// B's existing stream is undisturbed.
#[tokio::test]
async fn s6_subscription_reconciliation_across_backend_set_changes() {
    let starts_a = Arc::new(AtomicUsize::new(0));
    let starts_b = Arc::new(AtomicUsize::new(0));
    let starts_c = Arc::new(AtomicUsize::new(0));

    let a: Arc<dyn Backend> = Arc::new(StreamingBackend { address: "a".into(), starts: starts_a.clone() });
    let b: Arc<dyn Backend> = Arc::new(StreamingBackend { address: "b".into(), starts: starts_b.clone() });
    let c: Arc<dyn Backend> = Arc::new(StreamingBackend { address: "c".into(), starts: starts_c.clone() });

    let client = Client::new(vec![a, b.clone()]);
    client.subscribe(vec!["block".into()], Arc::new(|_, _| {})).await;
    tokio::task::yield_now().await;
    assert_eq!(starts_a.load(Ordering::SeqCst), 1);
    assert_eq!(starts_b.load(Ordering::SeqCst), 1);

    client.set_clients(vec![b, c]).await;
    tokio::task::yield_now().await;

    assert_eq!(starts_c.load(Ordering::SeqCst), 1, "C should have started a fresh stream");
    assert_eq!(starts_b.load(Ordering::SeqCst), 1, "B's stream should be undisturbed, not restarted");

    client.close();
}
