//! A configurable in-memory [`Backend`], behind the `test-support`
//! feature. Grounded on `pool/client_test.go`'s
//! `CreateTestClient`/`TestPoolKnobs`: a backend that sleeps within a
//! configurable range and fails at a configurable rate, letting scenario
//! tests exercise retry/timeout/concurrency/first-success behaviour
//! without a real beacon node.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use beacon_client::{Backend, BlockHeader, CallError, Result, Root, Slot, ValidatorIndex};

/// A [`Backend`] whose `beacon_block_header` sleeps within `[min_sleep,
/// max_sleep]` and fails with probability `error_rate`, counting every
/// call it receives. `mocks.Client` + `CreateTestClient`.
pub struct MockBackend {
    address: String,
    min_sleep: Duration,
    max_sleep: Duration,
    error_rate: f64,
    calls: AtomicUsize,
}

impl MockBackend {
    /// Build a mock backend at `address` that sleeps uniformly within
    /// `[min_sleep, max_sleep]` and fails `error_rate` of the time
    /// (`0.0` = never, `1.0` = always).
    #[must_use]
    pub fn new(address: impl Into<String>, min_sleep: Duration, max_sleep: Duration, error_rate: f64) -> Self {
        Self {
            address: address.into(),
            min_sleep,
            max_sleep,
            error_rate,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls this backend has received across every method.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn simulate(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.max_sleep > Duration::ZERO {
            let jitter = if self.max_sleep > self.min_sleep {
                rand::random_range(Duration::ZERO..=(self.max_sleep - self.min_sleep))
            } else {
                Duration::ZERO
            };
            tokio::time::sleep(self.min_sleep + jitter).await;
        }
        if rand::random::<f64>() < self.error_rate {
            return Err(CallError::transient("mock induced failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn beacon_block_header(&self, _block_id: &str) -> Result<BlockHeader> {
        self.simulate().await?;
        Ok(BlockHeader {
            root: Root::ZERO,
            slot: Slot(0),
            proposer_index: ValidatorIndex(0),
            parent_root: Root::ZERO,
            state_root: Root::ZERO,
        })
    }
}
