//! [`Client`]: the pool-level facade composing the registry, scope, call
//! engine and subscription manager, grounded on `pool/client.go`'s
//! `Client`/`state`.
//!
//! This is the shared-state handle that `beacon-multi`'s protocol overlay
//! wraps to add the read/write RPC surface and best-attestation-data
//! selection. `beacon-pool::Client` itself only knows about replicated
//! calls and subscriptions — it has no notion of beacon-API semantics.

use std::sync::Arc;

use beacon_client::{Backend, CallError, Event};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::call::{self, EngineError};
use crate::scope::{Scope, ScopeOverride};
use crate::subscription::{EventHandler, SubscriptionManager};

/// Shared, `Arc`-held state behind every [`Client`] derived via
/// [`Client::with`] from one another — the direct analogue of the Go
/// source's `state` struct, which a pointer is shared for between `Client`
/// copies (`spec.md` §3: "The backend registry, the subscription manager,
/// and the block-root-slot index are *shared* across all Scope copies of
/// one Client").
struct Shared {
    clients: RwLock<Vec<Arc<dyn Backend>>>,
    subscriptions: SubscriptionManager,
    cancel: CancellationToken,
}

/// A replicating call engine client over a fixed-but-swappable set of
/// [`Backend`]s, carrying an owned [`Scope`] and sharing registry/
/// subscription state with every `Client` it was derived from via
/// [`Client::with`].
///
/// `Clone` is cheap: the `Arc<Shared>` is shared, and `Scope` itself holds
/// no interior mutability.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
    scope: Scope,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("scope", &self.scope).finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client directly from an already-connected backend set,
    /// bypassing [`crate::registry::BackendRegistry`] entirely — the
    /// simpler bulk-swap entry point `spec.md` §4.B describes for callers
    /// who resolved their own connections. `pool.New`.
    #[must_use]
    pub fn new(clients: Vec<Arc<dyn Backend>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                clients: RwLock::new(clients),
                subscriptions: SubscriptionManager::new(),
                cancel: CancellationToken::new(),
            }),
            scope: Scope::default(),
        }
    }

    /// The current [`Scope`] this client applies to calls.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Number of backends currently in the pool. `pool.Client.Size`.
    pub async fn size(&self) -> usize {
        self.shared.clients.read().await.len()
    }

    /// Defensive snapshot of the current backend set. `pool.Client.Clients`.
    pub async fn clients(&self) -> Vec<Arc<dyn Backend>> {
        self.shared.clients.read().await.clone()
    }

    /// Swap the backend set wholesale and reconcile subscriptions against
    /// it. Ongoing calls are unaffected; only calls started after this
    /// returns observe the new set. `pool.Client.SetClients`.
    pub async fn set_clients(&self, clients: Vec<Arc<dyn Backend>>) {
        {
            let mut guard = self.shared.clients.write().await;
            *guard = clients;
        }
        let snapshot = self.shared.clients.read().await.clone();
        self.shared.subscriptions.reconcile(&snapshot).await;
    }

    /// A copy of this client sharing all state but owning a freshly
    /// derived [`Scope`] (`spec.md` §4.C/§4.G, §8 invariant 2).
    #[must_use]
    pub fn with(&self, overrides: impl IntoIterator<Item = ScopeOverride>) -> Self {
        Self {
            shared: self.shared.clone(),
            scope: self.scope.with(overrides),
        }
    }

    /// Run `per_backend` against every backend selected by this client's
    /// current [`Scope`], applying its retry/timeout/concurrency/
    /// first-success policy. `pool.Client.Call`.
    pub async fn call<F, Fut>(&self, per_backend: F) -> Result<(), EngineError>
    where
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), CallError>> + Send + 'static,
    {
        let backends = self.clients().await;
        call::call(&self.shared.cancel, &backends, &self.scope, per_backend).await
    }

    /// Like [`Client::call`], but also cancels every in-flight attempt as
    /// soon as `extra_cancel` fires, independent of this client's own
    /// shutdown token. Protocol overlays that need an adaptive per-call
    /// cancellation signal — e.g. best-attestation-data's early-cancel
    /// timer — use this instead of [`Client::call`] without tying that
    /// signal to [`Client::close`] affecting every other in-flight or
    /// future call.
    pub async fn call_with_cancel<F, Fut>(
        &self,
        extra_cancel: CancellationToken,
        per_backend: F,
    ) -> Result<(), EngineError>
    where
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), CallError>> + Send + 'static,
    {
        let merged = self.shared.cancel.child_token();
        let watcher = {
            let merged = merged.clone();
            tokio::spawn(async move {
                extra_cancel.cancelled().await;
                merged.cancel();
            })
        };
        let backends = self.clients().await;
        let result = call::call(&merged, &backends, &self.scope, per_backend).await;
        watcher.abort();
        result
    }

    /// Register a subscription for `topics`, reconciling against the
    /// current backend set immediately and on every future
    /// [`Client::set_clients`]. `pool.Client.EventsWithClient`.
    pub async fn subscribe(&self, topics: Vec<String>, handler: EventHandler) -> Uuid {
        let backends = self.clients().await;
        self.shared.subscriptions.subscribe(&backends, topics, handler).await
    }

    /// Cancel every background call and subscription stream owned by this
    /// client's shared state. `spec.md` §9: the explicit `Close()` gap the
    /// original source leaves open.
    pub fn close(&self) {
        self.shared.cancel.cancel();
        self.shared.subscriptions.close();
    }
}

/// Convenience re-export so overlay crates can construct handlers without
/// depending on [`crate::subscription`] directly.
pub type BlockEventHandler = Arc<dyn Fn(Arc<dyn Backend>, Event) + Send + Sync>;

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct Stub {
        address: String,
    }

    #[async_trait]
    impl Backend for Stub {
        fn name(&self) -> &str {
            "stub"
        }
        fn address(&self) -> &str {
            &self.address
        }
        async fn genesis(&self) -> beacon_client::Result<beacon_client::Genesis> {
            Ok(beacon_client::Genesis {
                genesis_time: 0,
                genesis_validators_root: beacon_client::Root::ZERO,
                genesis_fork_version: beacon_spec::Version([0; 4]),
            })
        }
    }

    fn stub(address: &str) -> Arc<dyn Backend> {
        Arc::new(Stub { address: address.into() })
    }

    #[tokio::test]
    async fn with_shares_state_but_derives_fresh_scope() {
        let client = Client::new(vec![stub("a"), stub("b")]);
        let derived = client.with([ScopeOverride::Concurrency(99)]);

        assert_eq!(client.scope().concurrency, 4);
        assert_eq!(derived.scope().concurrency, 99);
        assert_eq!(derived.size().await, 2);
    }

    #[tokio::test]
    async fn set_clients_is_observed_by_every_derived_copy() {
        let client = Client::new(vec![stub("a")]);
        let derived = client.with([ScopeOverride::Concurrency(1)]);

        client.set_clients(vec![stub("a"), stub("b"), stub("c")]).await;

        assert_eq!(derived.size().await, 3);
    }

    #[tokio::test]
    async fn call_delegates_to_the_engine_with_current_scope() {
        let client = Client::new(vec![stub("a"), stub("b")])
            .with([ScopeOverride::Select(crate::scope::select_all())]);

        let result = client.call(|backend| async move { backend.genesis().await.map(|_| ()) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn call_with_cancel_aborts_without_poisoning_the_client() {
        let client = Client::new(vec![stub("a")]);
        let extra_cancel = CancellationToken::new();
        extra_cancel.cancel();

        let result = client
            .call_with_cancel(extra_cancel, |backend| async move {
                backend.genesis().await.map(|_| ())
            })
            .await;
        assert!(result.is_ok(), "backend still completes before the watcher fires");

        let second = client.call(|backend| async move { backend.genesis().await.map(|_| ()) }).await;
        assert!(second.is_ok(), "client's own cancel token must be unaffected");
    }
}
