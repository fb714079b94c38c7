//! The Subscription Manager: reconciles desired `(topics, handler)`
//! subscriptions against the current backend set, grounded on
//! `pool/client.go`'s `updateSubscriptions`.

use std::collections::HashMap;
use std::sync::Arc;

use beacon_client::{Backend, Event};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A handler invoked once per event delivered to a subscription, with the
/// backend the event was received from so overlays can attribute it
/// (`spec.md` §9: "event-handler identity").
pub type EventHandler = Arc<dyn Fn(Arc<dyn Backend>, Event) + Send + Sync>;

struct Subscription {
    topics: Vec<String>,
    handler: EventHandler,
}

/// Reconciles a desired set of `(topics, handler)` subscriptions against a
/// mutable backend set (`spec.md` §4.E, §3's `ClientSubscriptions`).
///
/// Cancellation handles are stored per `(backend address, subscription id)`
/// so a backend's disappearance cancels exactly its own streams, and a
/// stream is started at most once per `(backend, subscription)` pair —
/// `spec.md` §3's invariant: "for every (backend B, subscription S), there
/// exists at most one active stream".
///
/// Streams run under a token derived from a detached root, not from the
/// caller's `ctx` passed to [`SubscriptionManager::subscribe`] — caller
/// cancellation must not tear down subscriptions that should survive
/// across calls (`spec.md` §4.E, §9).
pub struct SubscriptionManager {
    root: CancellationToken,
    desired: RwLock<HashMap<Uuid, Subscription>>,
    active: RwLock<HashMap<String, HashMap<Uuid, CancellationToken>>>,
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager").finish_non_exhaustive()
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    /// Build an empty manager. All streams started through it are derived
    /// from a fresh detached root token; call [`SubscriptionManager::close`]
    /// to tear every one of them down.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            desired: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Register a fresh desired subscription and immediately reconcile
    /// against `backends`. `pool.Client.EventsWithClient`.
    pub async fn subscribe(
        &self,
        backends: &[Arc<dyn Backend>],
        topics: Vec<String>,
        handler: EventHandler,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.desired.write().await.insert(id, Subscription { topics, handler });
        self.reconcile(backends).await;
        id
    }

    /// Reconcile the active stream set against `backends`: cancel streams
    /// for backends no longer present, start streams for new
    /// `(backend, subscription)` pairs whose backend advertises the events
    /// capability (`spec.md` §4.E). Idempotent under a stable input set.
    pub async fn reconcile(&self, backends: &[Arc<dyn Backend>]) {
        let present: std::collections::HashSet<&str> =
            backends.iter().map(|b| b.address()).collect();

        {
            let mut active = self.active.write().await;
            active.retain(|address, streams| {
                if present.contains(address.as_str()) {
                    return true;
                }
                for (_, cancel) in streams.drain() {
                    tracing::debug!(%address, "cancelling subscription: backend removed");
                    cancel.cancel();
                }
                false
            });
        }

        let desired = self.desired.read().await;
        let mut active = self.active.write().await;
        for backend in backends {
            if !backend.events_capability() {
                continue;
            }
            let streams = active.entry(backend.address().to_string()).or_default();
            for (id, subscription) in desired.iter() {
                if streams.contains_key(id) {
                    continue;
                }
                let cancel = self.root.child_token();
                streams.insert(*id, cancel.clone());
                spawn_stream(backend.clone(), *id, subscription, cancel);
            }
        }
    }

    /// Cancel every active stream, present and future, started through
    /// this manager. `spec.md` §9: the explicit `Close()` gap the source
    /// leaves open.
    pub fn close(&self) {
        self.root.cancel();
    }
}

fn spawn_stream(
    backend: Arc<dyn Backend>,
    id: Uuid,
    subscription: &Subscription,
    cancel: CancellationToken,
) {
    let topics = subscription.topics.clone();
    let handler = subscription.handler.clone();
    let address = backend.address().to_string();
    let first_topic = topics.first().cloned().unwrap_or_default();

    tokio::spawn(async move {
        tracing::debug!(%address, topic = %first_topic, %id, "subscribing");
        let sink_backend = backend.clone();
        let sink: Arc<dyn Fn(Event) + Send + Sync> = Arc::new(move |event| {
            handler(sink_backend.clone(), event);
        });
        if let Err(error) = backend.events(&topics, cancel, sink).await {
            tracing::warn!(%address, %error, %id, "subscription stream ended with error");
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use beacon_client::CallError;

    use super::*;

    struct EventsCapable {
        address: String,
        started: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Backend for EventsCapable {
        fn name(&self) -> &str {
            "events-capable"
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
            self.started.fetch_add(1, Ordering::SeqCst);
            cancel.cancelled().await;
            Ok(())
        }
    }

    struct NoEvents {
        address: String,
    }

    #[async_trait]
    impl Backend for NoEvents {
        fn name(&self) -> &str {
            "no-events"
        }
        fn address(&self) -> &str {
            &self.address
        }
    }

    #[tokio::test]
    async fn subscribes_only_to_capable_backends() {
        let started = Arc::new(AtomicUsize::new(0));
        let capable: Arc<dyn Backend> = Arc::new(EventsCapable {
            address: "a".into(),
            started: started.clone(),
        });
        let incapable: Arc<dyn Backend> = Arc::new(NoEvents { address: "b".into() });

        let manager = SubscriptionManager::new();
        manager
            .subscribe(&[capable, incapable], vec!["block".into()], Arc::new(|_, _| {}))
            .await;

        tokio::task::yield_now().await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        manager.close();
    }

    #[tokio::test]
    async fn reconcile_cancels_removed_backend_and_starts_new_one() {
        let started_a = Arc::new(AtomicUsize::new(0));
        let started_c = Arc::new(AtomicUsize::new(0));
        let a: Arc<dyn Backend> = Arc::new(EventsCapable {
            address: "a".into(),
            started: started_a.clone(),
        });
        let b: Arc<dyn Backend> = Arc::new(EventsCapable {
            address: "b".into(),
            started: Arc::new(AtomicUsize::new(0)),
        });
        let c: Arc<dyn Backend> = Arc::new(EventsCapable {
            address: "c".into(),
            started: started_c.clone(),
        });

        let manager = SubscriptionManager::new();
        manager
            .subscribe(&[a.clone(), b.clone()], vec!["block".into()], Arc::new(|_, _| {}))
            .await;
        tokio::task::yield_now().await;
        assert_eq!(started_a.load(Ordering::SeqCst), 1);

        // "a" is removed, "c" is added; "b" is undisturbed (S6).
        manager.reconcile(&[b, c]).await;
        tokio::task::yield_now().await;
        assert_eq!(started_c.load(Ordering::SeqCst), 1);

        {
            let active = manager.active.read().await;
            assert!(!active.contains_key("a"));
            assert!(active.contains_key("b"));
            assert!(active.contains_key("c"));
        }
        manager.close();
    }

    #[tokio::test]
    async fn reconcile_is_idempotent_under_stable_input() {
        let started = Arc::new(AtomicUsize::new(0));
        let a: Arc<dyn Backend> = Arc::new(EventsCapable {
            address: "a".into(),
            started: started.clone(),
        });

        let manager = SubscriptionManager::new();
        manager
            .subscribe(&[a.clone()], vec!["block".into()], Arc::new(|_, _| {}))
            .await;
        manager.reconcile(&[a.clone()]).await;
        manager.reconcile(&[a]).await;
        tokio::task::yield_now().await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
        manager.close();
    }
}
