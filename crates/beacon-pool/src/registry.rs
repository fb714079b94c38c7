//! [`BackendRegistry`]: the mutable, address-keyed backend set, grounded on
//! `pool/pool.go`'s `Pool`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use beacon_client::Backend;
use thiserror::Error;
use tokio::sync::RwLock;

/// A boxed connection error from a [`ConnectFn`]. The registry does not
/// interpret connect failures — only whether the address is reachable.
pub type ConnectError = Box<dyn std::error::Error + Send + Sync>;

/// Establishes a [`Backend`] for a freshly-desired address.
/// `pool.NewPool`'s injected `connectFn`.
pub type ConnectFn = Arc<
    dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<Arc<dyn Backend>, ConnectError>> + Send>>
        + Send
        + Sync,
>;

/// Aggregate of every per-address connect failure from one [`BackendRegistry::update`]
/// call. `Update` never fails fast — it reports every failure at once.
#[derive(Debug, Error)]
pub struct RegistryUpdateError {
    /// Number of new addresses this update attempted to connect.
    pub attempted: usize,
    /// `(address, error)` pairs for every connection that failed.
    pub failures: Vec<(String, ConnectError)>,
}

impl fmt::Display for RegistryUpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} connections failed: ", self.failures.len(), self.attempted)?;
        for (i, (address, error)) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{address}: {error}")?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Inner {
    addresses: Vec<String>,
    clients: HashMap<String, Arc<dyn Backend>>,
}

/// Reconciles a desired list of backend addresses against a connected set.
///
/// Holds the **desired** address list plus a map from address to connected
/// backend (`spec.md` §4.B). [`BackendRegistry::update`] connects only the
/// addresses not already connected; [`BackendRegistry::clients`] returns a
/// defensive snapshot in the order addresses last appeared in `update`.
/// Cached connections for addresses no longer desired are retained
/// internally but excluded from `clients()` — the Subscription Manager is
/// what notices the disappearance and cancels their streams.
pub struct BackendRegistry {
    connect: ConnectFn,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry").finish_non_exhaustive()
    }
}

impl BackendRegistry {
    /// Build an empty registry that connects new addresses via `connect`.
    #[must_use]
    pub fn new(connect: ConnectFn) -> Self {
        Self { connect, inner: RwLock::new(Inner::default()) }
    }

    /// Reconcile the desired address list. Addresses already connected are
    /// left untouched; newly-desired addresses are connected concurrently.
    /// Never fails fast — every per-address failure is collected into the
    /// returned [`RegistryUpdateError`] (`spec.md` §8 invariant 1).
    pub async fn update(&self, addresses: Vec<String>) -> Result<(), RegistryUpdateError> {
        let new_addresses: Vec<String> = {
            let mut inner = self.inner.write().await;
            let new_addresses = addresses
                .iter()
                .filter(|address| !inner.clients.contains_key(*address))
                .cloned()
                .collect();
            inner.addresses = addresses;
            new_addresses
        };

        if new_addresses.is_empty() {
            return Ok(());
        }

        let connections = futures::future::join_all(new_addresses.iter().cloned().map(|address| {
            let connect = self.connect.clone();
            async move {
                tracing::debug!(%address, "connecting to new backend");
                let result = connect(address.clone()).await;
                if let Err(error) = &result {
                    tracing::warn!(%address, %error, "failed to connect to backend");
                }
                (address, result)
            }
        }))
        .await;

        let mut failures = Vec::new();
        {
            let mut inner = self.inner.write().await;
            for (address, result) in connections {
                match result {
                    Ok(backend) => {
                        inner.clients.insert(address, backend);
                    }
                    Err(error) => failures.push((address, error)),
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RegistryUpdateError { attempted: new_addresses.len(), failures })
        }
    }

    /// Snapshot of currently-connected backends, one per desired address
    /// still connected, in the order addresses last appeared in `update`.
    /// A defensive copy: callers may iterate without holding any lock.
    pub async fn clients(&self) -> Vec<Arc<dyn Backend>> {
        let inner = self.inner.read().await;
        inner
            .addresses
            .iter()
            .filter_map(|address| inner.clients.get(address).cloned())
            .collect()
    }
}


#[cfg(test)]
mod proptests {
    use proptest::collection::hash_set;
    use proptest::prelude::*;

    use super::*;

    struct Stub {
        address: String,
    }

    #[async_trait::async_trait]
    impl Backend for Stub {
        fn name(&self) -> &str {
            "stub"
        }
        fn address(&self) -> &str {
            &self.address
        }
    }

    proptest! {
        /// `spec.md` §8 invariant 1: after `Update(addresses)` completes
        /// successfully, `Clients()` returns exactly one backend per
        /// distinct address, in input order.
        #[test]
        fn update_then_clients_matches_input_order_for_any_distinct_address_set(
            addresses in hash_set("[a-z]{1,8}", 0..16).prop_map(|set| set.into_iter().collect::<Vec<_>>())
        ) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let registry = BackendRegistry::new(Arc::new(|address: String| {
                    Box::pin(async move {
                        let backend: Arc<dyn Backend> = Arc::new(Stub { address });
                        Ok(backend)
                    })
                }));

                registry.update(addresses.clone()).await.unwrap();
                let clients = registry.clients().await;
                let got: Vec<String> = clients.iter().map(|c| c.address().to_string()).collect();
                prop_assert_eq!(got, addresses);
                Ok(())
            })?;
        }
    }
}
