//! The generic replicating call engine: scope, call engine, backend
//! registry and subscription manager (`spec.md` §2 components B–E).
//!
//! ```text
//! beacon-spec
//!     ^
//! beacon-client
//!     ^
//! beacon-pool     <- you are here: Scope, Call Engine, Registry, Subscriptions
//!     ^
//! beacon-multi
//! ```
//!
//! # Modules
//!
//! - [`scope`]: [`Scope`] and its override machinery, plus the built-in
//!   selector and retry policies.
//! - [`call`]: the call engine itself — [`call::call`], [`call::CallTrace`],
//!   [`call::PoolError`].
//! - [`registry`]: [`registry::BackendRegistry`], the address-reconciling
//!   connection manager.
//! - [`subscription`]: [`subscription::SubscriptionManager`], the
//!   long-lived event-stream reconciler.
//! - [`client`]: [`Client`], the shared-state facade composing all of the
//!   above — what `beacon-multi`'s protocol overlay wraps.
//! - [`mock`] (behind the `test-support` feature): a configurable
//!   in-memory [`beacon_client::Backend`] for exercising the engine
//!   without a real beacon node.

pub mod call;
pub mod client;
pub mod registry;
pub mod scope;
pub mod subscription;

#[cfg(feature = "test-support")]
pub mod mock;

pub use call::{CallLog, CallTrace, EngineError, PoolError};
pub use client::Client;
pub use registry::{BackendRegistry, ConnectFn, RegistryUpdateError};
pub use scope::{Scope, ScopeOverride};
pub use subscription::{EventHandler, SubscriptionManager};

/// Commonly used types, for a single glob import.
pub mod prelude {
    pub use crate::call::{CallTrace, EngineError, PoolError};
    pub use crate::client::Client;
    pub use crate::registry::BackendRegistry;
    pub use crate::scope::{Scope, ScopeOverride};
}
