//! Protocol-aware overlay on top of `beacon-pool`'s replicating call
//! engine: the block-root-to-slot index and the best-attestation-data
//! client facade (`spec.md` §2 components F–G).
//!
//! ```text
//! beacon-spec
//!     ^
//! beacon-client
//!     ^
//! beacon-pool
//!     ^
//! beacon-multi   <- you are here: BlockRootSlotIndex, Client
//! ```
//!
//! # Modules
//!
//! - [`blockrootslots`]: [`BlockRootSlotIndex`], the write-many read-many
//!   age-purged map a streaming `block`-topic subscription populates.
//! - [`client`]: [`Client`], the beacon-API-shaped facade over
//!   [`beacon_pool::Client`], including best-attestation-data selection.

pub mod blockrootslots;
pub mod client;

pub use blockrootslots::BlockRootSlotIndex;
pub use client::{Client, FacadeError};

/// Commonly used types, for a single glob import.
pub mod prelude {
    pub use crate::blockrootslots::BlockRootSlotIndex;
    pub use crate::client::{Client, FacadeError};
}
