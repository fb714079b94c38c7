//! Beacon-chain network constants and the slot/epoch clock.
//!
//! This crate is the bottom of the `beacon-pool` stack: pure data and pure
//! functions over Ethereum 2.0 consensus-layer network parameters, with no
//! I/O beyond the `Clock`'s slot/epoch tick streams.
//!
//! ```text
//! beacon-spec     <- you are here: Spec, Slot/Epoch, Clock
//!     ^
//! beacon-client   <- Backend trait, data model, errors
//!     ^
//! beacon-pool     <- Scope, call engine, registry
//!     ^
//! beacon-multi    <- protocol overlay, client facade
//! ```
//!
//! # Modules
//!
//! - [`slot`]: `Slot`/`Epoch`/`CommitteeIndex`/`SubnetId` newtypes.
//! - [`network`]: [`Spec`] (per-network constants) and slot/time conversions.
//! - [`clock`]: [`Clock`]/[`Moment`], including the `every_slot`/`every_epoch`
//!   tick streams used to drive periodic work (e.g. purging stale index
//!   entries, re-evaluating a best-attestation-data selection).

pub mod clock;
pub mod network;
pub mod slot;

pub use clock::{Clock, Moment};
pub use network::{DomainType, Domains, Network, Spec, Version};
pub use slot::{CommitteeIndex, Epoch, Slot, SubnetId};

/// Commonly used types, for a single glob import.
pub mod prelude {
    pub use crate::clock::{Clock, Moment};
    pub use crate::network::{DomainType, Domains, Network, Spec, Version};
    pub use crate::slot::{CommitteeIndex, Epoch, Slot, SubnetId};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reexports_are_reachable() {
        let spec = Spec::for_network(Network::Mainnet);
        let clock = Clock::new(spec);
        let moment = clock.at_slot(Slot(0));
        assert_eq!(moment.slot(), Slot(0));
    }
}
