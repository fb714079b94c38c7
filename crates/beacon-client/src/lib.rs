//! Backend trait, data model and error taxonomy for a single beacon-node
//! implementation, as required by the `beacon-pool` call engine.
//!
//! ```text
//! beacon-spec
//!     ^
//! beacon-client   <- you are here: Backend, CallError, data model
//!     ^
//! beacon-pool
//!     ^
//! beacon-multi
//! ```
//!
//! # Modules
//!
//! - [`backend`]: the [`Backend`] trait every pooled client implements.
//! - [`error`]: [`CallError`], the per-attempt error taxonomy (`spec.md` §7).
//! - [`types`]: the minimal opaque data model (`spec.md` §3).

pub mod backend;
pub mod error;
pub mod types;

pub use backend::Backend;
pub use beacon_spec::{CommitteeIndex, DomainType, Epoch, Slot, SubnetId, Version};
pub use error::{CallError, Result};
pub use types::{
    Attestation, AttestationData, AttesterDuty, BeaconBlockProposal, BeaconCommitteeSubscription,
    BlockEvent, BlockHeader, BlsPubKey, Checkpoint, Domain, Event, Genesis, ProposalPreparation,
    ProposerDuty, Root, SignedAggregateAndProof, SignedBeaconBlock, SignedContributionAndProof,
    SignedValidatorRegistration, SyncCommitteeContribution, SyncCommitteeDuty,
    SyncCommitteeMessage, SyncCommitteeSubscription, Validator, ValidatorIndex,
};

/// Commonly used types, for a single glob import.
pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::error::{CallError, Result};
    pub use crate::types::*;
}
