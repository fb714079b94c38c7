//! Minimal data model carried by the [`crate::Backend`] trait.
//!
//! The original implementation leans on `attestantio/go-eth2-client`'s
//! `phase0`/`altair`/`api` packages for full SSZ-encodable wire types.
//! SSZ/JSON codecs and BLS cryptography are out of scope here (`spec.md`
//! §1), so these are opaque newtypes: enough structure to carry the
//! best-attestation-data algorithm and a realistic capability surface,
//! nothing that pretends to validate or encode beacon-chain wire formats.

use std::fmt;

use beacon_spec::{CommitteeIndex, Epoch, Slot};

/// A 32-byte Merkle root (block root, state root, attestation-data root, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Root(pub [u8; 32]);

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Root(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Root {
    /// The all-zero root, used as a sentinel in tests and by backends that
    /// have no better answer (e.g. an unsigned genesis validators root).
    pub const ZERO: Self = Self([0u8; 32]);
}

/// A 32-byte signature domain, as returned by `Domain`/`GenesisDomain`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Domain(pub [u8; 32]);

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Domain(0x{})", hex::encode(self.0))
    }
}

/// Index of a validator in the beacon-chain validator registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ValidatorIndex(pub u64);

/// A 48-byte BLS public key. No cryptographic operations are performed
/// on it here; it is carried verbatim for identification purposes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlsPubKey(pub [u8; 48]);

impl fmt::Debug for BlsPubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlsPubKey(0x{})", hex::encode(self.0))
    }
}

/// `(epoch, root)` pair identifying a justified/finalized/source/target checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Checkpoint {
    /// Epoch of the checkpoint.
    pub epoch: Epoch,
    /// Root of the checkpoint block.
    pub root: Root,
}

/// Unsigned attestation data, the structure the best-selection algorithm
/// ranks among concurrent backend replies (`spec.md` §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttestationData {
    /// Slot the attestation is for.
    pub slot: Slot,
    /// Committee index within the slot.
    pub index: CommitteeIndex,
    /// The validator's claimed chain head.
    pub beacon_block_root: Root,
    /// Source (last-justified) checkpoint.
    pub source: Checkpoint,
    /// Target (current-epoch) checkpoint.
    pub target: Checkpoint,
}

/// Genesis metadata, as returned by the `Genesis` capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Genesis {
    /// Unix timestamp of genesis, seconds.
    pub genesis_time: u64,
    /// Root committing to the initial validator set.
    pub genesis_validators_root: Root,
    /// Fork version active at genesis.
    pub genesis_fork_version: beacon_spec::Version,
}

/// Beacon-block header summary, as returned by `BeaconBlockHeader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    /// Root of this block.
    pub root: Root,
    /// Slot the block was proposed in.
    pub slot: Slot,
    /// Index of the proposing validator.
    pub proposer_index: ValidatorIndex,
    /// Root of the parent block.
    pub parent_root: Root,
    /// Root of the post-state.
    pub state_root: Root,
}

/// Current status and balance of a validator, as returned by `Validators`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Validator {
    /// Registry index.
    pub index: ValidatorIndex,
    /// Balance in Gwei.
    pub balance: u64,
    /// Human-readable status (`"active_ongoing"`, `"exited_slashed"`, ...).
    pub status: String,
    /// Validator public key.
    pub pubkey: BlsPubKey,
}

/// One slot's proposer assignment, as returned by `ProposerDuties`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProposerDuty {
    /// Assigned validator.
    pub validator_index: ValidatorIndex,
    /// Slot the validator must propose in.
    pub slot: Slot,
}

/// One epoch's attester assignment, as returned by `AttesterDuties`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttesterDuty {
    /// Assigned validator.
    pub validator_index: ValidatorIndex,
    /// Slot to attest in.
    pub slot: Slot,
    /// Committee the validator belongs to.
    pub committee_index: CommitteeIndex,
    /// This validator's position within the committee.
    pub validator_committee_index: u64,
    /// Size of the committee.
    pub committee_length: u64,
    /// Number of committees at `slot`.
    pub committees_at_slot: u64,
}

/// One period's sync-committee assignment, as returned by `SyncCommitteeDuties`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SyncCommitteeDuty {
    /// Assigned validator.
    pub validator_index: ValidatorIndex,
    /// Indices within the 512-member sync committee.
    pub validator_sync_committee_indices: Vec<u64>,
}

/// A beacon-committee subscription request, as submitted via
/// `SubmitBeaconCommitteeSubscriptions`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BeaconCommitteeSubscription {
    /// Validator making the subscription.
    pub validator_index: ValidatorIndex,
    /// Committee being subscribed to.
    pub committee_index: CommitteeIndex,
    /// Size of the committee.
    pub committees_at_slot: u64,
    /// Slot the subscription applies to.
    pub slot: Slot,
    /// Whether the validator is an aggregator for this committee.
    pub is_aggregator: bool,
}

/// A sync-committee subnet subscription, as submitted via
/// `SubmitSyncCommitteeSubscriptions`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SyncCommitteeSubscription {
    /// Validator making the subscription.
    pub validator_index: ValidatorIndex,
    /// Sync-committee indices the validator belongs to.
    pub sync_committee_indices: Vec<u64>,
    /// Epoch until which the subscription is valid.
    pub until_epoch: Epoch,
}

/// Preferred fee recipient / gas target for a proposer, as submitted via
/// `SubmitProposalPreparations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProposalPreparation {
    /// Validator the preparation applies to.
    pub validator_index: ValidatorIndex,
    /// 20-byte fee-recipient address.
    pub fee_recipient: [u8; 20],
}

/// A validator registration for an external block builder, as submitted
/// via `SubmitValidatorRegistrations`. Payload is opaque (signed, SSZ)
/// and carried verbatim — this crate does not interpret it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignedValidatorRegistration(pub Vec<u8>);

/// An SSZ-encoded signed beacon block, blinded or not. Opaque payload:
/// the pool neither decodes nor re-encodes block contents.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignedBeaconBlock(pub Vec<u8>);

impl fmt::Debug for SignedBeaconBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedBeaconBlock({} bytes)", self.0.len())
    }
}

/// An unsigned beacon-block (or blinded beacon-block) proposal. Opaque
/// payload, same rationale as [`SignedBeaconBlock`].
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BeaconBlockProposal(pub Vec<u8>);

impl fmt::Debug for BeaconBlockProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BeaconBlockProposal({} bytes)", self.0.len())
    }
}

/// A signed attestation, as submitted via `SubmitAttestations`. Opaque
/// payload; the pool broadcasts it without inspecting contents.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Attestation(pub Vec<u8>);

/// A signed aggregate-and-proof, as submitted via `SubmitAggregateAttestations`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignedAggregateAndProof(pub Vec<u8>);

/// A sync-committee message, as submitted via `SubmitSyncCommitteeMessages`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SyncCommitteeMessage(pub Vec<u8>);

/// A sync-committee contribution, as returned by `SyncCommitteeContribution`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SyncCommitteeContribution(pub Vec<u8>);

/// A signed contribution-and-proof, as submitted via
/// `SubmitSyncCommitteeContributions`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignedContributionAndProof(pub Vec<u8>);

/// One event delivered on a long-lived `events()` stream. `topic` is the
/// gossip/SSE topic name (`"block"`, `"head"`, `"attestation"`, ...);
/// `data` carries the opaque event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Topic this event was delivered under.
    pub topic: String,
    /// Opaque event payload.
    pub data: Vec<u8>,
}

/// A `block` topic event, decoded just enough to drive the
/// block-root→slot index (`spec.md` §4.F step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEvent {
    /// Slot the block was proposed in.
    pub slot: Slot,
    /// Root of the block.
    pub block_root: Root,
}

impl BlockEvent {
    /// Decode a `"block"`-topic [`Event`]'s opaque payload.
    ///
    /// Full SSZ/JSON event decoding is out of scope for this crate (`spec.md`
    /// §1); this reads the minimal fixed layout a [`crate::Backend`] is
    /// expected to normalize its wire event into before invoking a
    /// subscription handler: 32 bytes of block root followed by an 8-byte
    /// little-endian slot. Returns `None` for any other topic or a payload
    /// of the wrong length.
    #[must_use]
    pub fn decode(event: &Event) -> Option<Self> {
        if event.topic != "block" || event.data.len() != 40 {
            return None;
        }
        let mut root = [0u8; 32];
        root.copy_from_slice(&event.data[..32]);
        let mut slot_bytes = [0u8; 8];
        slot_bytes.copy_from_slice(&event.data[32..40]);
        Some(Self {
            block_root: Root(root),
            slot: Slot(u64::from_le_bytes(slot_bytes)),
        })
    }

    /// Encode this event back into the wire layout [`BlockEvent::decode`]
    /// expects. Used by test backends that synthesize `"block"` events.
    #[must_use]
    pub fn encode(self) -> Event {
        let mut data = Vec::with_capacity(40);
        data.extend_from_slice(&self.block_root.0);
        data.extend_from_slice(&self.slot.0.to_le_bytes());
        Event { topic: "block".to_string(), data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_display_is_hex_prefixed() {
        let mut bytes = [0u8; 32];
        bytes[31] = 0xab;
        let root = Root(bytes);
        assert_eq!(
            root.to_string(),
            format!("0x{}ab", "00".repeat(31))
        );
    }

    #[test]
    fn root_zero_is_all_zero_bytes() {
        assert_eq!(Root::ZERO.0, [0u8; 32]);
    }

    #[test]
    fn block_event_round_trips_through_encode_decode() {
        let mut root = [0u8; 32];
        root[0] = 0xab;
        let event = BlockEvent { slot: Slot(42), block_root: Root(root) };
        let decoded = BlockEvent::decode(&event.encode()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn block_event_decode_rejects_other_topics() {
        let event = Event { topic: "head".into(), data: vec![0u8; 40] };
        assert_eq!(BlockEvent::decode(&event), None);
    }
}
