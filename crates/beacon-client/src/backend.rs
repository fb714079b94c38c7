//! The [`Backend`] trait: one beacon-node implementation's surface,
//! grounded on `client.go`'s `Client` interface and `go-eth2-client/client.go`'s
//! capability-probing wrapper around `eth2client.Service`.

use async_trait::async_trait;
use beacon_spec::{CommitteeIndex, Epoch, Slot};

use crate::error::Result;
use crate::types::{
    AttesterDuty, BeaconBlockProposal, BeaconCommitteeSubscription, BlockHeader, Domain,
    Event, Genesis, ProposalPreparation, ProposerDuty, Root, SignedAggregateAndProof,
    SignedBeaconBlock, SignedContributionAndProof, SignedValidatorRegistration,
    SyncCommitteeContribution, SyncCommitteeDuty, SyncCommitteeMessage, SyncCommitteeSubscription,
    Validator, ValidatorIndex,
};
use crate::{Attestation, AttestationData, DomainType};

/// One upstream beacon-node process.
///
/// Identity is the backend's address string (§3 of `spec.md`): the call
/// engine and subscription manager key everything off [`Backend::address`],
/// never off object identity.
///
/// Every data-fetching/submitting method has a default implementation
/// that returns [`crate::CallError::BackendUnavailable`] — implementors
/// override only the capabilities their underlying client actually
/// exposes, mirroring `go-eth2-client/client.go`'s type-assertion-per-call
/// pattern (`c.service.(eth2client.SpecProvider)`) without Rust's lack of
/// interface upcasting to fall back on.
///
/// [`Backend::events_capability`] is the one capability callers must be
/// able to check *before* attempting a call, since `events()` starts a
/// long-lived stream rather than returning a single reply (`spec.md` §4.E:
/// "Absence of the events capability on B silently skips B for that
/// subscription").
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Human-readable name of the underlying client implementation
    /// (e.g. `"lighthouse"`, `"prysm"`). Not used for identity.
    fn name(&self) -> &str;

    /// Address this backend was constructed from. This is the identity
    /// used throughout the pool/registry/subscription manager.
    fn address(&self) -> &str;

    /// Whether this backend supports the `events()` long-lived stream.
    /// Checked by the Subscription Manager before attempting to start a
    /// stream; defaults to `false` (no events capability).
    fn events_capability(&self) -> bool {
        false
    }

    /// Fetch the network parameter map exposed by the backend (raw
    /// key/value strings — decoding into a typed [`beacon_spec::Spec`]
    /// is the caller's job, not this trait's).
    async fn spec(&self) -> Result<std::collections::BTreeMap<String, String>> {
        Err(self.unsupported("spec"))
    }

    /// Fetch genesis metadata.
    async fn genesis(&self) -> Result<Genesis> {
        Err(self.unsupported("genesis"))
    }

    /// Resolve a block identifier (slot number, `"head"`, `"finalized"`,
    /// hex root, ...) to its root.
    async fn beacon_block_root(&self, block_id: &str) -> Result<Root> {
        let _ = block_id;
        Err(self.unsupported("beacon_block_root"))
    }

    /// Fetch a signed beacon block by identifier. Opaque payload.
    async fn signed_beacon_block(&self, block_id: &str) -> Result<SignedBeaconBlock> {
        let _ = block_id;
        Err(self.unsupported("signed_beacon_block"))
    }

    /// Fetch a beacon-block header summary by identifier.
    async fn beacon_block_header(&self, block_id: &str) -> Result<BlockHeader> {
        let _ = block_id;
        Err(self.unsupported("beacon_block_header"))
    }

    /// Derive the signature domain for `(domain_type, epoch)`.
    async fn domain(&self, domain_type: DomainType, epoch: Epoch) -> Result<Domain> {
        let _ = (domain_type, epoch);
        Err(self.unsupported("domain"))
    }

    /// Look up validators at `state_id` by registry index.
    async fn validators(
        &self,
        state_id: &str,
        indices: &[ValidatorIndex],
    ) -> Result<std::collections::HashMap<ValidatorIndex, Validator>> {
        let _ = (state_id, indices);
        Err(self.unsupported("validators"))
    }

    /// Proposer-duty assignments for `epoch`, restricted to `indices`
    /// (empty slice = all validators).
    async fn proposer_duties(
        &self,
        epoch: Epoch,
        indices: &[ValidatorIndex],
    ) -> Result<Vec<ProposerDuty>> {
        let _ = (epoch, indices);
        Err(self.unsupported("proposer_duties"))
    }

    /// Attester-duty assignments for `epoch`, restricted to `indices`.
    async fn attester_duties(
        &self,
        epoch: Epoch,
        indices: &[ValidatorIndex],
    ) -> Result<Vec<AttesterDuty>> {
        let _ = (epoch, indices);
        Err(self.unsupported("attester_duties"))
    }

    /// Sync-committee duty assignments for `epoch`, restricted to `indices`.
    async fn sync_committee_duties(
        &self,
        epoch: Epoch,
        indices: &[ValidatorIndex],
    ) -> Result<Vec<SyncCommitteeDuty>> {
        let _ = (epoch, indices);
        Err(self.unsupported("sync_committee_duties"))
    }

    /// Request an unsigned beacon-block proposal for `slot`.
    async fn proposal(
        &self,
        slot: Slot,
        randao_reveal: &[u8],
        graffiti: &[u8],
    ) -> Result<BeaconBlockProposal> {
        let _ = (slot, randao_reveal, graffiti);
        Err(self.unsupported("proposal"))
    }

    /// Submit a signed beacon block.
    async fn submit_proposal(&self, block: &SignedBeaconBlock) -> Result<()> {
        let _ = block;
        Err(self.unsupported("submit_proposal"))
    }

    /// Request an unsigned blinded beacon-block proposal for `slot`.
    async fn blinded_proposal(
        &self,
        slot: Slot,
        randao_reveal: &[u8],
        graffiti: &[u8],
    ) -> Result<BeaconBlockProposal> {
        let _ = (slot, randao_reveal, graffiti);
        Err(self.unsupported("blinded_proposal"))
    }

    /// Submit a signed blinded beacon block.
    async fn submit_blinded_proposal(&self, block: &SignedBeaconBlock) -> Result<()> {
        let _ = block;
        Err(self.unsupported("submit_blinded_proposal"))
    }

    /// Submit beacon-committee subscriptions (broadcast write RPC).
    async fn submit_beacon_committee_subscriptions(
        &self,
        subscriptions: &[BeaconCommitteeSubscription],
    ) -> Result<()> {
        let _ = subscriptions;
        Err(self.unsupported("submit_beacon_committee_subscriptions"))
    }

    /// Request unsigned attestation data for `(slot, committee_index)`.
    async fn attestation_data(
        &self,
        slot: Slot,
        committee_index: CommitteeIndex,
    ) -> Result<AttestationData> {
        let _ = (slot, committee_index);
        Err(self.unsupported("attestation_data"))
    }

    /// Submit signed attestations (broadcast write RPC).
    async fn submit_attestations(&self, attestations: &[Attestation]) -> Result<()> {
        let _ = attestations;
        Err(self.unsupported("submit_attestations"))
    }

    /// Fetch the aggregate attestation for `(slot, attestation_data_root)`.
    async fn aggregate_attestation(
        &self,
        slot: Slot,
        attestation_data_root: Root,
    ) -> Result<Attestation> {
        let _ = (slot, attestation_data_root);
        Err(self.unsupported("aggregate_attestation"))
    }

    /// Submit signed aggregate-and-proofs (broadcast write RPC).
    async fn submit_aggregate_attestations(
        &self,
        aggregates: &[SignedAggregateAndProof],
    ) -> Result<()> {
        let _ = aggregates;
        Err(self.unsupported("submit_aggregate_attestations"))
    }

    /// Submit sync-committee subnet subscriptions (broadcast write RPC).
    async fn submit_sync_committee_subscriptions(
        &self,
        subscriptions: &[SyncCommitteeSubscription],
    ) -> Result<()> {
        let _ = subscriptions;
        Err(self.unsupported("submit_sync_committee_subscriptions"))
    }

    /// Submit sync-committee messages (broadcast write RPC).
    async fn submit_sync_committee_messages(
        &self,
        messages: &[SyncCommitteeMessage],
    ) -> Result<()> {
        let _ = messages;
        Err(self.unsupported("submit_sync_committee_messages"))
    }

    /// Fetch a sync-committee contribution for `(slot, subcommittee_index, beacon_block_root)`.
    async fn sync_committee_contribution(
        &self,
        slot: Slot,
        subcommittee_index: u64,
        beacon_block_root: Root,
    ) -> Result<SyncCommitteeContribution> {
        let _ = (slot, subcommittee_index, beacon_block_root);
        Err(self.unsupported("sync_committee_contribution"))
    }

    /// Submit signed contribution-and-proofs (broadcast write RPC).
    async fn submit_sync_committee_contributions(
        &self,
        contributions: &[SignedContributionAndProof],
    ) -> Result<()> {
        let _ = contributions;
        Err(self.unsupported("submit_sync_committee_contributions"))
    }

    /// Submit validator registrations for an external block builder
    /// (broadcast write RPC).
    async fn submit_validator_registrations(
        &self,
        registrations: &[SignedValidatorRegistration],
    ) -> Result<()> {
        let _ = registrations;
        Err(self.unsupported("submit_validator_registrations"))
    }

    /// Submit proposer preparations (fee recipient, gas target; broadcast
    /// write RPC).
    async fn submit_proposal_preparations(
        &self,
        preparations: &[ProposalPreparation],
    ) -> Result<()> {
        let _ = preparations;
        Err(self.unsupported("submit_proposal_preparations"))
    }

    /// Start a long-lived event stream for `topics`, invoking `handler`
    /// for each delivery until `cancel` fires. Only called by the
    /// Subscription Manager when [`Backend::events_capability`] returns
    /// `true`.
    async fn events(
        &self,
        topics: &[String],
        cancel: tokio_util::sync::CancellationToken,
        handler: std::sync::Arc<dyn Fn(Event) + Send + Sync>,
    ) -> Result<()> {
        let _ = (topics, cancel, handler);
        Err(self.unsupported("events"))
    }

    /// Convenience used by every default method body above.
    fn unsupported(&self, operation: &str) -> crate::CallError {
        crate::CallError::unavailable(self.address(), operation)
    }
}

#[async_trait]
impl<T: Backend + ?Sized> Backend for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn address(&self) -> &str {
        (**self).address()
    }

    fn events_capability(&self) -> bool {
        (**self).events_capability()
    }

    async fn spec(&self) -> Result<std::collections::BTreeMap<String, String>> {
        (**self).spec().await
    }

    async fn genesis(&self) -> Result<Genesis> {
        (**self).genesis().await
    }

    async fn beacon_block_root(&self, block_id: &str) -> Result<Root> {
        (**self).beacon_block_root(block_id).await
    }

    async fn signed_beacon_block(&self, block_id: &str) -> Result<SignedBeaconBlock> {
        (**self).signed_beacon_block(block_id).await
    }

    async fn beacon_block_header(&self, block_id: &str) -> Result<BlockHeader> {
        (**self).beacon_block_header(block_id).await
    }

    async fn domain(&self, domain_type: DomainType, epoch: Epoch) -> Result<Domain> {
        (**self).domain(domain_type, epoch).await
    }

    async fn validators(
        &self,
        state_id: &str,
        indices: &[ValidatorIndex],
    ) -> Result<std::collections::HashMap<ValidatorIndex, Validator>> {
        (**self).validators(state_id, indices).await
    }

    async fn proposer_duties(
        &self,
        epoch: Epoch,
        indices: &[ValidatorIndex],
    ) -> Result<Vec<ProposerDuty>> {
        (**self).proposer_duties(epoch, indices).await
    }

    async fn attester_duties(
        &self,
        epoch: Epoch,
        indices: &[ValidatorIndex],
    ) -> Result<Vec<AttesterDuty>> {
        (**self).attester_duties(epoch, indices).await
    }

    async fn sync_committee_duties(
        &self,
        epoch: Epoch,
        indices: &[ValidatorIndex],
    ) -> Result<Vec<SyncCommitteeDuty>> {
        (**self).sync_committee_duties(epoch, indices).await
    }

    async fn proposal(
        &self,
        slot: Slot,
        randao_reveal: &[u8],
        graffiti: &[u8],
    ) -> Result<BeaconBlockProposal> {
        (**self).proposal(slot, randao_reveal, graffiti).await
    }

    async fn submit_proposal(&self, block: &SignedBeaconBlock) -> Result<()> {
        (**self).submit_proposal(block).await
    }

    async fn blinded_proposal(
        &self,
        slot: Slot,
        randao_reveal: &[u8],
        graffiti: &[u8],
    ) -> Result<BeaconBlockProposal> {
        (**self).blinded_proposal(slot, randao_reveal, graffiti).await
    }

    async fn submit_blinded_proposal(&self, block: &SignedBeaconBlock) -> Result<()> {
        (**self).submit_blinded_proposal(block).await
    }

    async fn submit_beacon_committee_subscriptions(
        &self,
        subscriptions: &[BeaconCommitteeSubscription],
    ) -> Result<()> {
        (**self)
            .submit_beacon_committee_subscriptions(subscriptions)
            .await
    }

    async fn attestation_data(
        &self,
        slot: Slot,
        committee_index: CommitteeIndex,
    ) -> Result<AttestationData> {
        (**self).attestation_data(slot, committee_index).await
    }

    async fn submit_attestations(&self, attestations: &[Attestation]) -> Result<()> {
        (**self).submit_attestations(attestations).await
    }

    async fn aggregate_attestation(
        &self,
        slot: Slot,
        attestation_data_root: Root,
    ) -> Result<Attestation> {
        (**self)
            .aggregate_attestation(slot, attestation_data_root)
            .await
    }

    async fn submit_aggregate_attestations(
        &self,
        aggregates: &[SignedAggregateAndProof],
    ) -> Result<()> {
        (**self).submit_aggregate_attestations(aggregates).await
    }

    async fn submit_sync_committee_subscriptions(
        &self,
        subscriptions: &[SyncCommitteeSubscription],
    ) -> Result<()> {
        (**self)
            .submit_sync_committee_subscriptions(subscriptions)
            .await
    }

    async fn submit_sync_committee_messages(
        &self,
        messages: &[SyncCommitteeMessage],
    ) -> Result<()> {
        (**self).submit_sync_committee_messages(messages).await
    }

    async fn sync_committee_contribution(
        &self,
        slot: Slot,
        subcommittee_index: u64,
        beacon_block_root: Root,
    ) -> Result<SyncCommitteeContribution> {
        (**self)
            .sync_committee_contribution(slot, subcommittee_index, beacon_block_root)
            .await
    }

    async fn submit_sync_committee_contributions(
        &self,
        contributions: &[SignedContributionAndProof],
    ) -> Result<()> {
        (**self)
            .submit_sync_committee_contributions(contributions)
            .await
    }

    async fn submit_validator_registrations(
        &self,
        registrations: &[SignedValidatorRegistration],
    ) -> Result<()> {
        (**self).submit_validator_registrations(registrations).await
    }

    async fn submit_proposal_preparations(
        &self,
        preparations: &[ProposalPreparation],
    ) -> Result<()> {
        (**self).submit_proposal_preparations(preparations).await
    }

    async fn events(
        &self,
        topics: &[String],
        cancel: tokio_util::sync::CancellationToken,
        handler: std::sync::Arc<dyn Fn(Event) + Send + Sync>,
    ) -> Result<()> {
        (**self).events(topics, cancel, handler).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare {
        address: String,
    }

    #[async_trait]
    impl Backend for Bare {
        fn name(&self) -> &str {
            "bare"
        }

        fn address(&self) -> &str {
            &self.address
        }
    }

    #[tokio::test]
    async fn unimplemented_capability_reports_backend_unavailable() {
        let backend = Bare {
            address: "http://localhost:5052".into(),
        };
        let err = backend.genesis().await.unwrap_err();
        assert!(matches!(err, crate::CallError::BackendUnavailable { .. }));
        assert!(!backend.events_capability());
    }

    #[tokio::test]
    async fn arc_backend_delegates() {
        let backend = std::sync::Arc::new(Bare {
            address: "http://localhost:5052".into(),
        });
        assert_eq!(backend.address(), "http://localhost:5052");
        assert!(backend.spec().await.is_err());
    }
}
