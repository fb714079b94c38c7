//! [`Client`]: the protocol-aware overlay plus facade, grounded on
//! `multi/client.go`.
//!
//! Wraps a [`beacon_pool::Client`] with beacon-API-shaped methods: plain
//! reads delegate to the pool under the caller's current scope and surface
//! the first successful typed reply; writes are broadcast to every
//! selected backend; [`Client::best_attestation_data_selection`] arms the
//! specialised best-attestation-data path driven by a streaming
//! block-root-to-slot index.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_client::{
    Attestation, AttestationData, AttesterDuty, Backend, BeaconBlockProposal,
    BeaconCommitteeSubscription, BlockEvent, BlockHeader, CallError, CommitteeIndex, Domain,
    DomainType, Epoch, Genesis, ProposalPreparation, ProposerDuty, Root, SignedAggregateAndProof,
    SignedBeaconBlock, SignedContributionAndProof, SignedValidatorRegistration, Slot,
    SyncCommitteeContribution, SyncCommitteeDuty, SyncCommitteeMessage, SyncCommitteeSubscription,
    Validator, ValidatorIndex,
};
use beacon_pool::{EngineError, PoolError, ScopeOverride};
use beacon_spec::{Clock, Spec};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::blockrootslots::BlockRootSlotIndex;

/// How often the background purge task re-evaluates the block-root-slot
/// index (`spec.md` §4.F step 2).
const PURGE_INTERVAL: Duration = Duration::from_secs(30);

/// How many epochs of history the purge task retains — roughly 8 hours at
/// mainnet parameters (`spec.md` §4.F step 2).
const PURGE_RETENTION_EPOCHS: u64 = 75;

/// Errors the facade surfaces to callers, collapsing [`EngineError`] into
/// a domain-shaped taxonomy (`spec.md` §7).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FacadeError {
    /// No backend was selected for this call; the pool is empty or the
    /// scope's selector rejected every candidate.
    #[error("no clients selected")]
    NoClientsSelected,

    /// Every selected backend was exhausted without success.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// At least one backend reported the well-defined "absent" response
    /// (`CallError::NotFound`), surfaced even through the best-selection
    /// path so callers can distinguish genuine absence from pool failure
    /// (`spec.md` §7).
    #[error("block not found")]
    BlockNotFound,

    /// The engine reported success but no per-backend attempt produced a
    /// typed result. Not expected in practice; kept as a named case rather
    /// than a panic.
    #[error("engine reported success but produced no result")]
    EmptyResponse,
}

impl FacadeError {
    fn from_engine(error: EngineError) -> Self {
        match error {
            EngineError::NoClientsSelected => Self::NoClientsSelected,
            EngineError::Pool(pool_error) => Self::Pool(pool_error),
        }
    }
}

/// Result type alias using [`FacadeError`].
pub type Result<T> = std::result::Result<T, FacadeError>;

/// State shared across every [`Client`] derived from one another via
/// [`Client::with`] — the index, the arm/start flags, and the background
/// work's own cancellation, independent of the underlying pool's.
struct Shared {
    index: BlockRootSlotIndex,
    armed: AtomicBool,
    selection_started: AtomicBool,
    early_timeout_millis: AtomicU64,
    cancel: CancellationToken,
}

/// Protocol-aware overlay over a [`beacon_pool::Client`]: beacon-API read
/// and write RPCs, plus best-attestation-data selection. `multi.Client`.
#[derive(Clone)]
pub struct Client {
    pool: beacon_pool::Client,
    spec: Spec,
    shared: Arc<Shared>,
}

impl Client {
    /// Build a facade directly from an already-connected backend set.
    /// `multi.New` with a freshly constructed `pool.Client`.
    #[must_use]
    pub fn new(spec: Spec, clients: Vec<Arc<dyn Backend>>) -> Self {
        Self::from_pool(spec, beacon_pool::Client::new(clients))
    }

    /// Build a facade over an existing [`beacon_pool::Client`], e.g. one
    /// constructed from a [`beacon_pool::BackendRegistry`]. `multi.New`.
    #[must_use]
    pub fn from_pool(spec: Spec, pool: beacon_pool::Client) -> Self {
        Self {
            pool,
            spec,
            shared: Arc::new(Shared {
                index: BlockRootSlotIndex::new(),
                armed: AtomicBool::new(false),
                selection_started: AtomicBool::new(false),
                early_timeout_millis: AtomicU64::new(0),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Number of backends currently in the pool. `multi.Client.Size`.
    pub async fn size(&self) -> usize {
        self.pool.size().await
    }

    /// Defensive snapshot of the current backend set. `multi.Client.Clients`.
    pub async fn clients(&self) -> Vec<Arc<dyn Backend>> {
        self.pool.clients().await
    }

    /// Swap the backend set wholesale. `pool.Client.SetClients`.
    pub async fn set_clients(&self, clients: Vec<Arc<dyn Backend>>) {
        self.pool.set_clients(clients).await;
    }

    /// A copy of this facade sharing the index and arm state but owning a
    /// freshly derived [`beacon_pool::Scope`]. `multi.Client.With`.
    #[must_use]
    pub fn with(&self, overrides: impl IntoIterator<Item = ScopeOverride>) -> Self {
        Self {
            pool: self.pool.with(overrides),
            spec: self.spec.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Tear down the underlying pool (calls and subscriptions) and this
    /// overlay's own background work (the purge task).
    pub fn close(&self) {
        self.shared.cancel.cancel();
        self.pool.close();
    }

    /// Initialise the best-attestation-data path (`spec.md` §4.F):
    /// subscribe to the `block` topic to populate the block-root-slot
    /// index, start the background purge task, and arm subsequent
    /// [`Client::attestation_data`] calls to run the best-selection
    /// algorithm with `early_timeout` bounding how long a reply may lag
    /// the fastest one. Calling this more than once on `Client`s sharing
    /// state is a no-op after the first call.
    pub async fn best_attestation_data_selection(&self, early_timeout: Duration) {
        if self.shared.selection_started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.early_timeout_millis.store(
            u64::try_from(early_timeout.as_millis()).unwrap_or(u64::MAX),
            Ordering::SeqCst,
        );

        let shared = self.shared.clone();
        self.pool
            .subscribe(
                vec!["block".to_string()],
                Arc::new(move |backend, event| {
                    let Some(block_event) = BlockEvent::decode(&event) else {
                        return;
                    };
                    shared.index.set(block_event.block_root, block_event.slot);
                    tracing::debug!(
                        address = %backend.address(),
                        root = %block_event.block_root,
                        slot = block_event.slot.0,
                        "observed block event"
                    );
                }),
            )
            .await;

        let shared = self.shared.clone();
        let spec = self.spec.clone();
        let cancel = self.shared.cancel.clone();
        tokio::spawn(async move {
            let clock = Clock::new(spec.clone());
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(PURGE_INTERVAL) => {}
                }
                let min_slot = clock
                    .now()
                    .slot()
                    .saturating_sub(PURGE_RETENTION_EPOCHS * spec.slots_per_epoch);
                let removed = shared.index.purge(min_slot);
                if removed > 0 {
                    tracing::info!(removed, min_slot = min_slot.0, "purged block-root-slot index");
                }
            }
        });

        self.shared.armed.store(true, Ordering::SeqCst);
    }

    /// Request unsigned attestation data for `(slot, committee_index)`.
    /// Before [`Client::best_attestation_data_selection`] is called this
    /// is a plain first-success read; afterwards it runs the
    /// best-selection algorithm across every reply.
    #[tracing::instrument(skip(self), fields(slot = slot.0, committee_index = committee_index.0))]
    pub async fn attestation_data(
        &self,
        slot: Slot,
        committee_index: CommitteeIndex,
    ) -> Result<AttestationData> {
        if self.shared.armed.load(Ordering::SeqCst) {
            self.best_attestation_data(slot, committee_index).await
        } else {
            self.run_read(move |backend| async move {
                backend.attestation_data(slot, committee_index).await
            })
            .await
        }
    }

    async fn best_attestation_data(
        &self,
        slot: Slot,
        committee_index: CommitteeIndex,
    ) -> Result<AttestationData> {
        let early_timeout =
            Duration::from_millis(self.shared.early_timeout_millis.load(Ordering::SeqCst));
        let best: Arc<Mutex<Option<(AttestationData, Slot)>>> = Arc::new(Mutex::new(None));
        let timer_armed = Arc::new(AtomicBool::new(false));
        let early_cancel = CancellationToken::new();
        // All selected backends are queried in parallel, not just one
        // (`spec.md` §4.F step 3: "Run the engine with firstSuccess =
        // false so all selected backends are queried in parallel").
        let broadcast = self.pool.with([
            ScopeOverride::Select(beacon_pool::scope::select_all()),
            ScopeOverride::FirstSuccess(false),
        ]);

        let best_for_closure = best.clone();
        let timer_armed_for_closure = timer_armed.clone();
        let early_cancel_for_closure = early_cancel.clone();
        let shared = self.shared.clone();

        let result = broadcast
            .call_with_cancel(early_cancel.clone(), move |backend| {
                let best = best_for_closure.clone();
                let timer_armed = timer_armed_for_closure.clone();
                let early_cancel = early_cancel_for_closure.clone();
                let shared = shared.clone();
                async move {
                    let data = backend.attestation_data(slot, committee_index).await?;
                    let derived_slot = shared.index.get(data.beacon_block_root).unwrap_or(Slot(0));
                    {
                        let mut guard = best.lock().await;
                        let swap = match guard.as_ref() {
                            None => true,
                            Some((_, current_best_slot)) => derived_slot > *current_best_slot,
                        };
                        if swap {
                            if let Some((previous_data, previous_slot)) = guard.as_ref() {
                                tracing::debug!(
                                    derived_slot = derived_slot.0,
                                    previous_slot = previous_slot.0,
                                    root = %data.beacon_block_root,
                                    previous_root = %previous_data.beacon_block_root,
                                    "selected better attestation candidate"
                                );
                            }
                            *guard = Some((data, derived_slot));
                        }
                    }
                    if !timer_armed.swap(true, Ordering::SeqCst) {
                        let early_cancel = early_cancel.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(early_timeout).await;
                            early_cancel.cancel();
                        });
                    }
                    Ok(())
                }
            })
            .await;

        // Partial success is acceptable: a non-empty best candidate wins
        // even if the engine itself returned an error (`spec.md` §4.F
        // step 3, "surface it, ignoring engine errors").
        if let Some((data, _)) = best.lock().await.take() {
            return Ok(data);
        }
        match result {
            Ok(()) => Err(FacadeError::EmptyResponse),
            Err(error) => Err(FacadeError::from_engine(error)),
        }
    }

    /// Fetch the network parameter map exposed by the pool.
    pub async fn spec(&self) -> Result<BTreeMap<String, String>> {
        self.run_read(|backend| async move { backend.spec().await }).await
    }

    /// Fetch genesis metadata.
    pub async fn genesis(&self) -> Result<Genesis> {
        self.run_read(|backend| async move { backend.genesis().await }).await
    }

    /// Resolve a block identifier to its root.
    pub async fn beacon_block_root(&self, block_id: &str) -> Result<Root> {
        let block_id = block_id.to_string();
        self.run_read(move |backend| {
            let block_id = block_id.clone();
            async move { backend.beacon_block_root(&block_id).await }
        })
        .await
    }

    /// Fetch a signed beacon block by identifier.
    pub async fn signed_beacon_block(&self, block_id: &str) -> Result<SignedBeaconBlock> {
        let block_id = block_id.to_string();
        self.run_read(move |backend| {
            let block_id = block_id.clone();
            async move { backend.signed_beacon_block(&block_id).await }
        })
        .await
    }

    /// Fetch a beacon-block header summary by identifier.
    pub async fn beacon_block_header(&self, block_id: &str) -> Result<BlockHeader> {
        let block_id = block_id.to_string();
        self.run_read(move |backend| {
            let block_id = block_id.clone();
            async move { backend.beacon_block_header(&block_id).await }
        })
        .await
    }

    /// Derive the signature domain for `(domain_type, epoch)`.
    pub async fn domain(&self, domain_type: DomainType, epoch: Epoch) -> Result<Domain> {
        self.run_read(move |backend| async move { backend.domain(domain_type, epoch).await })
            .await
    }

    /// Look up validators at `state_id` by registry index.
    pub async fn validators(
        &self,
        state_id: &str,
        indices: &[ValidatorIndex],
    ) -> Result<HashMap<ValidatorIndex, Validator>> {
        let state_id = state_id.to_string();
        let indices = indices.to_vec();
        self.run_read(move |backend| {
            let state_id = state_id.clone();
            let indices = indices.clone();
            async move { backend.validators(&state_id, &indices).await }
        })
        .await
    }

    /// Proposer-duty assignments for `epoch`, restricted to `indices`.
    pub async fn proposer_duties(
        &self,
        epoch: Epoch,
        indices: &[ValidatorIndex],
    ) -> Result<Vec<ProposerDuty>> {
        let indices = indices.to_vec();
        self.run_read(move |backend| {
            let indices = indices.clone();
            async move { backend.proposer_duties(epoch, &indices).await }
        })
        .await
    }

    /// Attester-duty assignments for `epoch`, restricted to `indices`.
    pub async fn attester_duties(
        &self,
        epoch: Epoch,
        indices: &[ValidatorIndex],
    ) -> Result<Vec<AttesterDuty>> {
        let indices = indices.to_vec();
        self.run_read(move |backend| {
            let indices = indices.clone();
            async move { backend.attester_duties(epoch, &indices).await }
        })
        .await
    }

    /// Sync-committee duty assignments for `epoch`, restricted to `indices`.
    pub async fn sync_committee_duties(
        &self,
        epoch: Epoch,
        indices: &[ValidatorIndex],
    ) -> Result<Vec<SyncCommitteeDuty>> {
        let indices = indices.to_vec();
        self.run_read(move |backend| {
            let indices = indices.clone();
            async move { backend.sync_committee_duties(epoch, &indices).await }
        })
        .await
    }

    /// Request an unsigned beacon-block proposal for `slot`.
    pub async fn proposal(
        &self,
        slot: Slot,
        randao_reveal: &[u8],
        graffiti: &[u8],
    ) -> Result<BeaconBlockProposal> {
        let randao_reveal = randao_reveal.to_vec();
        let graffiti = graffiti.to_vec();
        self.run_read(move |backend| {
            let randao_reveal = randao_reveal.clone();
            let graffiti = graffiti.clone();
            async move { backend.proposal(slot, &randao_reveal, &graffiti).await }
        })
        .await
    }

    /// Request an unsigned blinded beacon-block proposal for `slot`.
    pub async fn blinded_proposal(
        &self,
        slot: Slot,
        randao_reveal: &[u8],
        graffiti: &[u8],
    ) -> Result<BeaconBlockProposal> {
        let randao_reveal = randao_reveal.to_vec();
        let graffiti = graffiti.to_vec();
        self.run_read(move |backend| {
            let randao_reveal = randao_reveal.clone();
            let graffiti = graffiti.clone();
            async move { backend.blinded_proposal(slot, &randao_reveal, &graffiti).await }
        })
        .await
    }

    /// Fetch the aggregate attestation for `(slot, attestation_data_root)`.
    pub async fn aggregate_attestation(
        &self,
        slot: Slot,
        attestation_data_root: Root,
    ) -> Result<Attestation> {
        self.run_read(move |backend| async move {
            backend.aggregate_attestation(slot, attestation_data_root).await
        })
        .await
    }

    /// Fetch a sync-committee contribution.
    pub async fn sync_committee_contribution(
        &self,
        slot: Slot,
        subcommittee_index: u64,
        beacon_block_root: Root,
    ) -> Result<SyncCommitteeContribution> {
        self.run_read(move |backend| async move {
            backend
                .sync_committee_contribution(slot, subcommittee_index, beacon_block_root)
                .await
        })
        .await
    }

    /// Submit a signed beacon block to every selected backend.
    pub async fn submit_proposal(&self, block: &SignedBeaconBlock) -> Result<()> {
        let block = block.clone();
        self.run_write(move |backend| {
            let block = block.clone();
            async move { backend.submit_proposal(&block).await }
        })
        .await
    }

    /// Submit a signed blinded beacon block to every selected backend.
    pub async fn submit_blinded_proposal(&self, block: &SignedBeaconBlock) -> Result<()> {
        let block = block.clone();
        self.run_write(move |backend| {
            let block = block.clone();
            async move { backend.submit_blinded_proposal(&block).await }
        })
        .await
    }

    /// Submit beacon-committee subscriptions, broadcast to every selected
    /// backend (`spec.md` §4.F).
    pub async fn submit_beacon_committee_subscriptions(
        &self,
        subscriptions: &[BeaconCommitteeSubscription],
    ) -> Result<()> {
        let subscriptions = subscriptions.to_vec();
        self.run_write(move |backend| {
            let subscriptions = subscriptions.clone();
            async move { backend.submit_beacon_committee_subscriptions(&subscriptions).await }
        })
        .await
    }

    /// Submit signed attestations, broadcast to every selected backend
    /// (`spec.md` §4.F).
    pub async fn submit_attestations(&self, attestations: &[Attestation]) -> Result<()> {
        let attestations = attestations.to_vec();
        self.run_write(move |backend| {
            let attestations = attestations.clone();
            async move { backend.submit_attestations(&attestations).await }
        })
        .await
    }

    /// Submit signed aggregate-and-proofs, broadcast to every selected
    /// backend (`spec.md` §4.F).
    pub async fn submit_aggregate_attestations(
        &self,
        aggregates: &[SignedAggregateAndProof],
    ) -> Result<()> {
        let aggregates = aggregates.to_vec();
        self.run_write(move |backend| {
            let aggregates = aggregates.clone();
            async move { backend.submit_aggregate_attestations(&aggregates).await }
        })
        .await
    }

    /// Submit sync-committee subnet subscriptions, broadcast to every
    /// selected backend (`spec.md` §4.F).
    pub async fn submit_sync_committee_subscriptions(
        &self,
        subscriptions: &[SyncCommitteeSubscription],
    ) -> Result<()> {
        let subscriptions = subscriptions.to_vec();
        self.run_write(move |backend| {
            let subscriptions = subscriptions.clone();
            async move { backend.submit_sync_committee_subscriptions(&subscriptions).await }
        })
        .await
    }

    /// Submit sync-committee messages, broadcast to every selected
    /// backend.
    pub async fn submit_sync_committee_messages(
        &self,
        messages: &[SyncCommitteeMessage],
    ) -> Result<()> {
        let messages = messages.to_vec();
        self.run_write(move |backend| {
            let messages = messages.clone();
            async move { backend.submit_sync_committee_messages(&messages).await }
        })
        .await
    }

    /// Submit signed contribution-and-proofs, broadcast to every selected
    /// backend.
    pub async fn submit_sync_committee_contributions(
        &self,
        contributions: &[SignedContributionAndProof],
    ) -> Result<()> {
        let contributions = contributions.to_vec();
        self.run_write(move |backend| {
            let contributions = contributions.clone();
            async move { backend.submit_sync_committee_contributions(&contributions).await }
        })
        .await
    }

    /// Submit validator registrations for an external block builder,
    /// broadcast to every selected backend.
    pub async fn submit_validator_registrations(
        &self,
        registrations: &[SignedValidatorRegistration],
    ) -> Result<()> {
        let registrations = registrations.to_vec();
        self.run_write(move |backend| {
            let registrations = registrations.clone();
            async move { backend.submit_validator_registrations(&registrations).await }
        })
        .await
    }

    /// Submit proposer preparations, broadcast to every selected backend.
    pub async fn submit_proposal_preparations(
        &self,
        preparations: &[ProposalPreparation],
    ) -> Result<()> {
        let preparations = preparations.to_vec();
        self.run_write(move |backend| {
            let preparations = preparations.clone();
            async move { backend.submit_proposal_preparations(&preparations).await }
        })
        .await
    }

    /// Run `per_backend` under the pool's current scope, returning the
    /// first typed success. A [`CallError::NotFound`] observed from any
    /// attempt is surfaced as [`FacadeError::BlockNotFound`] even if the
    /// engine as a whole later reports [`EngineError::Pool`].
    async fn run_read<T, F, Fut>(&self, per_backend: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = beacon_client::Result<T>> + Send + 'static,
    {
        let slot: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
        let not_found = Arc::new(AtomicBool::new(false));

        let slot_for_closure = slot.clone();
        let not_found_for_closure = not_found.clone();
        let result = self
            .pool
            .call(move |backend| {
                let attempt = per_backend(backend);
                let slot = slot_for_closure.clone();
                let not_found = not_found_for_closure.clone();
                async move {
                    match attempt.await {
                        Ok(value) => {
                            *slot.lock().await = Some(value);
                            Ok(())
                        }
                        Err(CallError::NotFound) => {
                            not_found.store(true, Ordering::SeqCst);
                            Err(CallError::NotFound)
                        }
                        Err(error) => Err(error),
                    }
                }
            })
            .await;

        if let Some(value) = slot.lock().await.take() {
            return Ok(value);
        }
        match result {
            Ok(()) => Err(FacadeError::EmptyResponse),
            Err(EngineError::NoClientsSelected) => Err(FacadeError::NoClientsSelected),
            Err(EngineError::Pool(pool_error)) => {
                if not_found.load(Ordering::SeqCst) {
                    Err(FacadeError::BlockNotFound)
                } else {
                    Err(FacadeError::Pool(pool_error))
                }
            }
        }
    }

    /// Run `per_backend` against every selected backend regardless of
    /// success (`firstSuccess = false`), the broadcast shape every write
    /// RPC uses (`spec.md` §4.F).
    async fn run_write<F, Fut>(&self, per_backend: F) -> Result<()>
    where
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = beacon_client::Result<()>> + Send + 'static,
    {
        let broadcast = self.pool.with([ScopeOverride::FirstSuccess(false)]);
        broadcast.call(per_backend).await.map_err(FacadeError::from_engine)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use beacon_spec::Network;

    use super::*;

    struct Stub {
        address: String,
        header: Option<BlockHeader>,
    }

    #[async_trait]
    impl Backend for Stub {
        fn name(&self) -> &str {
            "stub"
        }
        fn address(&self) -> &str {
            &self.address
        }
        async fn beacon_block_header(&self, _block_id: &str) -> beacon_client::Result<BlockHeader> {
            self.header.ok_or(CallError::NotFound)
        }
    }

    fn spec() -> Spec {
        Spec::for_network(Network::Mainnet)
    }

    #[tokio::test]
    async fn plain_read_returns_first_success() {
        let backend: Arc<dyn Backend> = Arc::new(Stub {
            address: "a".into(),
            header: Some(BlockHeader {
                root: Root::ZERO,
                slot: Slot(1),
                proposer_index: ValidatorIndex(0),
                parent_root: Root::ZERO,
                state_root: Root::ZERO,
            }),
        });
        let client = Client::new(spec(), vec![backend]);
        let header = client.beacon_block_header("head").await.unwrap();
        assert_eq!(header.slot, Slot(1));
    }

    #[tokio::test]
    async fn not_found_surfaces_as_block_not_found() {
        let backend: Arc<dyn Backend> = Arc::new(Stub { address: "a".into(), header: None });
        let client = Client::new(spec(), vec![backend]);
        let error = client.beacon_block_header("head").await.unwrap_err();
        assert!(matches!(error, FacadeError::BlockNotFound));
    }

    #[tokio::test]
    async fn with_shares_index_but_derives_fresh_scope() {
        let backend: Arc<dyn Backend> = Arc::new(Stub { address: "a".into(), header: None });
        let client = Client::new(spec(), vec![backend]);
        let derived = client.with([ScopeOverride::Concurrency(2)]);
        assert_eq!(derived.size().await, 1);
    }
}
