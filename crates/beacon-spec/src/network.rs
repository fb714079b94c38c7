//! Network parameter tables and the pure [`Spec`] helpers over them.
//!
//! Values are copied verbatim from the four networks this client is
//! known to support; adding a network means adding one [`Spec`]
//! constructor, nothing else.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::slot::{CommitteeIndex, Epoch, Slot, SubnetId};

/// BLS domain-type discriminator (4 bytes, no cryptographic meaning here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DomainType(pub [u8; 4]);

/// Fork-version discriminator (4 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Version(pub [u8; 4]);

/// Domain-type constants, shared across all four networks (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Domains {
    /// `beacon_proposer` domain type.
    pub beacon_proposer: DomainType,
    /// `beacon_attester` domain type.
    pub beacon_attester: DomainType,
    /// `randao` domain type.
    pub randao: DomainType,
    /// `deposit` domain type.
    pub deposit: DomainType,
    /// `voluntary_exit` domain type.
    pub voluntary_exit: DomainType,
    /// `selection_proof` domain type.
    pub selection_proof: DomainType,
    /// `aggregate_and_proof` domain type.
    pub aggregate_and_proof: DomainType,
    /// `sync_committee` domain type.
    pub sync_committee: DomainType,
    /// `sync_committee_selection_proof` domain type.
    pub sync_committee_selection_proof: DomainType,
    /// `contribution_and_proof` domain type.
    pub contribution_and_proof: DomainType,
    /// `application_mask` domain type.
    pub application_mask: DomainType,
    /// `application_builder` domain type.
    pub application_builder: DomainType,
}

const DOMAINS: Domains = Domains {
    beacon_proposer: DomainType([0, 0, 0, 0]),
    beacon_attester: DomainType([1, 0, 0, 0]),
    randao: DomainType([2, 0, 0, 0]),
    deposit: DomainType([3, 0, 0, 0]),
    voluntary_exit: DomainType([4, 0, 0, 0]),
    selection_proof: DomainType([5, 0, 0, 0]),
    aggregate_and_proof: DomainType([6, 0, 0, 0]),
    sync_committee: DomainType([7, 0, 0, 0]),
    sync_committee_selection_proof: DomainType([8, 0, 0, 0]),
    contribution_and_proof: DomainType([9, 0, 0, 0]),
    application_mask: DomainType([0, 0, 0, 1]),
    application_builder: DomainType([0, 0, 0, 1]),
};

/// One of the four beacon-chain networks this client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Network {
    /// Ethereum mainnet.
    Mainnet,
    /// Holesky testnet.
    Holesky,
    /// Sepolia testnet.
    Sepolia,
    /// Hoodi testnet.
    Hoodi,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mainnet => "mainnet",
            Self::Holesky => "holesky",
            Self::Sepolia => "sepolia",
            Self::Hoodi => "hoodi",
        };
        write!(f, "{name}")
    }
}

/// Immutable snapshot of one network's beacon-chain configuration.
///
/// Constructed from one of the four built-in [`Network`]s, or directly
/// via struct literal for a custom/devnet configuration — there is no
/// config-file or environment-variable loader here (that surface is an
/// explicit non-goal of the core).
#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    /// Which network this is.
    pub network: Network,
    /// Wall-clock time of slot 0.
    pub genesis_time: DateTime<Utc>,
    /// Slot number at genesis (normally 0).
    pub genesis_slot: Slot,
    /// Genesis fork version.
    pub genesis_fork_version: Version,

    /// Slots per epoch (32 on all four networks).
    pub slots_per_epoch: u64,
    /// Seconds per slot (12 on all four networks).
    pub seconds_per_slot: u64,

    /// Maximum committees per slot.
    pub max_committees_per_slot: u64,
    /// Target validators per committee.
    pub target_committee_size: u64,
    /// Target aggregators per committee.
    pub target_aggregators_per_committee: u64,
    /// Number of attestation gossip subnets.
    pub attestation_subnet_count: u64,
    /// Maximum slots an attestation may propagate for.
    pub attestation_propagation_slot_range: u64,

    /// Number of validators in a sync committee.
    pub sync_committee_size: u64,
    /// Target aggregators per sync subcommittee.
    pub target_aggregators_per_sync_subcommittee: u64,
    /// Number of sync-committee gossip subnets.
    pub sync_committee_subnet_count: u64,
    /// Epochs per sync-committee period.
    pub epochs_per_sync_committee_period: u64,

    /// Epoch of the Altair fork (0 if active at genesis).
    pub altair_fork_epoch: u64,
    /// Epoch of the Bellatrix fork (0 if active at genesis).
    pub bellatrix_fork_epoch: u64,

    /// BLS domain-type constants.
    pub domains: Domains,
}

impl Spec {
    /// Build the [`Spec`] for a known [`Network`].
    #[must_use]
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Holesky => Self::holesky(),
            Network::Sepolia => Self::sepolia(),
            Network::Hoodi => Self::hoodi(),
        }
    }

    /// Ethereum mainnet parameters.
    #[must_use]
    pub fn mainnet() -> Self {
        Self::base(
            Network::Mainnet,
            1_606_824_023,
            Version([0x0, 0x0, 0x0, 0x0]),
            74_240,
            144_896,
        )
    }

    /// Holesky testnet parameters.
    #[must_use]
    pub fn holesky() -> Self {
        Self::base(
            Network::Holesky,
            1_695_902_400,
            Version([0x01, 0x01, 0x70, 0x00]),
            0,
            0,
        )
    }

    /// Sepolia testnet parameters.
    #[must_use]
    pub fn sepolia() -> Self {
        Self::base(
            Network::Sepolia,
            1_655_733_600,
            Version([0x90, 0x0, 0x0, 0x69]),
            50,
            100,
        )
    }

    /// Hoodi testnet parameters.
    #[must_use]
    pub fn hoodi() -> Self {
        Self::base(
            Network::Hoodi,
            1_742_213_400,
            Version([0x10, 0x00, 0x09, 0x10]),
            0,
            0,
        )
    }

    #[allow(clippy::cast_possible_wrap)]
    fn base(
        network: Network,
        genesis_unix: i64,
        genesis_fork_version: Version,
        altair_fork_epoch: u64,
        bellatrix_fork_epoch: u64,
    ) -> Self {
        Self {
            network,
            // unwrap is safe: all four genesis timestamps are small positive
            // constants well within chrono's representable range.
            genesis_time: Utc.timestamp_opt(genesis_unix, 0).single().unwrap_or_else(|| {
                Utc.timestamp_opt(0, 0)
                    .single()
                    .expect("unix epoch is representable")
            }),
            genesis_slot: Slot(0),
            genesis_fork_version,
            slots_per_epoch: 32,
            seconds_per_slot: 12,
            max_committees_per_slot: 64,
            target_committee_size: 128,
            target_aggregators_per_committee: 16,
            attestation_subnet_count: 64,
            attestation_propagation_slot_range: 32,
            sync_committee_size: 512,
            target_aggregators_per_sync_subcommittee: 16,
            sync_committee_subnet_count: 4,
            epochs_per_sync_committee_period: 256,
            altair_fork_epoch,
            bellatrix_fork_epoch,
            domains: DOMAINS,
        }
    }

    /// Duration of one slot.
    #[must_use]
    pub const fn slot_duration(&self) -> Duration {
        Duration::from_secs(self.seconds_per_slot)
    }

    /// Wall-clock time at the start of `slot`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn time_at_slot(&self, slot: Slot) -> DateTime<Utc> {
        self.genesis_time + chrono::Duration::seconds((slot.0 * self.seconds_per_slot) as i64)
    }

    /// Slot containing the given wall-clock time.
    ///
    /// Returns slot 0 for any time at or before genesis.
    #[must_use]
    pub fn slot_at_time(&self, time: DateTime<Utc>) -> Slot {
        let elapsed = time.signed_duration_since(self.genesis_time);
        let secs = elapsed.num_seconds().max(0) as u64;
        Slot(secs / self.seconds_per_slot)
    }

    /// Epoch containing the given slot.
    #[must_use]
    pub const fn epoch_from_slot(&self, slot: Slot) -> Epoch {
        Epoch(slot.0 / self.slots_per_epoch)
    }

    /// First slot of the given epoch.
    #[must_use]
    pub const fn start_slot(&self, epoch: Epoch) -> Slot {
        Slot(epoch.0 * self.slots_per_epoch)
    }

    /// Last slot of the given epoch.
    #[must_use]
    pub const fn end_slot(&self, epoch: Epoch) -> Slot {
        Slot(self.start_slot(epoch).0 + self.slots_per_epoch - 1)
    }

    /// Number of committees per slot for a given active-validator count,
    /// clamped to `[1, max_committees_per_slot]`.
    #[must_use]
    pub fn committees_at_slot(&self, active_validators: u64) -> u64 {
        let n = active_validators / self.slots_per_epoch / self.target_committee_size;
        n.clamp(1, self.max_committees_per_slot)
    }

    /// Deterministic attestation-subnet derivation (`spec.md` §3/§8 invariant 5).
    ///
    /// `subnet = ((committees_per_slot * (slot mod slots_per_epoch)) + committee_index) mod attestation_subnet_count`
    #[must_use]
    pub fn attestation_subnet_id(
        &self,
        slot: Slot,
        committee_index: CommitteeIndex,
        committees_per_slot: u64,
    ) -> SubnetId {
        let slots_since_epoch_start = slot.0 % self.slots_per_epoch;
        let committees_since_epoch_start = committees_per_slot * slots_since_epoch_start;
        SubnetId((committees_since_epoch_start + committee_index.0) % self.attestation_subnet_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_at_slot_zero_is_genesis() {
        let spec = Spec::mainnet();
        assert_eq!(spec.time_at_slot(Slot(0)), spec.genesis_time);
    }

    #[test]
    fn time_at_slot_advances_by_slot_duration() {
        let spec = Spec::mainnet();
        let expected = spec.genesis_time + chrono::Duration::seconds(32 * 12);
        assert_eq!(spec.time_at_slot(Slot(32)), expected);
    }

    #[test]
    fn slot_at_time_before_genesis_clamps_to_zero() {
        let spec = Spec::mainnet();
        let before = spec.genesis_time - chrono::Duration::seconds(100);
        assert_eq!(spec.slot_at_time(before), Slot(0));
    }

    #[test]
    fn epoch_from_slot_and_start_end() {
        let spec = Spec::mainnet();
        assert_eq!(spec.epoch_from_slot(Slot(63)), Epoch(1));
        assert_eq!(spec.start_slot(Epoch(1)), Slot(32));
        assert_eq!(spec.end_slot(Epoch(1)), Slot(63));
    }

    #[test]
    fn committees_at_slot_clamps() {
        let spec = Spec::mainnet();
        assert_eq!(spec.committees_at_slot(0), 1);
        assert_eq!(spec.committees_at_slot(u64::MAX), 64);
    }

    #[test]
    fn attestation_subnet_matches_formula() {
        let spec = Spec::mainnet();
        for slot in 0u64..32 {
            for committee in 0u64..64 {
                let expected = (64 * (slot % 32) + committee) % 64;
                let got = spec.attestation_subnet_id(Slot(slot), CommitteeIndex(committee), 64);
                assert_eq!(got.0, expected);
            }
        }
    }

    /// Reproduces the literal SHA-1 fixture from `spec.md` §8 invariant 5 / scenario S5.
    #[test]
    fn attestation_subnet_hash_matches_known_fixture() {
        use std::fmt::Write as _;

        let spec = Spec::mainnet();
        let mut buf = String::new();
        for slot in 0u64..32 {
            for committee in 0u64..64 {
                let subnet = spec.attestation_subnet_id(Slot(slot), CommitteeIndex(committee), 64);
                let _ = write!(buf, "{slot},{committee},{subnet};");
            }
        }
        let digest = sha1_hex(buf.as_bytes());
        assert_eq!(digest, "95f76cfe1f07c26d2d8d775cab47c47664679637");
    }

    /// Minimal dependency-free SHA-1 implementation, used only by the test
    /// above to reproduce the fixture hash without adding a crypto crate
    /// dependency to a crate whose whole point is staying BLS/hash-free.
    fn sha1_hex(data: &[u8]) -> String {
        let mut h: [u32; 5] = [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476, 0xC3D2_E1F0];

        let ml = (data.len() as u64) * 8;
        let mut msg = data.to_vec();
        msg.push(0x80);
        while msg.len() % 64 != 56 {
            msg.push(0);
        }
        msg.extend_from_slice(&ml.to_be_bytes());

        for chunk in msg.chunks(64) {
            let mut w = [0u32; 80];
            for (i, word) in chunk.chunks(4).enumerate() {
                w[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
            }
            for i in 16..80 {
                w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
            }

            let (mut a, mut b, mut c, mut d, mut e) = (h[0], h[1], h[2], h[3], h[4]);
            for (i, word) in w.iter().enumerate() {
                let (f, k) = match i {
                    0..=19 => ((b & c) | ((!b) & d), 0x5A82_7999u32),
                    20..=39 => (b ^ c ^ d, 0x6ED9_EBA1),
                    40..=59 => ((b & c) | (b & d) | (c & d), 0x8F1B_BCDC),
                    _ => (b ^ c ^ d, 0xCA62_C1D6),
                };
                let temp = a
                    .rotate_left(5)
                    .wrapping_add(f)
                    .wrapping_add(e)
                    .wrapping_add(k)
                    .wrapping_add(*word);
                e = d;
                d = c;
                c = b.rotate_left(30);
                b = a;
                a = temp;
            }

            h[0] = h[0].wrapping_add(a);
            h[1] = h[1].wrapping_add(b);
            h[2] = h[2].wrapping_add(c);
            h[3] = h[3].wrapping_add(d);
            h[4] = h[4].wrapping_add(e);
        }

        h.iter().map(|word| format!("{word:08x}")).collect()
    }
}
