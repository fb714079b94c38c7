//! Slot/epoch clock, grounded on `clock/clock.go` + `clock/moment.go`.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::network::Spec;
use crate::slot::{Epoch, Slot};

/// An instant of the beacon chain, expressed as a slot plus the [`Spec`]
/// needed to derive epoch/time from it.
///
/// `Spec` is cheap to clone (plain data, no interior state), so `Moment`
/// owns a copy rather than borrowing from its `Clock` — this sidesteps a
/// lifetime parameter for a type callers often hold past the `Clock`'s
/// own lifetime (e.g. across an `await` point after the clock has been
/// dropped).
#[derive(Debug, Clone, PartialEq)]
pub struct Moment {
    spec: Spec,
    slot: Slot,
}

impl Moment {
    /// The slot this moment represents.
    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    /// The epoch containing this moment's slot.
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.spec.epoch_from_slot(self.slot)
    }

    /// First slot of this moment's epoch.
    #[must_use]
    pub const fn start_slot(&self) -> Slot {
        self.spec.start_slot(self.epoch())
    }

    /// Last slot of this moment's epoch.
    #[must_use]
    pub const fn end_slot(&self) -> Slot {
        self.spec.end_slot(self.epoch())
    }

    /// Wall-clock time at the start of this moment's slot.
    #[must_use]
    pub fn time(&self) -> DateTime<Utc> {
        self.spec.time_at_slot(self.slot)
    }

    /// Signed duration from now until this moment (negative if in the past).
    #[must_use]
    pub fn until(&self) -> chrono::Duration {
        self.time().signed_duration_since(Utc::now())
    }
}

/// Slot/epoch clock over a [`Spec`].
#[derive(Debug, Clone)]
pub struct Clock {
    spec: Spec,
}

impl Clock {
    /// Build a clock over the given [`Spec`].
    #[must_use]
    pub const fn new(spec: Spec) -> Self {
        Self { spec }
    }

    /// The current moment. Shorthand for `at_time(Utc::now())`.
    #[must_use]
    pub fn now(&self) -> Moment {
        self.at_time(Utc::now())
    }

    /// The moment at the given slot.
    #[must_use]
    pub fn at_slot(&self, slot: Slot) -> Moment {
        Moment {
            spec: self.spec.clone(),
            slot,
        }
    }

    /// The moment at the start of the given epoch.
    #[must_use]
    pub fn at_epoch(&self, epoch: Epoch) -> Moment {
        self.at_slot(self.spec.start_slot(epoch))
    }

    /// The moment at the given wall-clock time.
    #[must_use]
    pub fn at_time(&self, time: DateTime<Utc>) -> Moment {
        self.at_slot(self.spec.slot_at_time(time))
    }

    /// Emit the current [`Moment`] at every slot boundary until `cancel`
    /// fires. The returned channel closes when the background task exits.
    #[must_use]
    pub fn every_slot(&self, cancel: CancellationToken) -> mpsc::Receiver<Moment> {
        let clock = self.clone();
        self.every(cancel, move |now| clock.at_slot(now.slot() + 1).time())
    }

    /// Emit the current [`Moment`] at every epoch boundary until `cancel`
    /// fires. The returned channel closes when the background task exits.
    #[must_use]
    pub fn every_epoch(&self, cancel: CancellationToken) -> mpsc::Receiver<Moment> {
        let clock = self.clone();
        self.every(cancel, move |now| {
            clock.at_epoch(Epoch(now.epoch().0 + 1)).time()
        })
    }

    fn every<F>(&self, cancel: CancellationToken, next: F) -> mpsc::Receiver<Moment>
    where
        F: Fn(&Moment) -> DateTime<Utc> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        let clock = self.clone();
        tokio::spawn(async move {
            loop {
                let target = next(&clock.now());
                let delay = (target - Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);

                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }

                if tx.send(clock.now()).await.is_err() {
                    return;
                }
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    #[test]
    fn moment_round_trips_through_time() {
        let spec = Spec::for_network(Network::Mainnet);
        let clock = Clock::new(spec);
        let moment = clock.at_slot(Slot(100));
        assert_eq!(moment.slot(), Slot(100));
        assert_eq!(clock.at_time(moment.time()).slot(), Slot(100));
    }

    #[test]
    fn epoch_boundaries_are_consistent() {
        let spec = Spec::for_network(Network::Mainnet);
        let clock = Clock::new(spec);
        let moment = clock.at_slot(Slot(40));
        assert_eq!(moment.epoch(), Epoch(1));
        assert_eq!(moment.start_slot(), Slot(32));
        assert_eq!(moment.end_slot(), Slot(63));
    }

    #[tokio::test(start_paused = true)]
    async fn every_slot_emits_and_stops_on_cancel() {
        // genesis "now" with a 1-second slot so the test doesn't depend on
        // real wall-clock phase within a 12-second mainnet slot.
        let mut spec = Spec::for_network(Network::Mainnet);
        spec.genesis_time = Utc::now();
        spec.seconds_per_slot = 1;
        let clock = Clock::new(spec);
        let cancel = CancellationToken::new();

        let mut rx = clock.every_slot(cancel.clone());

        tokio::time::advance(std::time::Duration::from_millis(1500)).await;
        let first = rx.recv().await.expect("first tick");
        assert_eq!(first.slot(), Slot(1));

        cancel.cancel();
        // Draining should terminate once the background task observes cancellation.
        while rx.recv().await.is_some() {}
    }
}
