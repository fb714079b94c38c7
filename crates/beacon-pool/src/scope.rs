//! [`Scope`]: the per-call policy bundle, grounded on `pool/scope.go`.
//!
//! The Go source dispatches `Scope.apply(options ...interface{})` by a
//! runtime type switch over an untyped variadic. Rust has no safe untyped
//! variadic, so [`ScopeOverride`] is a closed tagged enum instead — the
//! idiomatic analogue for a fixed set of override kinds (`spec.md` §9's
//! "option-value dispatch" design note). Unlike the Go source, unknown
//! variants simply cannot be represented; see `DESIGN.md` for why that
//! deviation from "ignore unknown variant" forward-compatibility is an
//! acceptable trade in a closed-world enum.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use beacon_client::CallError;

use crate::call::CallTrace;

/// A per-index predicate produced by a [`SelectFn`] for one call.
pub type SelectPredicate = Arc<dyn Fn(usize) -> bool + Send + Sync>;

/// Decides, given the pool size, which backend indices participate in a call.
pub type SelectFn = Arc<dyn Fn(usize) -> SelectPredicate + Send + Sync>;

/// Decides whether to retry a failed attempt, and after what delay.
///
/// `attempt` is the zero-based attempt number that just failed (0 for the
/// first attempt). Returning `(_, false)` marks the backend exhausted.
pub type RetryFn = Arc<dyn Fn(u32, &CallError) -> (Duration, bool) + Send + Sync>;

/// Receives the full [`CallTrace`] after every logical call, success or failure.
pub type TraceFn = Arc<dyn Fn(&CallTrace) + Send + Sync>;

/// One overridable [`Scope`] field, tagged by which field it replaces.
///
/// `Scope::with` folds a sequence of these over a base `Scope`. There is no
/// "unknown" variant to ignore, unlike the Go source's type-switch default
/// case — every variant here corresponds to exactly one `Scope` field.
pub enum ScopeOverride {
    /// Replace `Scope::select`.
    Select(SelectFn),
    /// Replace `Scope::retry`.
    Retry(RetryFn),
    /// Replace `Scope::timeout`.
    Timeout(Duration),
    /// Replace `Scope::concurrency`. Values below 1 are clamped to 1.
    Concurrency(usize),
    /// Replace `Scope::first_success`.
    FirstSuccess(bool),
    /// Replace `Scope::trace`. `None` clears the trace sink.
    Trace(Option<TraceFn>),
}

/// Immutable per-call policy: selection, retry, timeout, concurrency,
/// first-success semantics, and an optional trace sink (`spec.md` §3).
///
/// `Scope` holds no interior mutability — deriving one via [`Scope::with`]
/// is a cheap value copy that cannot leak overrides back to the parent,
/// matching "Scope is copied on every `With(...)` override" from `spec.md`
/// §3's ownership notes.
#[derive(Clone)]
pub struct Scope {
    /// Backend-selection policy for this call.
    pub select: SelectFn,
    /// Retry policy for a failed attempt.
    pub retry: RetryFn,
    /// Per-attempt timeout; bounds exactly one backend invocation.
    pub timeout: Duration,
    /// Maximum number of concurrent workers.
    pub concurrency: usize,
    /// Whether the call returns as soon as one backend succeeds.
    pub first_success: bool,
    /// Optional sink invoked with the full trace after every call.
    pub trace: Option<TraceFn>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("timeout", &self.timeout)
            .field("concurrency", &self.concurrency)
            .field("first_success", &self.first_success)
            .field("trace", &self.trace.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Scope {
    /// Select one random backend, retry every 50ms up to 2 times (3
    /// attempts total), 30s per-attempt timeout, concurrency 4,
    /// first-success enabled, no trace sink — `pool.DefaultScope()`.
    fn default() -> Self {
        Self {
            select: select_one_random(),
            retry: retry_every_limit(Duration::from_millis(50), 2),
            timeout: Duration::from_secs(30),
            concurrency: 4,
            first_success: true,
            trace: None,
        }
    }
}

impl Scope {
    /// Fold `overrides` over a clone of `self`, in order, returning a new
    /// `Scope`. `self` is left unchanged (`spec.md` §8 invariant 2).
    #[must_use]
    pub fn with(&self, overrides: impl IntoIterator<Item = ScopeOverride>) -> Self {
        let mut scope = self.clone();
        for override_ in overrides {
            match override_ {
                ScopeOverride::Select(select) => scope.select = select,
                ScopeOverride::Retry(retry) => scope.retry = retry,
                ScopeOverride::Timeout(timeout) => scope.timeout = timeout,
                ScopeOverride::Concurrency(concurrency) => scope.concurrency = concurrency.max(1),
                ScopeOverride::FirstSuccess(first_success) => scope.first_success = first_success,
                ScopeOverride::Trace(trace) => scope.trace = trace,
            }
        }
        scope
    }
}

/// Select every backend in the pool. `pool.SelectAll`.
#[must_use]
pub fn select_all() -> SelectFn {
    Arc::new(|_size| Arc::new(|_index| true))
}

/// Select exactly one uniformly random backend. `pool.SelectRandom`.
#[must_use]
pub fn select_one_random() -> SelectFn {
    Arc::new(|size| {
        let chosen = if size == 0 { 0 } else { rand::random_range(0..size) };
        Arc::new(move |index| index == chosen)
    })
}

/// Select `count` distinct uniformly random backends (all of them if
/// `count >= size`). `pool.SelectRandoms`.
#[must_use]
pub fn select_k_random(count: usize) -> SelectFn {
    Arc::new(move |size| {
        if count >= size {
            return select_all()(size);
        }
        use rand::seq::SliceRandom;
        let mut indices: Vec<usize> = (0..size).collect();
        indices.shuffle(&mut rand::rng());
        let chosen: std::collections::HashSet<usize> = indices.into_iter().take(count).collect();
        Arc::new(move |index| chosen.contains(&index))
    })
}

/// Select `count` consecutive backends starting at a random offset, wrapping
/// modulo the pool size (all of them if `count >= size`). Useful for
/// guaranteeing coverage across an interleaved heterogeneous pool (e.g.
/// `[Lighthouse, Prysm, Lighthouse, Prysm]`). `pool.SelectAdjacentRandoms`.
#[must_use]
pub fn select_k_adjacent_random(count: usize) -> SelectFn {
    Arc::new(move |size| {
        if count >= size {
            return select_all()(size);
        }
        let offset = if size == 0 { 0 } else { rand::random_range(0..size) };
        Arc::new(move |index| (0..count).any(|n| (offset + n) % size == index))
    })
}

/// Retry unconditionally, waiting `every` between attempts. `pool.RetryEvery`.
#[must_use]
pub fn retry_every(every: Duration) -> RetryFn {
    Arc::new(move |_attempt, _err| (every, true))
}

/// Retry up to `limit` additional times (i.e. `limit + 1` attempts total),
/// waiting `every` between attempts. `pool.RetryEveryLimit`.
#[must_use]
pub fn retry_every_limit(every: Duration, limit: u32) -> RetryFn {
    Arc::new(move |attempt, _err| {
        if attempt >= limit {
            (Duration::ZERO, false)
        } else {
            (every, true)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_leaves_parent_unchanged() {
        let base = Scope::default();
        let base_concurrency = base.concurrency;
        let base_first_success = base.first_success;

        let derived = base.with([
            ScopeOverride::Concurrency(16),
            ScopeOverride::FirstSuccess(false),
        ]);

        assert_eq!(base.concurrency, base_concurrency);
        assert_eq!(base.first_success, base_first_success);
        assert_eq!(derived.concurrency, 16);
        assert!(!derived.first_success);
    }

    #[test]
    fn concurrency_override_is_clamped_to_at_least_one() {
        let scope = Scope::default().with([ScopeOverride::Concurrency(0)]);
        assert_eq!(scope.concurrency, 1);
    }

    #[test]
    fn select_all_selects_every_index() {
        let predicate = select_all()(5);
        assert!((0..5).all(|i| predicate(i)));
    }

    #[test]
    fn select_one_random_selects_exactly_one() {
        let predicate = select_one_random()(10);
        let selected: Vec<usize> = (0..10).filter(|i| predicate(*i)).collect();
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn select_k_random_selects_exactly_k_distinct() {
        let predicate = select_k_random(3)(10);
        let selected: Vec<usize> = (0..10).filter(|i| predicate(*i)).collect();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn select_k_random_saturates_to_all_when_k_exceeds_size() {
        let predicate = select_k_random(100)(4);
        let selected: Vec<usize> = (0..4).filter(|i| predicate(*i)).collect();
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn select_k_adjacent_random_selects_k_consecutive_wrapping() {
        let predicate = select_k_adjacent_random(3)(5);
        let selected: Vec<usize> = (0..5).filter(|i| predicate(*i)).collect();
        assert_eq!(selected.len(), 3);
        // The selected set must be some rotation of 3 consecutive indices.
        let min = *selected.iter().min().unwrap();
        let contiguous_from_min = (0..3).all(|n| selected.contains(&((min + n) % 5)));
        let wrapped = selected.iter().any(|&i| i + 3 > 5);
        assert!(contiguous_from_min || wrapped);
    }

    #[test]
    fn retry_every_limit_stops_after_limit() {
        let retry = retry_every_limit(Duration::from_millis(1), 2);
        let err = CallError::transient("boom");
        assert!(retry(0, &err).1);
        assert!(retry(1, &err).1);
        assert!(retry(2, &err).1 == false);
    }

    #[test]
    fn retry_every_never_stops() {
        let retry = retry_every(Duration::from_millis(1));
        let err = CallError::transient("boom");
        for attempt in 0..100 {
            assert!(retry(attempt, &err).1);
        }
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// `spec.md` §8 invariant 4: `bounded-every-d-up-to-N` yields at
        /// most `N + 1` `CallLog`s per backend — i.e. the retry function
        /// refuses to retry at or after attempt `N`, for any `N` and any
        /// sequence of attempt numbers fed to it in order.
        #[test]
        fn retry_every_limit_never_permits_more_than_limit_plus_one_attempts(
            limit in 0u32..20,
            every_millis in 0u64..50,
        ) {
            let retry = retry_every_limit(Duration::from_millis(every_millis), limit);
            let err = CallError::transient("boom");

            let mut attempts_made = 0u32;
            for attempt in 0..(limit + 5) {
                let (_, should_retry) = retry(attempt, &err);
                if !should_retry {
                    break;
                }
                attempts_made += 1;
            }
            // `attempt` 0..limit all retry (limit retries), attempt `limit`
            // refuses: `limit` retries + 1 initial attempt = `limit + 1` total.
            prop_assert_eq!(attempts_made, limit);
            prop_assert!(!retry(limit, &err).1);
        }
    }
}
