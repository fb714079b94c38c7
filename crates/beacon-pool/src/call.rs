//! The call engine: turns one logical call into N concurrent per-backend
//! attempts with retry, timeout and first-success semantics, grounded on
//! `pool/call.go`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use beacon_client::{Backend, CallError};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::scope::Scope;

/// One record per attempt, in completion order. `pool.CallLog`.
#[derive(Debug, Clone)]
pub struct CallLog {
    /// Address of the backend this attempt was made against.
    pub backend_address: String,
    /// Index of the backend within the selected set for this call.
    pub backend_index: usize,
    /// Zero-based attempt number (0 for the first attempt on this backend).
    pub attempt: u32,
    /// When the attempt started.
    pub start: DateTime<Utc>,
    /// When the attempt completed.
    pub end: DateTime<Utc>,
    /// Error message, if the attempt failed.
    pub error: Option<String>,
}

impl fmt::Display for CallLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = if self.error.is_some() { '⨉' } else { '✓' };
        let took = (self.end - self.start)
            .to_std()
            .unwrap_or(Duration::ZERO);
        write!(
            f,
            "{icon} {} (#{} attempt) (took {took:?})",
            self.backend_address, self.attempt
        )?;
        if let Some(error) = &self.error {
            write!(f, " -> {error}")?;
        }
        Ok(())
    }
}

/// Ordered sequence of [`CallLog`]s produced by one logical call.
/// `pool.CallTrace`.
#[derive(Debug, Clone, Default)]
pub struct CallTrace(pub Vec<CallLog>);

impl CallTrace {
    /// The attempts that failed, preserving order.
    #[must_use]
    pub fn errors(&self) -> CallTrace {
        CallTrace(self.0.iter().filter(|log| log.error.is_some()).cloned().collect())
    }

    /// Number of attempts recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no attempts were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "CallTrace{{}}");
        }
        writeln!(f, "CallTrace:")?;
        for (i, log) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "\t{log}")?;
        }
        Ok(())
    }
}

/// Every selected backend exhausted its retries with an error. `pool.Error`.
#[derive(Debug, Error)]
#[error("{}", .trace.errors())]
pub struct PoolError {
    /// Full trace of every attempt made during the failed call.
    pub trace: CallTrace,
}

/// Failure of a logical call before any attempt could be made, or after
/// every selected backend was exhausted.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `Scope.select` retained no backends from the current pool.
    #[error("no clients selected")]
    NoClientsSelected,
    /// Every selected backend exhausted its retries with an error.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

struct RawLog {
    backend_index: usize,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    result: Result<(), CallError>,
}

/// Run `per_backend` against every backend selected by `scope.select` from
/// `backends`, applying `scope`'s retry/timeout/concurrency/first-success
/// policy. `pool.Client.Call` / `pool/call.go`'s `call.Do`.
///
/// `cancel` is the caller's cancellation token; a child token is derived so
/// that first-success (or caller cancellation) can stop sibling attempts
/// without the caller needing to manage that lifetime itself.
#[tracing::instrument(skip_all, fields(pool_size = backends.len(), concurrency = scope.concurrency, first_success = scope.first_success))]
pub async fn call<F, Fut>(
    cancel: &CancellationToken,
    backends: &[Arc<dyn Backend>],
    scope: &Scope,
    per_backend: F,
) -> Result<(), EngineError>
where
    F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CallError>> + Send + 'static,
{
    let predicate = (scope.select)(backends.len());
    let selected: Vec<Arc<dyn Backend>> = backends
        .iter()
        .enumerate()
        .filter(|(index, _)| predicate(*index))
        .map(|(_, backend)| backend.clone())
        .collect();
    if selected.is_empty() {
        return Err(EngineError::NoClientsSelected);
    }

    let engine_cancel = cancel.child_token();
    let queue_capacity = (2 * selected.len()).max(1);
    let (jobs_tx, jobs_rx) = async_channel::bounded::<usize>(queue_capacity);
    let (logs_tx, mut logs_rx) = mpsc::channel::<RawLog>(queue_capacity);

    for index in 0..selected.len() {
        jobs_tx
            .send(index)
            .await
            .expect("queue sized to hold every selected index up front");
    }

    let per_backend = Arc::new(per_backend);
    let worker_count = scope.concurrency.min(selected.len()).max(1);
    let mut workers = JoinSet::new();
    for _ in 0..worker_count {
        let jobs_rx = jobs_rx.clone();
        let logs_tx = logs_tx.clone();
        let selected = selected.clone();
        let per_backend = per_backend.clone();
        let timeout = scope.timeout;
        let worker_cancel = engine_cancel.clone();
        workers.spawn(async move {
            loop {
                let index = tokio::select! {
                    biased;
                    () = worker_cancel.cancelled() => return,
                    job = jobs_rx.recv() => match job {
                        Ok(index) => index,
                        Err(_) => return,
                    },
                };

                let start = Utc::now();
                let backend = selected[index].clone();
                let result = tokio::select! {
                    biased;
                    () = worker_cancel.cancelled() => Err(CallError::Cancelled),
                    result = tokio::time::timeout(timeout, per_backend(backend)) => {
                        match result {
                            Ok(result) => result,
                            Err(_) => Err(CallError::transient("call timed out")),
                        }
                    },
                };
                let end = Utc::now();

                if logs_tx
                    .send(RawLog { backend_index: index, start, end, result })
                    .await
                    .is_err()
                {
                    return;
                }
            }
        });
    }
    drop(logs_tx);
    drop(jobs_rx);

    let mut attempts = vec![0u32; selected.len()];
    let mut final_ok: Vec<Option<bool>> = vec![None; selected.len()];
    let mut trace = Vec::new();
    let mut exhausted = 0usize;
    let mut outcome = Ok(());

    'reduce: loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break 'reduce,
            raw = logs_rx.recv() => {
                let Some(raw) = raw else { break 'reduce };
                if raw.result.as_ref().err().is_some_and(CallError::is_cancelled) {
                    continue;
                }

                let attempt = attempts[raw.backend_index];
                let backend_address = selected[raw.backend_index].address().to_string();
                trace.push(CallLog {
                    backend_address,
                    backend_index: raw.backend_index,
                    attempt,
                    start: raw.start,
                    end: raw.end,
                    error: raw.result.as_ref().err().map(ToString::to_string),
                });

                match raw.result {
                    Ok(()) => {
                        if scope.first_success {
                            break 'reduce;
                        }
                        if final_ok[raw.backend_index].is_none() {
                            final_ok[raw.backend_index] = Some(true);
                            exhausted += 1;
                        }
                    }
                    Err(err) => {
                        let retry = err.is_retriable().then(|| (scope.retry)(attempt, &err));
                        if let Some((delay, true)) = retry {
                            attempts[raw.backend_index] += 1;
                            tokio::select! {
                                biased;
                                () = engine_cancel.cancelled() => break 'reduce,
                                () = tokio::time::sleep(delay) => {}
                            }
                            if jobs_tx.send(raw.backend_index).await.is_err() {
                                break 'reduce;
                            }
                            continue;
                        }
                        if final_ok[raw.backend_index].is_none() {
                            final_ok[raw.backend_index] = Some(false);
                            exhausted += 1;
                        }
                    }
                }

                if exhausted == selected.len() {
                    let all_failed = final_ok.iter().all(|status| *status == Some(false));
                    if all_failed {
                        outcome = Err(EngineError::Pool(PoolError { trace: CallTrace(trace.clone()) }));
                    }
                    break 'reduce;
                }
            }
        }
    }

    engine_cancel.cancel();
    drop(jobs_tx);
    while workers.join_next().await.is_some() {}

    if let Some(trace_fn) = &scope.trace {
        trace_fn(&CallTrace(trace));
    }

    outcome
}
