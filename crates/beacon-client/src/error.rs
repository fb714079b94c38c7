//! Error taxonomy for backend calls (`spec.md` §7).

use thiserror::Error;

/// Result type alias using [`CallError`].
pub type Result<T> = std::result::Result<T, CallError>;

/// Errors a single per-backend call attempt can terminate with.
///
/// # Categories
///
/// | Variant | Retried? | Typical cause |
/// |---|---|---|
/// | [`BackendUnavailable`](Self::BackendUnavailable) | only if `Scope.retry` opts in | capability absent, backend declined |
/// | [`NotFound`](Self::NotFound) | never | well-defined "absent" response (e.g. unknown block) |
/// | [`Transient`](Self::Transient) | per `Scope.retry` | timeout, connection error, 5xx, unmapped |
/// | [`EmptyResponse`](Self::EmptyResponse) | per `Scope.retry` | success status, no body |
/// | [`Cancelled`](Self::Cancelled) | never (not a failure) | caller or sibling cancellation |
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CallError {
    /// The backend does not implement this capability, or declined the call.
    #[error("{backend}: call not supported: {operation}")]
    BackendUnavailable {
        /// Address of the backend that declined.
        backend: String,
        /// Name of the operation that was not supported.
        operation: String,
    },

    /// A well-defined "absent" response — most commonly a block lookup
    /// that resolved to "no such block". Maps to the domain sentinel
    /// `BlockNotFound`. Other backends are likely to agree, so this is
    /// never retried.
    #[error("not found")]
    NotFound,

    /// Timeout, connection error, 5xx, or any unmapped backend error.
    #[error("transient error: {0}")]
    Transient(String),

    /// The backend returned success with no body. Treated as transient.
    #[error("empty response")]
    EmptyResponse,

    /// The call was cancelled by the caller or by a sibling attempt
    /// succeeding under `firstSuccess`. Not a failure: engines must not
    /// surface this as an attempt error in the final `PoolError`.
    #[error("cancelled")]
    Cancelled,
}

impl CallError {
    /// Build a [`CallError::BackendUnavailable`] for `operation` on `backend`.
    #[must_use]
    pub fn unavailable(backend: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            operation: operation.into(),
        }
    }

    /// Build a [`CallError::Transient`] wrapping an arbitrary message.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Whether the call engine's default retry consultation should even
    /// consider retrying this error. `Scope.retry` is still consulted and
    /// may refuse regardless; this only vetoes retrying errors that are
    /// retried in fact would never succeed (`shouldRetryError` in the
    /// original `pool/call.go`).
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    /// Whether this error represents the well-defined "block not found"
    /// sentinel, surfaced even through the best-selection path so callers
    /// can distinguish genuine absence from pool failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Whether this error is a caller/sibling-initiated cancellation
    /// rather than a genuine failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_never_retriable() {
        assert!(!CallError::NotFound.is_retriable());
    }

    #[test]
    fn other_variants_are_retriable_by_default() {
        assert!(CallError::transient("timeout").is_retriable());
        assert!(CallError::EmptyResponse.is_retriable());
        assert!(CallError::unavailable("http://a", "events").is_retriable());
        assert!(CallError::Cancelled.is_retriable());
    }

    #[test]
    fn is_not_found_matches_only_not_found() {
        assert!(CallError::NotFound.is_not_found());
        assert!(!CallError::EmptyResponse.is_not_found());
    }

    #[test]
    fn is_cancelled_matches_only_cancelled() {
        assert!(CallError::Cancelled.is_cancelled());
        assert!(!CallError::NotFound.is_cancelled());
    }
}
