use thiserror::Error;

/// Failures that cross the pipeline boundary.
///
/// Everything else degrades in place: a failed refresh with a prior snapshot
/// serves stale data, and an unreachable cache tier reads as absent. Only a
/// cold upstream (no snapshot ever obtained) and an exhausted request budget
/// surface to callers.
#[derive(Debug, Error)]
pub enum FeeError {
    #[error("upstream fee source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("request timed out after {0} ms")]
    RequestTimeout(u64),
}
