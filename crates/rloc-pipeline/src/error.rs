use thiserror::Error;

/// Estimator error taxonomy.
///
/// Configuration errors are synchronous and leave prior state
/// untouched. `estimate()` errors leave the instance unlocked with the
/// results of an earlier successful call intact. Refinement failures
/// are never surfaced here; they silently downgrade to the unrefined
/// estimate with no covariance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    /// A setter or `estimate()` was invoked while an estimation is in
    /// progress on the same instance. Retry once it completes.
    #[error("estimator is locked by an estimation in progress")]
    Locked,
    /// Minimum reading count, required quality scores or required
    /// initial values are missing. Complete the configuration and
    /// retry.
    #[error("estimator is not ready")]
    NotReady,
    /// A setter rejected an invalid value before mutating anything.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The consensus engine could not produce any solution: every
    /// sampled subset was degenerate or the iteration budget was
    /// exhausted without a valid model.
    #[error("robust consensus did not produce a solution")]
    NoConsensus,
}
