use rloc_core::math::Real;

/// Observer of estimation progress.
///
/// All notifications are best-effort, fired synchronously from the
/// thread running `estimate()`, and carry no control-flow
/// significance. Callbacks receive event data only — they cannot reach
/// back into the running estimator, and must not try to mutate it
/// through shared state; any setter called on it during a run fails
/// with a locked error.
pub trait EstimateListener {
    /// Estimation is about to start.
    fn on_estimate_start(&mut self) {}
    /// Estimation finished (successfully or not).
    fn on_estimate_end(&mut self) {}
    /// A consensus iteration started (1-based).
    fn on_iteration(&mut self, _iteration: usize) {}
    /// Progress over the current iteration budget changed, in `[0, 1]`.
    fn on_progress(&mut self, _progress: Real) {}
}
