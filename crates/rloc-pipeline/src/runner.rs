//! Shared consensus-stage driver: runs the engine with listener
//! forwarding and maps an empty result onto the error taxonomy.

use crate::config::RobustConfig;
use crate::error::EstimateError;
use crate::listener::EstimateListener;
use rloc_core::math::Real;
use rloc_core::robust::{robust_fit, Estimator, InliersData, RobustEvent};

pub(crate) fn run_consensus<E: Estimator>(
    estimator: &E,
    data: &[E::Datum],
    quality_scores: Option<&[Real]>,
    config: &RobustConfig,
    listener: &mut Option<Box<dyn EstimateListener>>,
) -> Result<(E::Model, InliersData), EstimateError> {
    let opts = config.to_options();
    let mut sink = |event: RobustEvent| {
        if let Some(listener) = listener.as_mut() {
            match event {
                RobustEvent::Iteration(iteration) => listener.on_iteration(iteration),
                RobustEvent::Progress(progress) => listener.on_progress(progress),
            }
        }
    };

    let result = robust_fit(
        config.method,
        estimator,
        data,
        quality_scores,
        &opts,
        Some(&mut sink),
    );

    let inliers = result.inliers_data();
    match result.model {
        Some(model) => {
            log::debug!(
                "consensus: {}/{} inliers after {} iterations (score {:.3e})",
                inliers.num_inliers,
                data.len(),
                result.iterations,
                inliers.best_score,
            );
            Ok((model, inliers))
        }
        None => Err(EstimateError::NoConsensus),
    }
}
