//! Median-scored consensus loops: LMedS and PROMedS.
//!
//! Candidates are scored by the median residual over the whole data
//! set; the smallest median wins and no user threshold is involved.
//! Inliers are derived post hoc from the robust scale estimate around
//! the winning median.

use super::sampling::Sampler;
use super::{Estimator, ProgressTracker, RobustEvent, RobustMethod, RobustOptions, RobustResult};
use crate::math::Real;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub(crate) fn run<E: Estimator>(
    method: RobustMethod,
    estimator: &E,
    data: &[E::Datum],
    quality_scores: Option<&[Real]>,
    opts: &RobustOptions,
    events: &mut dyn FnMut(RobustEvent),
) -> RobustResult<E::Model> {
    let num_data = data.len();
    let subset_size = opts.subset_size.max(estimator.min_samples());
    let mut best = RobustResult::empty(num_data);
    if subset_size == 0 || num_data < subset_size {
        return best;
    }

    let mut sampler = if method == RobustMethod::Promeds {
        match quality_scores {
            Some(q) if q.len() == num_data => {
                Sampler::progressive(q, subset_size, opts.max_iterations)
            }
            _ => return best,
        }
    } else {
        Sampler::uniform(num_data)
    };

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut sample = Vec::with_capacity(subset_size);
    let mut residuals = vec![0.0; num_data];
    let mut best_residuals = vec![0.0; num_data];
    let mut scratch = vec![0.0; num_data];
    let mut progress = ProgressTracker::new(opts.progress_delta);

    let mut iterations = 0usize;
    while iterations < opts.max_iterations {
        iterations += 1;
        progress.step(iterations, opts.max_iterations, events);

        sampler.draw(&mut rng, subset_size, &mut sample);
        let Some(model) = estimator.fit(data, &sample) else {
            continue;
        };

        for (i, datum) in data.iter().enumerate() {
            residuals[i] = estimator.residual(&model, datum);
        }
        let median = median_of(&residuals, &mut scratch);
        if !median.is_finite() {
            continue;
        }

        if best.model.is_none() || median < best.best_score {
            best.model = Some(model);
            best.best_score = median;
            best_residuals.copy_from_slice(&residuals);
        }

        // A zero median cannot be improved; the configurable stop
        // threshold ends the search once the fit is already good
        // enough.
        if best.model.is_some()
            && (best.best_score == 0.0
                || (opts.stop_threshold > 0.0 && best.best_score <= opts.stop_threshold))
        {
            break;
        }
    }

    best.iterations = iterations;

    if best.model.is_some() {
        let sigma = robust_scale(best.best_score, num_data, subset_size);
        // Floor the cutoff so an exactly-zero median (noise-free data)
        // still admits readings with float-level residuals.
        let cutoff = (opts.inlier_factor * sigma).max(1e-9);
        let mut count = 0usize;
        for (i, &r) in best_residuals.iter().enumerate() {
            if r <= cutoff {
                best.inliers[i] = true;
                count += 1;
            }
        }
        best.num_inliers = count;
    }

    best
}

/// Robust standard-deviation estimate around a winning median residual
/// (Rousseeuw & Leroy finite-sample correction).
fn robust_scale(median: Real, num_data: usize, subset_size: usize) -> Real {
    let correction = if num_data > subset_size {
        1.0 + 5.0 / (num_data - subset_size) as Real
    } else {
        1.0
    };
    1.4826 * correction * median
}

/// Upper median of `values`, computed on a scratch copy.
fn median_of(values: &[Real], scratch: &mut [Real]) -> Real {
    scratch.copy_from_slice(values);
    scratch.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    scratch[scratch.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_and_even() {
        let mut scratch = vec![0.0; 5];
        assert_eq!(median_of(&[5.0, 1.0, 3.0, 2.0, 4.0], &mut scratch), 3.0);
        let mut scratch = vec![0.0; 4];
        assert_eq!(median_of(&[4.0, 1.0, 3.0, 2.0], &mut scratch), 3.0);
    }

    #[test]
    fn robust_scale_shrinks_with_more_data() {
        let small = robust_scale(1.0, 6, 3);
        let large = robust_scale(1.0, 100, 3);
        assert!(small > large);
        assert!((large - 1.4826 * (1.0 + 5.0 / 97.0)).abs() < 1e-12);
    }
}
