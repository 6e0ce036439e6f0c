//! Threshold-scored consensus loops: RANSAC, MSAC and PROSAC.
//!
//! All three share the same accept/score skeleton; they differ in the
//! candidate score (inlier count with RMS tie-break vs capped total
//! cost) and in the sampler (uniform vs quality-progressive).

use super::sampling::Sampler;
use super::{
    adaptive_iteration_bound, Estimator, ProgressTracker, RobustEvent, RobustMethod,
    RobustOptions, RobustResult,
};
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

    let mut sampler = if method == RobustMethod::Prosac {
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
    let thresh = opts.threshold;
    let mut sample = Vec::with_capacity(subset_size);
    let mut mask = vec![false; num_data];
    let mut progress = ProgressTracker::new(opts.progress_delta);

    let mut dynamic_max = opts.max_iterations;
    let mut iterations = 0usize;
    while iterations < dynamic_max {
        iterations += 1;
        progress.step(iterations, dynamic_max, events);

        sampler.draw(&mut rng, subset_size, &mut sample);
        let Some(model) = estimator.fit(data, &sample) else {
            continue;
        };

        mask.fill(false);
        let mut inlier_count = 0usize;
        let mut inlier_sq_sum = 0.0;
        let mut capped_cost = 0.0;
        for (i, datum) in data.iter().enumerate() {
            let r = estimator.residual(&model, datum);
            if r < thresh {
                mask[i] = true;
                inlier_count += 1;
                inlier_sq_sum += r * r;
            }
            capped_cost += (r * r).min(thresh * thresh);
        }

        let score = match method {
            RobustMethod::Msac => capped_cost,
            _ => {
                if inlier_count > 0 {
                    (inlier_sq_sum / inlier_count as Real).sqrt()
                } else {
                    Real::INFINITY
                }
            }
        };

        let better = match method {
            RobustMethod::Msac => best.model.is_none() || score < best.best_score,
            _ => {
                best.model.is_none()
                    || inlier_count > best.num_inliers
                    || (inlier_count == best.num_inliers && score < best.best_score)
            }
        };

        if better {
            best.model = Some(model);
            best.num_inliers = inlier_count;
            best.best_score = score;
            best.inliers.copy_from_slice(&mask);

            let inlier_ratio = inlier_count as Real / num_data as Real;
            dynamic_max = adaptive_iteration_bound(
                opts.confidence,
                inlier_ratio,
                subset_size,
                iterations,
                opts.max_iterations,
            );
        }
    }

    best.iterations = iterations;
    best
}
