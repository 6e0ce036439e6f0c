//! Subset samplers for the consensus engine.
//!
//! Uniform sampling draws minimal subsets with equal probability.
//! Progressive sampling (PROSAC) draws from a pool of the
//! highest-quality data first and relaxes the pool following the
//! Chum–Matas growth function, falling back to uniform sampling once
//! the pool covers the whole data set.

use crate::math::Real;
use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use std::cmp::Ordering;

pub(crate) enum Sampler {
    Uniform { indices: Vec<usize> },
    Progressive(ProsacSampler),
}

impl Sampler {
    pub(crate) fn uniform(num_data: usize) -> Self {
        Sampler::Uniform {
            indices: (0..num_data).collect(),
        }
    }

    pub(crate) fn progressive(
        quality_scores: &[Real],
        subset_size: usize,
        max_iterations: usize,
    ) -> Self {
        Sampler::Progressive(ProsacSampler::new(quality_scores, subset_size, max_iterations))
    }

    pub(crate) fn draw(&mut self, rng: &mut StdRng, subset_size: usize, out: &mut Vec<usize>) {
        out.clear();
        match self {
            Sampler::Uniform { indices } => {
                out.extend(indices.choose_multiple(rng, subset_size).copied());
            }
            Sampler::Progressive(prosac) => prosac.draw(rng, out),
        }
    }
}

/// Progressive sampler state.
///
/// `order` holds data indices sorted by decreasing quality. The pool
/// `[0, n)` grows whenever the sample counter `t` passes the growth
/// schedule `t_n_prime`; within a pool, a sample is the `n`-th ranked
/// point plus `m − 1` points drawn uniformly from the `n − 1` better
/// ones.
pub(crate) struct ProsacSampler {
    order: Vec<usize>,
    subset_size: usize,
    pool: usize,
    t: usize,
    t_n: Real,
    t_n_prime: usize,
}

impl ProsacSampler {
    fn new(quality_scores: &[Real], subset_size: usize, max_iterations: usize) -> Self {
        let mut order: Vec<usize> = (0..quality_scores.len()).collect();
        order.sort_by(|&a, &b| {
            quality_scores[b]
                .partial_cmp(&quality_scores[a])
                .unwrap_or(Ordering::Equal)
        });

        // T_m = T_N * prod_{i=0..m-1} (m - i) / (N - i)
        let n_total = order.len();
        let mut t_n = max_iterations as Real;
        for i in 0..subset_size.min(n_total) {
            t_n *= (subset_size - i) as Real / (n_total - i) as Real;
        }

        Self {
            order,
            subset_size,
            pool: subset_size,
            t: 0,
            t_n,
            t_n_prime: 1,
        }
    }

    fn draw(&mut self, rng: &mut StdRng, out: &mut Vec<usize>) {
        self.t += 1;
        while self.t > self.t_n_prime && self.pool < self.order.len() {
            let next = self.t_n * (self.pool + 1) as Real / (self.pool + 1 - self.subset_size) as Real;
            self.t_n_prime += (next - self.t_n).ceil().max(1.0) as usize;
            self.t_n = next;
            self.pool += 1;
        }

        if self.pool < self.order.len() || self.t <= self.t_n_prime {
            // m - 1 points from the better-ranked part of the pool,
            // plus the n-th ranked point itself.
            out.extend(
                self.order[..self.pool - 1]
                    .choose_multiple(rng, self.subset_size - 1)
                    .copied(),
            );
            out.push(self.order[self.pool - 1]);
        } else {
            out.extend(self.order.choose_multiple(rng, self.subset_size).copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn uniform_draws_distinct_indices() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut sampler = Sampler::uniform(10);
        let mut out = Vec::new();
        for _ in 0..50 {
            sampler.draw(&mut rng, 4, &mut out);
            assert_eq!(out.len(), 4);
            let mut sorted = out.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 4, "duplicate index in {:?}", out);
            assert!(out.iter().all(|&i| i < 10));
        }
    }

    #[test]
    fn progressive_starts_with_best_ranked_points() {
        // Quality strictly decreasing with index: order == identity.
        let quality: Vec<Real> = (0..10).map(|i| 1.0 - i as Real * 0.05).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut sampler = Sampler::progressive(&quality, 3, 1000);
        let mut out = Vec::new();
        sampler.draw(&mut rng, 3, &mut out);
        // First sample comes entirely from the minimal pool of the
        // three best-ranked points.
        let mut sorted = out.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2]);
    }

    #[test]
    fn progressive_pool_grows_over_time() {
        let quality: Vec<Real> = (0..8).map(|i| 8.0 - i as Real).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let mut sampler = Sampler::progressive(&quality, 2, 100);
        let mut out = Vec::new();
        let mut max_seen = 0usize;
        for _ in 0..100 {
            sampler.draw(&mut rng, 2, &mut out);
            assert_eq!(out.len(), 2);
            max_seen = max_seen.max(*out.iter().max().unwrap());
        }
        // Low-quality points become reachable eventually.
        assert!(max_seen >= 6, "pool never grew past {}", max_seen);
    }
}
