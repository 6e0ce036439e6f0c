//! Non-linear least-squares fitting for emitter localization.
//!
//! This crate refines linear seeds into maximum-likelihood estimates
//! and produces parameter covariances. It exposes a small
//! [`NllsProblem`] trait with dense residual/Jacobian vectors, a
//! Levenberg–Marquardt backend ([`LmBackend`]) built on the
//! `levenberg-marquardt` crate, and the two concrete localization
//! problems: range lateration ([`fit_position`]) and the RSSI
//! propagation model fit ([`fit_rssi`]).

mod backend_lm;
mod covariance;
mod traits;

pub mod problems;

pub use backend_lm::LmBackend;
pub use covariance::covariance_at;
pub use problems::range::{fit_position, PositionFit, RangeSample};
pub use problems::rssi::{fit_rssi, RssiFit, RssiFitSpec, RssiSample};
pub use traits::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};

use thiserror::Error;

/// Failure of a non-linear fit. Callers in the robust pipeline treat
/// these as recoverable (fall back to the unrefined estimate).
#[derive(Debug, Error)]
pub enum FitError {
    #[error("need at least {needed} samples, got {got}")]
    NotEnoughSamples { needed: usize, got: usize },
    #[error("no parameters enabled for estimation")]
    NothingToEstimate,
    #[error("solver did not converge")]
    NotConverged,
}
