//! Core types and the robust consensus engine for `rloc-rs`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `PtN`, `MatN`, ...),
//! - located-reading value types ([`RangeReading`], [`RssiReading`],
//!   [`HybridReading`]) and the [`Estimate`] produced from them,
//! - the isotropic free-space propagation model ([`propagation`]),
//! - a generic robust consensus engine ([`robust_fit`], [`Estimator`])
//!   covering RANSAC, MSAC, PROSAC, LMedS and PROMedS.
//!
//! Readings are immutable once constructed; estimators in higher-level
//! crates hold read-only slices of them for the duration of a fit.

/// Linear algebra type aliases and helpers.
pub mod math;
/// Isotropic free-space propagation model.
pub mod propagation;
/// Located-reading value types.
pub mod reading;
/// Generic robust consensus engine and traits.
pub mod robust;
/// Radio source identity.
pub mod source;

mod estimate;

pub use estimate::Estimate;
pub use math::*;
pub use reading::{HybridReading, RangeReading, RssiReading};
pub use robust::{
    robust_fit, Estimator, InliersData, RobustEvent, RobustMethod, RobustOptions, RobustResult,
};
pub use source::RadioSource;
