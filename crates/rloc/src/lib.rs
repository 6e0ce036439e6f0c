//! High-level entry crate for the `rloc-rs` toolbox.
//!
//! `rloc` estimates the position (and optionally the transmitted power
//! and path-loss exponent) of a radio emitter from located readings —
//! direct distance measurements, RSSI observations, or both — using
//! outlier-resistant consensus methods (RANSAC, MSAC, PROSAC, LMedS,
//! PROMedS) around closed-form and non-linear lateration solvers.
//!
//! ## Quick start
//!
//! ```
//! use rloc::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Four receivers at the corners of a 10x10 square, each reporting
//! // its measured distance to the emitter at (5, 5).
//! let source = RadioSource::with_default_frequency("beacon-1");
//! let d = 50.0_f64.sqrt();
//! let readings = vec![
//!     RangeReading::new(source.clone(), Pt2::new(0.0, 0.0), d)?,
//!     RangeReading::new(source.clone(), Pt2::new(10.0, 0.0), d)?,
//!     RangeReading::new(source.clone(), Pt2::new(10.0, 10.0), d)?,
//!     RangeReading::new(source, Pt2::new(0.0, 10.0), d)?,
//! ];
//!
//! let mut config = RobustConfig::default();
//! config.method = RobustMethod::Ransac;
//! config.threshold = 0.5;
//!
//! let mut estimator = RobustRangingEstimator::with_config(readings, config)?;
//! estimator.estimate()?;
//!
//! let position = estimator.estimated_position().expect("estimation succeeded");
//! assert!((position.x - 5.0).abs() < 1e-4);
//! assert!((position.y - 5.0).abs() < 1e-4);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module organization
//!
//! - **[`core`]**: math types, reading value types, the propagation
//!   model and the generic consensus engine.
//! - **[`linear`]**: closed-form lateration and radiated-parameter
//!   solvers used for preliminary fits.
//! - **[`optim`]**: non-linear refinement with covariance.
//! - **[`pipeline`]**: the robust estimators and the sequential
//!   orchestrator.
//! - **[`prelude`]**: convenient re-exports for common use cases.
//!
//! ## Stability
//!
//! The `rloc` crate is the public compatibility boundary. Lower-level
//! crates are intended for advanced usage and may evolve more quickly.

/// Math types, reading value types, propagation model and the generic
/// consensus engine.
pub mod core {
    pub use rloc_core::*;
}

/// Closed-form solvers used for preliminary fits and seeds.
pub mod linear {
    pub use rloc_linear::*;
}

/// Non-linear least-squares refinement with covariance.
pub mod optim {
    pub use rloc_optim::*;
}

/// Robust estimators and the sequential orchestrator.
pub mod pipeline {
    pub use rloc_pipeline::*;
}

/// Convenient re-exports for common use cases.
///
/// Import with `use rloc::prelude::*;` to get started quickly.
pub mod prelude {
    pub use crate::core::{
        distance, Estimate, HybridReading, Pt2, Pt3, PtN, RadioSource, RangeReading, Real,
        RobustMethod, RssiReading,
    };
    pub use crate::pipeline::{
        EstimateError, EstimateListener, HybridConfig, RobustConfig, RobustHybridEstimator,
        RobustHybridEstimator2D, RobustHybridEstimator3D, RobustRangingEstimator,
        RobustRangingEstimator2D, RobustRangingEstimator3D, RobustRssiEstimator,
        RobustRssiEstimator2D, RobustRssiEstimator3D, RssiConfig, SequentialConfig,
        SequentialHybridEstimator, SequentialHybridEstimator2D, SequentialHybridEstimator3D,
    };
}
