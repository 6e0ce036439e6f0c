//! Robust emitter estimators: the public surface of `rloc-rs`.
//!
//! Each estimator owns a read-only set of readings and a configuration,
//! runs the consensus engine from `rloc-core` over a modality-specific
//! fit primitive, refines the winning estimate on its inliers via
//! `rloc-optim`, and exposes the result through getters:
//!
//! - [`RobustRangingEstimator`] — position from distance readings;
//! - [`RobustRssiEstimator`] — position and/or radiated parameters
//!   from RSSI readings (position can be pinned);
//! - [`RobustHybridEstimator`] — one consensus run over readings that
//!   carry both measurements;
//! - [`SequentialHybridEstimator`] — position first from ranges, then
//!   radiated parameters from RSSI with the position pinned.
//!
//! Estimators are single-threaded and blocking. A `locked` reentrancy
//! guard rejects configuration changes while an `estimate()` call is in
//! progress; it is always cleared before `estimate()` returns,
//! successfully or not.

mod config;
mod error;
mod hybrid;
mod listener;
mod ranging;
mod refine;
mod rssi;
mod runner;
mod sequential;

pub use config::{HybridConfig, RobustConfig, RssiConfig, SequentialConfig};
pub use error::EstimateError;
pub use listener::EstimateListener;
pub use ranging::{RobustRangingEstimator, RobustRangingEstimator2D, RobustRangingEstimator3D};
pub use rssi::{RobustRssiEstimator, RobustRssiEstimator2D, RobustRssiEstimator3D};
pub use hybrid::{RobustHybridEstimator, RobustHybridEstimator2D, RobustHybridEstimator3D};
pub use sequential::{
    SequentialHybridEstimator, SequentialHybridEstimator2D, SequentialHybridEstimator3D,
};
