//! Closed-form initialization solvers for emitter localization.
//!
//! These are the linear collaborators consumed by the robust pipeline:
//! they turn a (sub)set of receiver positions and measured distances
//! into a position estimate without iteration, and fit the radiated
//! parameters of the propagation model once a position is known. Use
//! them for preliminary fits and seeds; `rloc-optim` refines their
//! output with proper uncertainty handling.

mod lateration;
mod rssi_params;

pub use lateration::*;
pub use rssi_params::*;
