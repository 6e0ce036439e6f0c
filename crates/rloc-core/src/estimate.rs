use crate::math::{PtN, Real};

/// Candidate model produced by one fit: an emitter position plus the
/// optional radiated parameters when those were estimated.
///
/// Instances are created and discarded per consensus iteration; the
/// winning one is promoted to the estimator's result fields. Parameters
/// that were not estimated carry the configured initial value.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate<const D: usize> {
    /// Estimated emitter position.
    pub position: PtN<D>,
    /// Equivalent isotropic transmitted power (dBm), when estimated
    /// or pinned.
    pub tx_power_dbm: Option<Real>,
    /// Path-loss exponent, when estimated or pinned.
    pub path_loss_exponent: Option<Real>,
}

impl<const D: usize> Estimate<D> {
    /// Position-only estimate.
    pub fn position_only(position: PtN<D>) -> Self {
        Self {
            position,
            tx_power_dbm: None,
            path_loss_exponent: None,
        }
    }

    pub fn new(
        position: PtN<D>,
        tx_power_dbm: Option<Real>,
        path_loss_exponent: Option<Real>,
    ) -> Self {
        Self {
            position,
            tx_power_dbm,
            path_loss_exponent,
        }
    }

    /// Transmitted power, falling back to a default for scoring.
    pub fn tx_power_or(&self, default: Real) -> Real {
        self.tx_power_dbm.unwrap_or(default)
    }

    /// Path-loss exponent, falling back to a default for scoring.
    pub fn path_loss_or(&self, default: Real) -> Real {
        self.path_loss_exponent.unwrap_or(default)
    }
}
