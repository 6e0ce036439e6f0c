//! Closed-form fit of the radiated parameters (transmitted power,
//! path-loss exponent) once an emitter position is known.
//!
//! With the position fixed, the propagation model is linear in both
//! parameters: `rssi_i = Pte + n·g_i` where the predictor
//! `g_i = 10·log10(k_i / d_i)` depends only on geometry and carrier
//! frequency. Pinned parameters keep their provided value.

use rloc_core::math::Real;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RssiParamsError {
    #[error("need at least {needed} RSSI samples, got {got}")]
    NotEnoughSamples { needed: usize, got: usize },
    #[error("predictor count {predictors} does not match RSSI count {rssi}")]
    CountMismatch { predictors: usize, rssi: usize },
    #[error("samples do not constrain the requested parameters")]
    Degenerate,
}

/// Radiated parameters produced by [`fit_rssi_params`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RssiParams {
    pub tx_power_dbm: Real,
    pub path_loss_exponent: Real,
}

/// Least-squares fit of `rssi_i = Pte + n·g_i` over the enabled
/// parameters; disabled ones are pinned to the provided initial value.
pub fn fit_rssi_params(
    predictors: &[Real],
    rssi: &[Real],
    estimate_tx_power: bool,
    estimate_path_loss: bool,
    initial_tx_power_dbm: Real,
    initial_path_loss: Real,
) -> Result<RssiParams, RssiParamsError> {
    if predictors.len() != rssi.len() {
        return Err(RssiParamsError::CountMismatch {
            predictors: predictors.len(),
            rssi: rssi.len(),
        });
    }
    let n = predictors.len();
    let needed = usize::from(estimate_tx_power) + usize::from(estimate_path_loss);
    if n < needed {
        return Err(RssiParamsError::NotEnoughSamples { needed, got: n });
    }

    match (estimate_tx_power, estimate_path_loss) {
        (false, false) => Ok(RssiParams {
            tx_power_dbm: initial_tx_power_dbm,
            path_loss_exponent: initial_path_loss,
        }),
        (true, false) => {
            // Pte = mean(rssi_i − n₀·g_i)
            let sum: Real = rssi
                .iter()
                .zip(predictors)
                .map(|(&r, &g)| r - initial_path_loss * g)
                .sum();
            Ok(RssiParams {
                tx_power_dbm: sum / n as Real,
                path_loss_exponent: initial_path_loss,
            })
        }
        (false, true) => {
            // n = Σ g_i·(rssi_i − Pte₀) / Σ g_i²
            let num: Real = rssi
                .iter()
                .zip(predictors)
                .map(|(&r, &g)| g * (r - initial_tx_power_dbm))
                .sum();
            let den: Real = predictors.iter().map(|&g| g * g).sum();
            if den.abs() < 1e-12 {
                return Err(RssiParamsError::Degenerate);
            }
            Ok(RssiParams {
                tx_power_dbm: initial_tx_power_dbm,
                path_loss_exponent: num / den,
            })
        }
        (true, true) => {
            // Normal equations of the two-parameter line fit.
            let count = n as Real;
            let sum_g: Real = predictors.iter().sum();
            let sum_gg: Real = predictors.iter().map(|&g| g * g).sum();
            let sum_r: Real = rssi.iter().sum();
            let sum_gr: Real = rssi.iter().zip(predictors).map(|(&r, &g)| r * g).sum();

            let det = count * sum_gg - sum_g * sum_g;
            // All predictors equal (receivers equidistant from the
            // emitter) leaves Pte and n indistinguishable.
            if det.abs() < 1e-9 * count * sum_gg.abs().max(1.0) {
                return Err(RssiParamsError::Degenerate);
            }

            let path_loss = (count * sum_gr - sum_g * sum_r) / det;
            let tx_power = (sum_r - path_loss * sum_g) / count;
            Ok(RssiParams {
                tx_power_dbm: tx_power,
                path_loss_exponent: path_loss,
            })
        }
    }
}
