//! Isotropic free-space propagation model.
//!
//! Received power follows
//! `Pr(dBm) = 10·n·log10(k) + Pte(dBm) − 5·n·log10(d²)`
//! where `k = c / (4π·f)` is the free-space constant for carrier
//! frequency `f`, `n` the path-loss exponent and `d` the distance
//! between emitter and receiver. `n = 2` corresponds to ideal free
//! space; indoor environments typically sit between 1.6 and 4.

use crate::math::Real;

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: Real = 299_792_458.0;

/// Path-loss exponent of an ideal isotropic free-space channel.
pub const DEFAULT_PATH_LOSS_EXPONENT: Real = 2.0;

/// Distances below this are clamped before taking logarithms.
const MIN_DISTANCE: Real = 1e-12;

/// Free-space constant `k = c / (4π·f)` for a carrier frequency in Hz.
pub fn free_space_constant(frequency: Real) -> Real {
    SPEED_OF_LIGHT / (4.0 * std::f64::consts::PI * frequency)
}

/// Expected received power (dBm) at `distance` meters from a source
/// transmitting `tx_power_dbm` with the given path-loss exponent.
pub fn expected_rssi_dbm(
    k: Real,
    distance: Real,
    tx_power_dbm: Real,
    path_loss_exponent: Real,
) -> Real {
    let d = distance.max(MIN_DISTANCE);
    let n = path_loss_exponent;
    10.0 * n * k.log10() + tx_power_dbm - 5.0 * n * (d * d).log10()
}

/// Geometry/frequency predictor `g = 10·log10(k / d)` of the linearized
/// model `rssi = Pte + n·g`. Equivalent to [`expected_rssi_dbm`] with
/// unit path loss and zero transmitted power.
pub fn rssi_predictor(k: Real, distance: Real) -> Real {
    let d = distance.max(MIN_DISTANCE);
    10.0 * (k / d).log10()
}

/// Distance (meters) at which a source transmitting `tx_power_dbm`
/// is received at `rssi_dbm`. Inverse of [`expected_rssi_dbm`].
pub fn distance_from_rssi(
    k: Real,
    rssi_dbm: Real,
    tx_power_dbm: Real,
    path_loss_exponent: Real,
) -> Real {
    let n = path_loss_exponent.max(MIN_DISTANCE);
    k * 10.0_f64.powf((tx_power_dbm - rssi_dbm) / (10.0 * n))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FREQ_2G4: Real = 2.4e9;

    #[test]
    fn free_space_constant_matches_wavelength() {
        // k = λ / 4π
        let k = free_space_constant(FREQ_2G4);
        let lambda = SPEED_OF_LIGHT / FREQ_2G4;
        assert!((k - lambda / (4.0 * std::f64::consts::PI)).abs() < 1e-15);
    }

    #[test]
    fn rssi_distance_round_trip() {
        let k = free_space_constant(FREQ_2G4);
        for &d in &[0.5, 1.0, 3.7, 25.0, 120.0] {
            let rssi = expected_rssi_dbm(k, d, -10.0, 2.0);
            let back = distance_from_rssi(k, rssi, -10.0, 2.0);
            assert!(
                (back - d).abs() < 1e-9,
                "round trip failed for d={}: got {}",
                d,
                back
            );
        }
    }

    #[test]
    fn rssi_decreases_with_distance() {
        let k = free_space_constant(FREQ_2G4);
        let near = expected_rssi_dbm(k, 1.0, 0.0, 2.0);
        let far = expected_rssi_dbm(k, 10.0, 0.0, 2.0);
        assert!(near > far);
        // n = 2 free space: 20 dB per decade
        assert!((near - far - 20.0).abs() < 1e-9);
    }

    #[test]
    fn predictor_linearizes_the_model() {
        let k = free_space_constant(FREQ_2G4);
        let (pte, n, d) = (-4.0, 2.7, 12.5);
        let direct = expected_rssi_dbm(k, d, pte, n);
        let linear = pte + n * rssi_predictor(k, d);
        assert!((direct - linear).abs() < 1e-12);
    }

    #[test]
    fn zero_distance_is_clamped() {
        let k = free_space_constant(FREQ_2G4);
        let rssi = expected_rssi_dbm(k, 0.0, 0.0, 2.0);
        assert!(rssi.is_finite());
    }
}
