//! Linear lateration: closed-form emitter position from receiver
//! positions and measured distances.
//!
//! Two formulations are provided. The inhomogeneous one subtracts the
//! first sphere equation from the others and solves the resulting
//! linear system; it needs `D + 1` readings. The homogeneous one keeps
//! `|x|²` as an extra unknown and extracts the null vector via SVD; it
//! needs `D + 2` readings but avoids privileging one reference reading.

use nalgebra::{DMatrix, DVector};
use rloc_core::math::{norm_squared, PtN, Real};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaterationError {
    #[error("need at least {needed} readings, got {got}")]
    NotEnoughReadings { needed: usize, got: usize },
    #[error("distance count {distances} does not match position count {positions}")]
    CountMismatch { positions: usize, distances: usize },
    #[error("receiver geometry is degenerate")]
    Degenerate,
}

fn check_counts<const D: usize>(
    positions: &[PtN<D>],
    distances: &[Real],
    needed: usize,
) -> Result<(), LaterationError> {
    if positions.len() != distances.len() {
        return Err(LaterationError::CountMismatch {
            positions: positions.len(),
            distances: distances.len(),
        });
    }
    if positions.len() < needed {
        return Err(LaterationError::NotEnoughReadings {
            needed,
            got: positions.len(),
        });
    }
    Ok(())
}

/// Solve `|x − p_i| = d_i` by subtracting the first equation from the
/// rest: `2(p_i − p_0)·x = d_0² − d_i² + |p_i|² − |p_0|²`.
///
/// Overdetermined systems are solved in the least-squares sense.
pub fn solve_inhomogeneous<const D: usize>(
    positions: &[PtN<D>],
    distances: &[Real],
) -> Result<PtN<D>, LaterationError> {
    check_counts(positions, distances, D + 1)?;

    let n = positions.len();
    let p0 = &positions[0];
    let d0 = distances[0];
    let p0_sq = norm_squared(p0);

    let mut a = DMatrix::<Real>::zeros(n - 1, D);
    let mut b = DVector::<Real>::zeros(n - 1);
    for i in 1..n {
        let pi = &positions[i];
        for j in 0..D {
            a[(i - 1, j)] = 2.0 * (pi[j] - p0[j]);
        }
        b[i - 1] = d0 * d0 - distances[i] * distances[i] + norm_squared(pi) - p0_sq;
    }

    let svd = a.svd(true, true);
    let max_sv = svd.singular_values.max();
    if !(max_sv > 0.0) || svd.rank(max_sv * 1e-9) < D {
        return Err(LaterationError::Degenerate);
    }
    let x = svd.solve(&b, 0.0).map_err(|_| LaterationError::Degenerate)?;

    let mut out = PtN::<D>::origin();
    for j in 0..D {
        out[j] = x[j];
    }
    Ok(out)
}

/// Homogeneous formulation: each reading contributes a row
/// `[1, −2·p_iᵀ, |p_i|² − d_i²]` acting on `(|x|², x, 1)`; the solution
/// is the null vector of the stacked system, dehomogenized by its last
/// component.
pub fn solve_homogeneous<const D: usize>(
    positions: &[PtN<D>],
    distances: &[Real],
) -> Result<PtN<D>, LaterationError> {
    check_counts(positions, distances, D + 2)?;

    let n = positions.len();
    let mut a = DMatrix::<Real>::zeros(n, D + 2);
    for i in 0..n {
        let pi = &positions[i];
        a[(i, 0)] = 1.0;
        for j in 0..D {
            a[(i, j + 1)] = -2.0 * pi[j];
        }
        a[(i, D + 1)] = norm_squared(pi) - distances[i] * distances[i];
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(LaterationError::Degenerate)?;
    let v = v_t.row(v_t.nrows() - 1);

    // v is a unit vector; a vanishing last component means the system
    // only constrains the point at infinity.
    let w = v[D + 1];
    if w.abs() < 1e-9 {
        return Err(LaterationError::Degenerate);
    }

    let mut out = PtN::<D>::origin();
    for j in 0..D {
        out[j] = v[j + 1] / w;
    }
    Ok(out)
}
