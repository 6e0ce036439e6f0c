use crate::NllsProblem;
use nalgebra::{DMatrix, DVector};
use rloc_core::math::Real;

/// Parameter covariance at a solution: `s²·(JᵀJ)⁻¹`.
///
/// Residuals are assumed pre-weighted by measurement standard
/// deviation, so `(JᵀJ)⁻¹` is the covariance up to the unit variance
/// `s² = ‖r‖² / (m − p)` estimated from the residual at the solution
/// (taken as 1 when the system has no redundancy).
///
/// Returns `None` when `JᵀJ` is singular; callers treat a missing
/// covariance as "unavailable", not as a failed fit.
pub fn covariance_at<P: NllsProblem>(problem: &P, x: &DVector<Real>) -> Option<DMatrix<Real>> {
    let jac = problem.jacobian(x);
    let m = jac.nrows();
    let p = jac.ncols();
    let jtj = jac.transpose() * &jac;
    let inv = jtj.try_inverse()?;

    let unit_variance = if m > p {
        let r = problem.residuals(x);
        r.norm_squared() / (m - p) as Real
    } else {
        1.0
    };
    Some(inv * unit_variance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    /// Constant fit y_i = x with three observations of unit weight.
    struct ConstantProblem {
        obs: Vec<Real>,
    }

    impl NllsProblem for ConstantProblem {
        fn num_params(&self) -> usize {
            1
        }

        fn num_residuals(&self) -> usize {
            self.obs.len()
        }

        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_iterator(self.obs.len(), self.obs.iter().map(|&y| x[0] - y))
        }

        fn jacobian(&self, _x: &DVector<Real>) -> DMatrix<Real> {
            DMatrix::from_element(self.obs.len(), 1, 1.0)
        }
    }

    #[test]
    fn constant_fit_variance_matches_closed_form() {
        let problem = ConstantProblem {
            obs: vec![1.0, 2.0, 3.0],
        };
        // At the mean, variance of the mean = s²/n with
        // s² = Σ(y − ȳ)²/(n − 1) = 1.
        let x = DVector::from_element(1, 2.0);
        let cov = covariance_at(&problem, &x).unwrap();
        assert!((cov[(0, 0)] - 1.0 / 3.0).abs() < 1e-12, "got {}", cov[(0, 0)]);
    }
}
