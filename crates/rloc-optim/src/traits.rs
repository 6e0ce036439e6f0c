use nalgebra::{DMatrix, DVector};
use rloc_core::math::Real;

/// Dense non-linear least-squares problem.
///
/// Residuals are expected to be pre-weighted: problems divide each row
/// by the measurement standard deviation, so the squared residual norm
/// is the chi-square of the fit and `(JᵀJ)⁻¹` approximates the
/// parameter covariance at the solution.
pub trait NllsProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows.
    fn num_residuals(&self) -> usize;

    /// Weighted residual vector at `x`.
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;
    /// Weighted Jacobian at `x`, `num_residuals × num_params`.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real>;
}

#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Iteration budget handed to the backend.
    ///
    /// The LM backend follows the MINPACK convention and interprets
    /// this as a function-evaluation patience.
    pub max_iters: usize,
    /// Relative tolerance on cost reduction.
    pub ftol: Real,
    /// Relative tolerance on parameter updates.
    pub xtol: Real,
    /// Gradient orthogonality tolerance.
    pub gtol: Real,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveReport {
    pub iterations: usize,
    pub final_cost: Real,
    pub converged: bool,
}

/// Solver backend interface; [`crate::LmBackend`] is the provided
/// implementation.
pub trait NllsSolverBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}
