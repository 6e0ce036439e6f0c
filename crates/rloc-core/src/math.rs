use nalgebra::{Matrix2, Matrix3, Point, Point2, Point3, SMatrix, SVector, Vector2, Vector3};

pub type Real = f64;

/// Receiver/emitter position with `D` spatial coordinates.
pub type PtN<const D: usize> = Point<Real, D>;
/// Displacement between two positions.
pub type VecN<const D: usize> = SVector<Real, D>;
/// Square matrix over `D` spatial coordinates (position covariance).
pub type MatN<const D: usize> = SMatrix<Real, D, D>;

pub type Pt2 = Point2<Real>;
pub type Pt3 = Point3<Real>;
pub type Vec2 = Vector2<Real>;
pub type Vec3 = Vector3<Real>;
pub type Mat2 = Matrix2<Real>;
pub type Mat3 = Matrix3<Real>;

/// Euclidean distance between two positions.
pub fn distance<const D: usize>(a: &PtN<D>, b: &PtN<D>) -> Real {
    (a - b).norm()
}

/// Squared norm of a position treated as a vector from the origin.
pub fn norm_squared<const D: usize>(p: &PtN<D>) -> Real {
    p.coords.norm_squared()
}
