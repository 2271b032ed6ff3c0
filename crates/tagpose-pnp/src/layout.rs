use nalgebra::{Matrix2, Matrix3, Point2, Point3, SymmetricEigen, Vector3};

use crate::PnpError;

/// Relative variance below which a principal direction counts as collapsed.
const COLLAPSE_RATIO: f64 = 1e-10;

/// Shape of an object point set after principal component analysis.
#[derive(Clone, Debug)]
pub(crate) enum PointLayout {
    /// Coplanar points. `basis` columns are the two in-plane axes and the
    /// plane normal (right-handed).
    Planar {
        centroid: Point3<f64>,
        basis: Matrix3<f64>,
    },
    General,
}

/// Classify the object points, rejecting coincident and collinear sets.
///
/// `planarity_tolerance` is the ratio of smallest to largest principal
/// variance under which the set is treated as a plane.
pub(crate) fn classify_object_points(
    pts: &[Point3<f64>],
    planarity_tolerance: f64,
) -> Result<PointLayout, PnpError> {
    let n = pts.len() as f64;
    let centroid = Point3::from(pts.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n);

    let mut cov = Matrix3::<f64>::zeros();
    for p in pts {
        let d = p - centroid;
        cov += d * d.transpose();
    }
    cov /= n;

    let eig = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let l0 = eig.eigenvalues[order[0]];
    let l1 = eig.eigenvalues[order[1]];
    let l2 = eig.eigenvalues[order[2]].max(0.0);

    if l0 <= f64::MIN_POSITIVE || l1 <= COLLAPSE_RATIO * l0 {
        return Err(PnpError::DegenerateObjectPoints);
    }

    if l2 <= planarity_tolerance * l0 {
        let e1: Vector3<f64> = eig.eigenvectors.column(order[0]).into_owned();
        let e2: Vector3<f64> = eig.eigenvectors.column(order[1]).into_owned();
        let normal = e1.cross(&e2);
        Ok(PointLayout::Planar {
            centroid,
            basis: Matrix3::from_columns(&[e1, e2, normal]),
        })
    } else {
        Ok(PointLayout::General)
    }
}

/// Reject image point sets that collapse to a point or a line.
pub(crate) fn check_image_points(pts: &[Point2<f64>]) -> Result<(), PnpError> {
    let n = pts.len() as f64;
    let mean = pts.iter().fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let mut cov = Matrix2::<f64>::zeros();
    for p in pts {
        let d = p.coords - mean;
        cov += d * d.transpose();
    }
    cov /= n;

    let half_trace = 0.5 * (cov[(0, 0)] + cov[(1, 1)]);
    let half_diff = 0.5 * (cov[(0, 0)] - cov[(1, 1)]);
    let radius = (half_diff * half_diff + cov[(0, 1)] * cov[(0, 1)]).sqrt();
    let l_max = half_trace + radius;
    let l_min = half_trace - radius;

    if l_max <= f64::MIN_POSITIVE || l_min <= COLLAPSE_RATIO * l_max {
        return Err(PnpError::DegenerateImagePoints);
    }
    Ok(())
}
