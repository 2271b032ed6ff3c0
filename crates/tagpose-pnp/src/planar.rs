//! Closed-form pose for coplanar object points.
//!
//! Object points are expressed in a plane frame (centroid + principal axes),
//! the plane-to-normalized-image homography is decomposed as
//! `H ~ [r1 r2 t]`, and the rotation is projected onto SO(3).

use nalgebra::{Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion};
use tagpose_core::{estimate_homography, CameraIntrinsics};

use crate::PnpError;

pub(crate) fn planar_initial_pose(
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    k: &CameraIntrinsics,
    centroid: &Point3<f64>,
    basis: &Matrix3<f64>,
) -> Result<Isometry3<f64>, PnpError> {
    let basis_t = basis.transpose();
    let plane: Vec<Point2<f64>> = object
        .iter()
        .map(|p| {
            let d = basis_t * (p - centroid);
            Point2::new(d.x, d.y)
        })
        .collect();
    let normalized: Vec<Point2<f64>> = image.iter().map(|p| k.normalize(p)).collect();

    let h = estimate_homography(&plane, &normalized)
        .ok_or(PnpError::InitializationFailed("plane homography"))?
        .h;

    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();

    let norm_sum = h1.norm() + h2.norm();
    if norm_sum <= 1e-12 || !norm_sum.is_finite() {
        return Err(PnpError::InitializationFailed("degenerate homography"));
    }
    let mut lambda = 2.0 / norm_sum;
    // plane origin (centroid) must land in front of the camera
    if lambda * h3.z < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let t = h3 * lambda;

    let r_plane = project_to_so3(&Matrix3::from_columns(&[r1, r2, r3]))?;

    // T_C_O = T_C_P * T_P_O with T_P_O = (B^T, -B^T c)
    let rotation = r_plane * basis_t;
    let translation = t - rotation * centroid.coords;

    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
    Ok(Isometry3::from_parts(Translation3::from(translation), rot))
}

/// Closest rotation in the Frobenius sense, with the determinant forced to +1.
pub(crate) fn project_to_so3(m: &Matrix3<f64>) -> Result<Matrix3<f64>, PnpError> {
    let svd = m.svd(true, true);
    let u = svd
        .u
        .ok_or(PnpError::InitializationFailed("rotation svd"))?;
    let v_t = svd
        .v_t
        .ok_or(PnpError::InitializationFailed("rotation svd"))?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.column_mut(2).neg_mut();
        r = u_fixed * v_t;
    }
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    fn project_all(
        pose: &Isometry3<f64>,
        k: &CameraIntrinsics,
        pts: &[Point3<f64>],
    ) -> Vec<Point2<f64>> {
        pts.iter()
            .map(|p| k.project(&(pose * p)).expect("in front"))
            .collect()
    }

    #[test]
    fn recovers_tilted_tag_pose_exactly() {
        let k = CameraIntrinsics::new(800.0, 780.0, 320.0, 240.0);
        let object = [
            Point3::new(-0.05, -0.05, 0.0),
            Point3::new(0.05, -0.05, 0.0),
            Point3::new(0.05, 0.05, 0.0),
            Point3::new(-0.05, 0.05, 0.0),
        ];
        let gt = Isometry3::new(Vector3::new(0.03, -0.02, 0.6), Vector3::new(0.3, -0.2, 0.1));
        let image = project_all(&gt, &k, &object);

        let centroid = Point3::origin();
        let basis = Matrix3::identity();
        let pose = planar_initial_pose(&object, &image, &k, &centroid, &basis).expect("pose");

        assert_abs_diff_eq!(
            pose.translation.vector,
            gt.translation.vector,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(pose.rotation.angle_to(&gt.rotation), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn reflection_is_removed_from_rotation_estimate() {
        let m = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));
        let r = project_to_so3(&m).expect("svd");
        assert_abs_diff_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }
}
