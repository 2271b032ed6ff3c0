//! Normalized DLT initialisation for non-coplanar object points.

use nalgebra::{
    DMatrix, Isometry3, Matrix3, Matrix3x4, Matrix4, Point2, Point3, Rotation3, Translation3,
    UnitQuaternion, Vector3,
};
use tagpose_core::CameraIntrinsics;

use crate::planar::project_to_so3;
use crate::PnpError;

/// Linear estimate of `T_C_O` from 6 or more correspondences.
pub(crate) fn dlt_initial_pose(
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    k: &CameraIntrinsics,
) -> Result<Isometry3<f64>, PnpError> {
    let n = object.len();
    let nf = n as f64;

    let centroid = object.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / nf;
    let mean_dist = object
        .iter()
        .map(|p| (p.coords - centroid).norm())
        .sum::<f64>()
        / nf;
    if mean_dist <= f64::EPSILON {
        return Err(PnpError::DegenerateObjectPoints);
    }
    let scale = 3.0_f64.sqrt() / mean_dist;
    let t_obj = Matrix4::new(
        scale, 0.0, 0.0, -scale * centroid.x, //
        0.0, scale, 0.0, -scale * centroid.y, //
        0.0, 0.0, scale, -scale * centroid.z, //
        0.0, 0.0, 0.0, 1.0,
    );

    let mut a = DMatrix::<f64>::zeros(2 * n, 12);
    for (i, (po, pi)) in object.iter().zip(image).enumerate() {
        let q = (po.coords - centroid) * scale;
        let m = k.normalize(pi);
        let (r0, r1) = (2 * i, 2 * i + 1);

        a[(r0, 0)] = q.x;
        a[(r0, 1)] = q.y;
        a[(r0, 2)] = q.z;
        a[(r0, 3)] = 1.0;
        a[(r0, 8)] = -m.x * q.x;
        a[(r0, 9)] = -m.x * q.y;
        a[(r0, 10)] = -m.x * q.z;
        a[(r0, 11)] = -m.x;

        a[(r1, 4)] = q.x;
        a[(r1, 5)] = q.y;
        a[(r1, 6)] = q.z;
        a[(r1, 7)] = 1.0;
        a[(r1, 8)] = -m.y * q.x;
        a[(r1, 9)] = -m.y * q.y;
        a[(r1, 10)] = -m.y * q.z;
        a[(r1, 11)] = -m.y;
    }

    let svd = a.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or(PnpError::InitializationFailed("dlt svd"))?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or(PnpError::InitializationFailed("dlt svd"))?;
    let row = v_t.row(min_idx);
    let p_norm = Matrix3x4::from_fn(|r, c| row[4 * r + c]);
    let p = p_norm * t_obj;

    let mut m: Matrix3<f64> = p.fixed_view::<3, 3>(0, 0).into_owned();
    let mut s = (m.row(0).norm() + m.row(1).norm() + m.row(2).norm()) / 3.0;
    if s <= f64::EPSILON || !s.is_finite() {
        return Err(PnpError::InitializationFailed("dlt scale"));
    }
    if m.determinant() < 0.0 {
        s = -s;
    }
    m /= s;
    let t: Vector3<f64> = p.column(3).into_owned() / s;

    let r = project_to_so3(&m)?;
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
    Ok(Isometry3::from_parts(Translation3::from(t), rot))
}
