use log::debug;
use nalgebra::{Isometry3, Matrix4, Point2, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tagpose_core::CameraIntrinsics;
use tagpose_pnp::{IterativePnp, PnpError, PoseSolver};

use crate::correspondence::CorrespondenceSet;

/// Camera-frame pose of a tag or bundle.
///
/// The quaternion is kept in the hemisphere `w >= 0`. Serialized as
/// `position: [x, y, z]`, `orientation: [x, y, z, w]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagPose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl TagPose {
    pub fn from_isometry(pose: &Isometry3<f64>) -> Self {
        let q = pose.rotation;
        let orientation = if q.w < 0.0 {
            UnitQuaternion::new_unchecked(-q.into_inner())
        } else {
            q
        };
        Self {
            position: pose.translation.vector,
            orientation,
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        self.to_isometry().to_homogeneous()
    }
}

/// Turns correspondences into camera-frame poses through a [`PoseSolver`].
#[derive(Clone, Debug, Default)]
pub struct PoseEstimator<S = IterativePnp> {
    solver: S,
}

impl<S: PoseSolver> PoseEstimator<S> {
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Homogeneous `T_C_O` from raw point lists and pinhole parameters
    /// (zero skew, zero distortion).
    pub fn solve(
        &self,
        object: &[Point3<f64>],
        image: &[Point2<f64>],
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
    ) -> Result<Matrix4<f64>, PnpError> {
        let k = CameraIntrinsics::new(fx, fy, cx, cy);
        let solution = self.solver.solve(object, image, &k)?;
        Ok(solution.to_homogeneous())
    }

    /// Pose for one tag or one bundle.
    pub fn estimate(
        &self,
        set: &CorrespondenceSet,
        intrinsics: &CameraIntrinsics,
    ) -> Result<TagPose, PnpError> {
        let solution = self
            .solver
            .solve(set.object_points(), set.image_points(), intrinsics)?;
        debug!(
            "pose from {} point(s) of {} tag(s): rmse {:.4} px after {} iteration(s)",
            set.len(),
            set.tag_count(),
            solution.rmse,
            solution.iterations
        );
        Ok(TagPose::from_isometry(&solution.pose))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::RawDetection;
    use approx::assert_abs_diff_eq;
    use nalgebra::Quaternion;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0)
    }

    fn synthetic_detection(pose: &Isometry3<f64>, size: f64) -> RawDetection {
        let k = intrinsics();
        let corners = crate::correspondence::object_points(size, &Isometry3::identity())
            .map(|p| k.project(&(pose * p)).expect("in front"));
        RawDetection::from_corners(0, corners).expect("detection")
    }

    #[test]
    fn recovers_known_tag_pose() {
        let gt = Isometry3::from_parts(
            Translation3::new(0.05, -0.03, 0.8),
            UnitQuaternion::from_euler_angles(0.3, 0.2, -0.4),
        );
        let det = synthetic_detection(&gt, 0.16);
        let set = CorrespondenceSet::for_tag(0.16, &det);

        let pose = PoseEstimator::<IterativePnp>::default()
            .estimate(&set, &intrinsics())
            .expect("pose");
        assert_abs_diff_eq!(pose.position, gt.translation.vector, epsilon = 1e-6);
        assert_abs_diff_eq!(pose.orientation.angle_to(&gt.rotation), 0.0, epsilon = 1e-6);
        assert!(pose.orientation.w >= 0.0);
    }

    #[test]
    fn solve_returns_homogeneous_transform() {
        let gt = Isometry3::translation(0.0, 0.0, 0.2);
        let det = synthetic_detection(&gt, 0.1);
        let set = CorrespondenceSet::for_tag(0.1, &det);
        let k = intrinsics();

        let t = PoseEstimator::new(IterativePnp::default())
            .solve(set.object_points(), set.image_points(), k.fx, k.fy, k.cx, k.cy)
            .expect("solve");
        assert_abs_diff_eq!(t, Matrix4::new_translation(&Vector3::new(0.0, 0.0, 0.2)), epsilon = 1e-9);
    }

    #[test]
    fn quaternion_is_canonicalized() {
        let q = UnitQuaternion::new_normalize(Quaternion::new(-0.5, 0.5, 0.5, 0.5));
        let pose = TagPose::from_isometry(&Isometry3::from_parts(Translation3::identity(), q));
        assert!(pose.orientation.w > 0.0);
        assert_abs_diff_eq!(pose.orientation.angle_to(&q), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_set_is_a_solve_failure() {
        let set = CorrespondenceSet::new();
        assert!(matches!(
            PoseEstimator::<IterativePnp>::default().estimate(&set, &intrinsics()),
            Err(PnpError::InsufficientCorrespondences { .. })
        ));
    }
}
