use nalgebra::{Isometry3, Matrix4, Point2, Point3};
use serde::{Deserialize, Serialize};
use tagpose_core::CameraIntrinsics;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::dlt::dlt_initial_pose;
use crate::layout::{check_image_points, classify_object_points, PointLayout};
use crate::planar::planar_initial_pose;
use crate::refine::refine_pose_lm;
use crate::{PnpError, MIN_CORRESPONDENCES, MIN_NON_PLANAR_CORRESPONDENCES};

/// Tuning for [`IterativePnp`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterativePnpParams {
    /// Upper bound on Levenberg-Marquardt iterations.
    pub max_iterations: usize,
    /// Starting damping factor.
    pub initial_damping: f64,
    /// Multiplier applied to the damping on rejected steps (divisor on accepted ones).
    pub damping_factor: f64,
    /// Stop when the update norm falls below this value.
    pub step_tolerance: f64,
    /// Stop when the relative cost decrease falls below this value.
    pub cost_tolerance: f64,
    /// Ratio of smallest to largest principal variance of the object points
    /// under which they are treated as coplanar.
    pub planarity_tolerance: f64,
    /// Reject solutions whose reprojection RMSE (pixels) exceeds this value.
    pub max_reprojection_rmse: Option<f64>,
}

impl Default for IterativePnpParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            initial_damping: 1e-3,
            damping_factor: 10.0,
            step_tolerance: 1e-10,
            cost_tolerance: 1e-12,
            planarity_tolerance: 1e-6,
            max_reprojection_rmse: None,
        }
    }
}

impl IterativePnpParams {
    /// Check that the damping schedule can make progress and that every
    /// tolerance is a finite, non-negative number.
    pub fn validate(&self) -> Result<(), PnpError> {
        let positive = self.initial_damping.is_finite() && self.initial_damping > 0.0;
        if !positive {
            return Err(invalid("initial_damping", self.initial_damping));
        }
        let growing = self.damping_factor.is_finite() && self.damping_factor > 1.0;
        if !growing {
            return Err(invalid("damping_factor", self.damping_factor));
        }
        for (name, value) in [
            ("step_tolerance", self.step_tolerance),
            ("cost_tolerance", self.cost_tolerance),
            ("planarity_tolerance", self.planarity_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(name, value));
            }
        }
        match self.max_reprojection_rmse {
            Some(limit) if limit.is_nan() || limit < 0.0 => {
                Err(invalid("max_reprojection_rmse", limit))
            }
            _ => Ok(()),
        }
    }
}

fn invalid(name: &'static str, value: f64) -> PnpError {
    PnpError::InvalidParams { name, value }
}

/// Result of a successful pose solve.
#[derive(Clone, Debug)]
pub struct PnpSolution {
    /// `T_C_O`: object frame into camera frame.
    pub pose: Isometry3<f64>,
    /// Root mean square pixel reprojection error.
    pub rmse: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl PnpSolution {
    /// The pose as a homogeneous 4x4 matrix.
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        self.pose.to_homogeneous()
    }
}

/// Anything that can turn 2D-3D correspondences into a camera-from-object pose.
pub trait PoseSolver {
    fn solve(
        &self,
        object: &[Point3<f64>],
        image: &[Point2<f64>],
        intrinsics: &CameraIntrinsics,
    ) -> Result<PnpSolution, PnpError>;
}

impl<S: PoseSolver + ?Sized> PoseSolver for Box<S> {
    fn solve(
        &self,
        object: &[Point3<f64>],
        image: &[Point2<f64>],
        intrinsics: &CameraIntrinsics,
    ) -> Result<PnpSolution, PnpError> {
        (**self).solve(object, image, intrinsics)
    }
}

/// Linear initialisation followed by Levenberg-Marquardt refinement.
#[derive(Clone, Debug, Default)]
pub struct IterativePnp {
    params: IterativePnpParams,
}

impl IterativePnp {
    pub fn new(params: IterativePnpParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IterativePnpParams {
        &self.params
    }
}

fn validate_inputs(
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    k: &CameraIntrinsics,
) -> Result<(), PnpError> {
    if object.len() != image.len() {
        return Err(PnpError::MismatchedLengths {
            object: object.len(),
            image: image.len(),
        });
    }
    if object.len() < MIN_CORRESPONDENCES {
        return Err(PnpError::InsufficientCorrespondences {
            required: MIN_CORRESPONDENCES,
            actual: object.len(),
        });
    }
    if !k.is_valid() {
        return Err(PnpError::InvalidIntrinsics { fx: k.fx, fy: k.fy });
    }
    let finite = object.iter().all(|p| p.coords.iter().all(|v| v.is_finite()))
        && image.iter().all(|p| p.coords.iter().all(|v| v.is_finite()));
    if !finite {
        return Err(PnpError::NonFiniteInput);
    }
    Ok(())
}

fn pose_is_finite(pose: &Isometry3<f64>) -> bool {
    pose.translation.vector.iter().all(|v| v.is_finite())
        && pose.rotation.coords.iter().all(|v| v.is_finite())
}

impl PoseSolver for IterativePnp {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(points = object.len()))
    )]
    fn solve(
        &self,
        object: &[Point3<f64>],
        image: &[Point2<f64>],
        intrinsics: &CameraIntrinsics,
    ) -> Result<PnpSolution, PnpError> {
        self.params.validate()?;
        validate_inputs(object, image, intrinsics)?;
        check_image_points(image)?;

        let initial = match classify_object_points(object, self.params.planarity_tolerance)? {
            PointLayout::Planar { centroid, basis } => {
                planar_initial_pose(object, image, intrinsics, &centroid, &basis)?
            }
            PointLayout::General => {
                if object.len() < MIN_NON_PLANAR_CORRESPONDENCES {
                    return Err(PnpError::InsufficientCorrespondences {
                        required: MIN_NON_PLANAR_CORRESPONDENCES,
                        actual: object.len(),
                    });
                }
                dlt_initial_pose(object, image, intrinsics)?
            }
        };
        if !pose_is_finite(&initial) {
            return Err(PnpError::NonFiniteSolution);
        }

        let refined = refine_pose_lm(object, image, intrinsics, initial, &self.params);
        if !pose_is_finite(&refined.pose) || !refined.rmse.is_finite() {
            return Err(PnpError::NonFiniteSolution);
        }

        let behind = object
            .iter()
            .filter(|p| (refined.pose * *p).z <= 0.0)
            .count();
        if behind > 0 {
            return Err(PnpError::PointsBehindCamera { count: behind });
        }

        if let Some(limit) = self.params.max_reprojection_rmse {
            if refined.rmse > limit {
                return Err(PnpError::ReprojectionTooLarge {
                    rmse: refined.rmse,
                    limit,
                });
            }
        }

        Ok(PnpSolution {
            pose: refined.pose,
            rmse: refined.rmse,
            iterations: refined.iterations,
            converged: refined.converged,
        })
    }
}
