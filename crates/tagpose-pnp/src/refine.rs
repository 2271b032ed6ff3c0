//! Levenberg-Marquardt refinement of the pixel reprojection error.
//!
//! The pose is updated with a left perturbation `R <- exp(w) R`, `t <- t + dt`
//! and an analytic Jacobian.

use nalgebra::{Isometry3, Matrix6, Point2, Point3, Translation3, UnitQuaternion, Vector3, Vector6};
use tagpose_core::CameraIntrinsics;

use crate::solver::IterativePnpParams;

const MAX_DAMPING: f64 = 1e12;
const MIN_DAMPING: f64 = 1e-12;
/// Damping increases tried per iteration before the step is given up.
const MAX_DAMPING_RETRIES: usize = 100;

#[derive(Clone, Debug)]
pub(crate) struct RefineOutcome {
    pub pose: Isometry3<f64>,
    pub rmse: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Sum of squared pixel residuals. Infinite when any point sits at or behind
/// the camera so such steps are always rejected.
pub(crate) fn reprojection_cost(
    pose: &Isometry3<f64>,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    k: &CameraIntrinsics,
) -> f64 {
    let mut sum = 0.0;
    for (po, pi) in object.iter().zip(image) {
        let Some(px) = k.project(&(pose * po)) else {
            return f64::INFINITY;
        };
        sum += (px - pi).norm_squared();
    }
    sum
}

fn normal_equations(
    pose: &Isometry3<f64>,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    k: &CameraIntrinsics,
) -> (Matrix6<f64>, Vector6<f64>) {
    let mut jtj = Matrix6::zeros();
    let mut jtr = Vector6::zeros();

    for (po, pi) in object.iter().zip(image) {
        let q: Vector3<f64> = pose.rotation * po.coords;
        let x = q + pose.translation.vector;
        let iz = 1.0 / x.z;

        let du = Vector3::new(k.fx * iz, 0.0, -k.fx * x.x * iz * iz);
        let dv = Vector3::new(0.0, k.fy * iz, -k.fy * x.y * iz * iz);
        // d(exp(w) q)/dw at w = 0
        let dxdw = -q.cross_matrix();
        let du_w = dxdw.transpose() * du;
        let dv_w = dxdw.transpose() * dv;

        let ju = Vector6::new(du_w.x, du_w.y, du_w.z, du.x, du.y, du.z);
        let jv = Vector6::new(dv_w.x, dv_w.y, dv_w.z, dv.x, dv.y, dv.z);

        let ru = k.fx * x.x * iz + k.cx - pi.x;
        let rv = k.fy * x.y * iz + k.cy - pi.y;

        jtj += ju * ju.transpose() + jv * jv.transpose();
        jtr += ju * ru + jv * rv;
    }
    (jtj, jtr)
}

fn apply_step(pose: &Isometry3<f64>, delta: &Vector6<f64>) -> Isometry3<f64> {
    let w = Vector3::new(delta[0], delta[1], delta[2]);
    let dt = Vector3::new(delta[3], delta[4], delta[5]);
    let rotation = UnitQuaternion::from_scaled_axis(w) * pose.rotation;
    Isometry3::from_parts(Translation3::from(pose.translation.vector + dt), rotation)
}

pub(crate) fn refine_pose_lm(
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    k: &CameraIntrinsics,
    initial: Isometry3<f64>,
    params: &IterativePnpParams,
) -> RefineOutcome {
    let n = object.len().max(1) as f64;
    let mut pose = initial;
    let mut cost = reprojection_cost(&pose, object, image, k);
    let mut lambda = params.initial_damping;
    let mut iterations = 0;
    let mut converged = false;

    if cost.is_finite() {
        while iterations < params.max_iterations {
            iterations += 1;
            if cost <= f64::EPSILON * f64::EPSILON * n {
                converged = true;
                break;
            }

            let (jtj, jtr) = normal_equations(&pose, object, image, k);
            let mut accepted = false;
            for _ in 0..MAX_DAMPING_RETRIES {
                if lambda > MAX_DAMPING {
                    break;
                }
                let mut a = jtj;
                for d in 0..6 {
                    a[(d, d)] += lambda * jtj[(d, d)].max(1e-9);
                }
                let Some(chol) = a.cholesky() else {
                    lambda *= params.damping_factor;
                    continue;
                };
                let delta = chol.solve(&(-jtr));
                let candidate = apply_step(&pose, &delta);
                let candidate_cost = reprojection_cost(&candidate, object, image, k);

                if candidate_cost < cost {
                    let decrease = cost - candidate_cost;
                    pose = candidate;
                    cost = candidate_cost;
                    lambda = (lambda / params.damping_factor).max(MIN_DAMPING);
                    accepted = true;
                    if delta.norm() < params.step_tolerance
                        || decrease <= params.cost_tolerance * (cost + decrease)
                    {
                        converged = true;
                    }
                    break;
                }
                lambda *= params.damping_factor;
            }

            // No damping level improves the cost: at a (numerical) minimum.
            if !accepted {
                converged = true;
                break;
            }
            if converged {
                break;
            }
        }
    }

    RefineOutcome {
        pose,
        rmse: (cost / n).sqrt(),
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square(s: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(-s, -s, 0.0),
            Point3::new(s, -s, 0.0),
            Point3::new(s, s, 0.0),
            Point3::new(-s, s, 0.0),
        ]
    }

    #[test]
    fn perturbed_pose_converges_back() {
        let k = CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0);
        let object = square(0.08);
        let gt = Isometry3::new(Vector3::new(0.02, 0.01, 0.7), Vector3::new(0.2, -0.3, 0.05));
        let image: Vec<_> = object
            .iter()
            .map(|p| k.project(&(gt * p)).expect("in front"))
            .collect();

        let start = Isometry3::new(Vector3::new(0.04, -0.01, 0.75), Vector3::new(0.25, -0.25, 0.0));
        let out = refine_pose_lm(&object, &image, &k, start, &IterativePnpParams::default());

        assert!(out.converged);
        assert!(out.rmse < 1e-6, "rmse {}", out.rmse);
        assert_abs_diff_eq!(
            out.pose.translation.vector,
            gt.translation.vector,
            epsilon = 1e-6
        );
    }

    #[test]
    fn flat_damping_schedule_still_terminates() {
        let k = CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0);
        let object = square(0.05);
        let gt = Isometry3::translation(0.0, 0.0, 0.4);
        let mut image: Vec<_> = object
            .iter()
            .map(|p| k.project(&(gt * p)).expect("in front"))
            .collect();
        image[1].x += 2.0;
        image[3].y -= 2.0;

        let params = IterativePnpParams {
            damping_factor: 1.0,
            step_tolerance: 0.0,
            cost_tolerance: 0.0,
            ..IterativePnpParams::default()
        };
        let out = refine_pose_lm(&object, &image, &k, gt, &params);
        assert!(out.iterations <= params.max_iterations);
        assert!(out.rmse.is_finite());
    }

    #[test]
    fn cost_is_infinite_behind_camera() {
        let k = CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0);
        let object = square(0.1);
        let image = vec![Point2::new(320.0, 240.0); 4];
        let pose = Isometry3::translation(0.0, 0.0, -1.0);
        assert!(reprojection_cost(&pose, &object, &image, &k).is_infinite());
    }
}
