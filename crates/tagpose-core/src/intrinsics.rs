use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Pinhole camera intrinsics in pixels, zero skew, no distortion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Read `fx, fy, cx, cy` from a row-major 3x3 `K` (ROS `CameraInfo::K` layout).
    pub fn from_k_row_major(k: &[f64; 9]) -> Self {
        Self::new(k[0], k[4], k[2], k[5])
    }

    /// True when both focal lengths are finite and positive and the
    /// principal point is finite.
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.fx > 0.0
            && self.fy > 0.0
            && self.cx.is_finite()
            && self.cy.is_finite()
    }

    /// Pixel -> normalized image plane (`z = 1`).
    #[inline]
    pub fn normalize(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }

    /// Camera-frame point -> pixel. `None` for points at or behind the camera.
    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= 0.0 {
            return None;
        }
        Some(Point2::new(
            self.fx * p.x / p.z + self.cx,
            self.fy * p.y / p.z + self.cy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn reads_ros_style_k() {
        let k = [600.0, 0.0, 320.0, 0.0, 590.0, 240.0, 0.0, 0.0, 1.0];
        let intr = CameraIntrinsics::from_k_row_major(&k);
        assert_eq!(intr, CameraIntrinsics::new(600.0, 590.0, 320.0, 240.0));
    }

    #[test]
    fn project_then_normalize_recovers_ray() {
        let intr = CameraIntrinsics::new(600.0, 590.0, 320.0, 240.0);
        let p = Point3::new(0.1, -0.2, 2.0);
        let px = intr.project(&p).expect("in front");
        let n = intr.normalize(&px);
        assert_abs_diff_eq!(n.x, 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(n.y, -0.1, epsilon = 1e-12);
    }

    #[test]
    fn points_behind_camera_do_not_project() {
        let intr = CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0);
        assert!(intr.project(&Point3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn invalid_focal_length_is_detected() {
        assert!(!CameraIntrinsics::new(0.0, 600.0, 320.0, 240.0).is_valid());
        assert!(!CameraIntrinsics::new(600.0, f64::NAN, 320.0, 240.0).is_valid());
    }
}
