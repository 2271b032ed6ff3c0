//! Perspective-n-Point pose estimation for fiducial tags.
//!
//! The solver recovers `T_C_O`, the rigid transform taking object (tag or
//! bundle) coordinates into the camera frame, from 2D-3D correspondences and
//! pinhole intrinsics with zero skew and no lens distortion.
//!
//! Pipeline:
//! - classify the object points as planar or general (and reject coincident
//!   or collinear sets),
//! - linear initialisation: plane-induced homography decomposition for planar
//!   sets, normalized DLT for general sets (6+ points),
//! - Levenberg-Marquardt refinement of the pixel reprojection error,
//! - sanity checks on the result (finite, in front of the camera, optional
//!   RMSE limit).
//!
//! ```
//! use nalgebra::{Point2, Point3};
//! use tagpose_core::CameraIntrinsics;
//! use tagpose_pnp::{IterativePnp, PoseSolver};
//!
//! let k = CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0);
//! let s = 0.05;
//! let object = [
//!     Point3::new(-s, -s, 0.0),
//!     Point3::new(s, -s, 0.0),
//!     Point3::new(s, s, 0.0),
//!     Point3::new(-s, s, 0.0),
//! ];
//! let image: Vec<Point2<f64>> = object
//!     .iter()
//!     .map(|p| k.project(&Point3::new(p.x, p.y, 0.5)).unwrap())
//!     .collect();
//!
//! let solution = IterativePnp::default().solve(&object, &image, &k)?;
//! assert!((solution.pose.translation.vector.z - 0.5).abs() < 1e-9);
//! # Ok::<(), tagpose_pnp::PnpError>(())
//! ```

mod dlt;
mod error;
mod layout;
mod planar;
mod refine;
mod solver;

pub use error::PnpError;
pub use solver::{IterativePnp, IterativePnpParams, PnpSolution, PoseSolver};

/// Minimum number of correspondences accepted by any solve.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Minimum number of correspondences for a non-coplanar object point set.
pub const MIN_NON_PLANAR_CORRESPONDENCES: usize = 6;
