//! Core types and utilities for fiducial tag pose estimation.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete tag decoder or pose solver.

mod homography;
mod image;
mod intrinsics;
mod logger;

pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{GrayImageView, ImageError};
pub use intrinsics::CameraIntrinsics;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, LoggerError};
