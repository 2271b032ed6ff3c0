//! Camera-relative poses for fiducial tags.
//!
//! Turns per-frame tag detections (corner quads with ids, from an external
//! decoder) into metric poses in the camera frame, for standalone tags and for
//! rigid multi-tag bundles.
//!
//! Per frame:
//! 1. decode ([`TagDecoder`]),
//! 2. drop every id seen more than once ([`remove_duplicates`]),
//! 3. build 2D-3D corner correspondences per standalone tag and per bundle
//!    ([`CorrespondenceSet`]),
//! 4. solve one pose per standalone tag and one per bundle with at least one
//!    observed member ([`PoseEstimator`]).
//!
//! Output poses use the tag frame X right, Y up, Z out of the tag.
//!
//! ```
//! use std::sync::Arc;
//! use nalgebra::{Isometry3, Point2};
//! use tagpose::{
//!     object_points, FrameHeader, IterativePnp, RawDetection, ReplayDecoder,
//!     StandaloneTagDescription, TagFamily, TagPipeline, TagRegistry,
//! };
//! use tagpose_core::CameraIntrinsics;
//!
//! let tag = StandaloneTagDescription::new(5, 0.1, None)?;
//! let registry = Arc::new(TagRegistry::new(vec![tag], Vec::new())?);
//! let mut pipeline = TagPipeline::new(
//!     registry,
//!     ReplayDecoder::new(TagFamily::Tag36h11),
//!     IterativePnp::default(),
//! );
//!
//! // tag 5 seen 0.2 m in front of the camera
//! let k = CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0);
//! let pose = Isometry3::translation(0.0, 0.0, 0.2);
//! let corners: [Point2<f64>; 4] =
//!     object_points(0.1, &Isometry3::identity()).map(|p| k.project(&(pose * p)).unwrap());
//! let det = RawDetection::from_corners(5, corners)?;
//!
//! let out = pipeline.process_detections(&FrameHeader::default(), &k, vec![det])?;
//! assert_eq!(out.detections.detections[0].ids, vec![5]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod broadcast;
mod config;
mod correspondence;
mod decoder;
mod detection;
mod duplicates;
mod estimator;
mod family;
mod pipeline;
mod registry;
mod replay;
mod throttle;

pub use broadcast::{LogBroadcaster, StampedTransform, TransformBroadcaster};
pub use config::{
    BundleMemberEntry, ConfigError, DetectorConfig, RegistryLoad, StandaloneTagEntry,
    TagBundleEntry, BUNDLE_SECTION, STANDALONE_SECTION,
};
pub use correspondence::{
    image_points, object_points, CorrespondenceSet, DECODER_CORNERS, OBJECT_CORNERS,
};
pub use decoder::{DecodeError, ReplayDecoder, TagDecoder};
pub use detection::{RawDetection, RecordedDetection, TagId};
pub use duplicates::remove_duplicates;
pub use estimator::{PoseEstimator, TagPose};
pub use family::{DecoderConstructor, DecoderSettings, DecoderTable, TagFamily};
pub use pipeline::{
    Frame, FrameDiagnostics, FrameHeader, FrameOutput, FrameStage, FrameTiming, PipelineError,
    PoseFailure, TagDetection, TagDetectionArray, TagPipeline,
};
pub use registry::{
    BundleMember, BundleMembership, RegistryError, StandaloneTagDescription,
    TagBundleDescription, TagRegistry,
};
pub use replay::{load_frames, write_frames, RecordedFrame, ReplayError};
pub use throttle::LogThrottle;

pub use tagpose_pnp::{IterativePnp, IterativePnpParams, PnpError, PnpSolution, PoseSolver};
