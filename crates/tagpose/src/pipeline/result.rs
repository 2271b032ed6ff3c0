use serde::{Deserialize, Serialize};
use tagpose_pnp::PnpError;

use super::timing::FrameTiming;
use crate::detection::TagId;
use crate::estimator::TagPose;

/// Metadata of the source image, copied onto every output.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameHeader {
    pub seq: u64,
    /// Acquisition time, seconds.
    pub stamp: f64,
    /// Optical frame of the camera that produced the image.
    pub frame_id: String,
}

/// One pose: a standalone tag (single id) or a bundle (all configured members,
/// observed or not).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagDetection {
    pub ids: Vec<TagId>,
    pub sizes: Vec<f64>,
    /// Standalone frame name or bundle name.
    pub frame_name: String,
    pub header: FrameHeader,
    pub pose: TagPose,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TagDetectionArray {
    pub header: FrameHeader,
    pub detections: Vec<TagDetection>,
}

impl TagDetectionArray {
    pub fn find_id(&self, id: TagId) -> Option<&TagDetection> {
        self.detections.iter().find(|d| d.ids.contains(&id))
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// A tag or bundle whose pose could not be solved this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseFailure {
    pub frame_name: String,
    pub observed_ids: Vec<TagId>,
    pub error: PnpError,
}

/// Recoverable problems met while processing a frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameDiagnostics {
    /// Ids seen more than once and dropped entirely.
    pub duplicate_ids: Vec<TagId>,
    /// Ids with no standalone or bundle description.
    pub unknown_ids: Vec<TagId>,
    pub pose_failures: Vec<PoseFailure>,
}

impl FrameDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.duplicate_ids.is_empty() && self.unknown_ids.is_empty() && self.pose_failures.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct FrameOutput {
    pub detections: TagDetectionArray,
    pub diagnostics: FrameDiagnostics,
    pub timing: FrameTiming,
}
