//! Per-frame tag observations as handed over by a decoder.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tagpose_core::{homography_from_4pt, Homography};

use crate::correspondence::DECODER_CORNERS;
use crate::decoder::DecodeError;

/// Integer tag identifier as printed in the family codebook.
pub type TagId = i32;

/// One decoded tag in one frame.
///
/// `corners` follow the decoder's native order, i.e. the images of the
/// tag-local points `(-1, 1), (1, 1), (1, -1), (-1, -1)`; `homography` maps
/// tag-local coordinates in `[-1, 1]^2` to pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub id: TagId,
    pub corners: [Point2<f64>; 4],
    pub center: Point2<f64>,
    pub homography: Homography,
    /// Number of bits corrected while decoding.
    #[serde(default)]
    pub hamming: u32,
    #[serde(default)]
    pub decision_margin: f64,
}

impl RawDetection {
    /// Build a detection from its four pixel corners, recomputing the
    /// homography and the center.
    pub fn from_corners(id: TagId, corners: [Point2<f64>; 4]) -> Result<Self, DecodeError> {
        let local = DECODER_CORNERS.map(|(x, y)| Point2::new(x, y));
        let homography = homography_from_4pt(&local, &corners)
            .filter(Homography::is_valid)
            .ok_or(DecodeError::DegenerateCorners { id })?;
        let center = homography.project(0.0, 0.0);
        Ok(Self {
            id,
            corners,
            center,
            homography,
            hamming: 0,
            decision_margin: 0.0,
        })
    }
}

/// Serialized detection, e.g. recorded from a live decoder.
///
/// Missing `homography` and `center` are recomputed from the corners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedDetection {
    pub id: TagId,
    pub corners: [Point2<f64>; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Point2<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homography: Option<Homography>,
}

impl From<&RawDetection> for RecordedDetection {
    fn from(det: &RawDetection) -> Self {
        Self {
            id: det.id,
            corners: det.corners,
            center: Some(det.center),
            homography: Some(det.homography),
        }
    }
}

impl TryFrom<RecordedDetection> for RawDetection {
    type Error = DecodeError;

    fn try_from(rec: RecordedDetection) -> Result<Self, Self::Error> {
        let mut det = match rec.homography {
            Some(homography) if homography.is_valid() => RawDetection {
                id: rec.id,
                corners: rec.corners,
                center: homography.project(0.0, 0.0),
                homography,
                hamming: 0,
                decision_margin: 0.0,
            },
            Some(_) => return Err(DecodeError::DegenerateCorners { id: rec.id }),
            None => RawDetection::from_corners(rec.id, rec.corners)?,
        };
        if let Some(center) = rec.center {
            det.center = center;
        }
        Ok(det)
    }
}
