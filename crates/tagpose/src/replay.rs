//! Recorded frames for offline replay.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tagpose_core::CameraIntrinsics;

use crate::decoder::DecodeError;
use crate::detection::{RawDetection, RecordedDetection};
use crate::pipeline::FrameHeader;

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("frame {seq}: {source}")]
    Detection {
        seq: u64,
        #[source]
        source: DecodeError,
    },
}

/// Decoder output of one image, with the camera calibration at that time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    #[serde(default)]
    pub header: FrameHeader,
    pub intrinsics: CameraIntrinsics,
    #[serde(default)]
    pub detections: Vec<RecordedDetection>,
}

impl RecordedFrame {
    /// Detections ready for [`crate::TagPipeline::process_detections`].
    pub fn raw_detections(&self) -> Result<Vec<RawDetection>, ReplayError> {
        self.detections
            .iter()
            .cloned()
            .map(RawDetection::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ReplayError::Detection {
                seq: self.header.seq,
                source,
            })
    }
}

/// Load a JSON array of recorded frames.
pub fn load_frames(path: impl AsRef<Path>) -> Result<Vec<RecordedFrame>, ReplayError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write frames as pretty JSON.
pub fn write_frames(path: impl AsRef<Path>, frames: &[RecordedFrame]) -> Result<(), ReplayError> {
    let json = serde_json::to_string_pretty(frames)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_parse_with_minimal_fields() {
        let json = r#"[
            {
                "header": { "seq": 3, "stamp": 12.5, "frame_id": "cam0" },
                "intrinsics": { "fx": 600, "fy": 600, "cx": 320, "cy": 240 },
                "detections": [
                    { "id": 1, "corners": [[0, 10], [10, 10], [10, 0], [0, 0]] }
                ]
            },
            { "intrinsics": { "fx": 600, "fy": 600, "cx": 320, "cy": 240 } }
        ]"#;
        let frames: Vec<RecordedFrame> = serde_json::from_str(json).expect("json");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].header.frame_id, "cam0");
        assert_eq!(frames[0].raw_detections().expect("raw")[0].id, 1);
        assert!(frames[1].detections.is_empty());
    }

    #[test]
    fn degenerate_recorded_corners_name_the_frame() {
        let frame = RecordedFrame {
            header: FrameHeader {
                seq: 8,
                ..FrameHeader::default()
            },
            intrinsics: CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0),
            detections: vec![RecordedDetection {
                id: 2,
                corners: [nalgebra::Point2::new(1.0, 1.0); 4],
                center: None,
                homography: None,
            }],
        };
        assert!(matches!(
            frame.raw_detections(),
            Err(ReplayError::Detection { seq: 8, .. })
        ));
    }
}
