//! Transform side channel: one camera -> tag frame transform per detection.

use log::info;
use serde::{Deserialize, Serialize};

use crate::estimator::TagPose;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    /// Stamp of the source frame, seconds.
    pub stamp: f64,
    pub parent_frame: String,
    pub child_frame: String,
    pub transform: TagPose,
}

pub trait TransformBroadcaster {
    fn send_transform(&mut self, transform: &StampedTransform);
}

/// Collects transforms in memory.
impl TransformBroadcaster for Vec<StampedTransform> {
    fn send_transform(&mut self, transform: &StampedTransform) {
        self.push(transform.clone());
    }
}

/// Writes each transform to the log at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogBroadcaster;

impl TransformBroadcaster for LogBroadcaster {
    fn send_transform(&mut self, t: &StampedTransform) {
        let p = t.transform.position;
        let q = t.transform.orientation;
        info!(
            "tf {} -> {} @ {:.6}: t=[{:.4}, {:.4}, {:.4}] q=[{:.4}, {:.4}, {:.4}, {:.4}]",
            t.parent_frame, t.child_frame, t.stamp, p.x, p.y, p.z, q.i, q.j, q.k, q.w
        );
    }
}
