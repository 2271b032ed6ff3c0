//! Per-frame orchestration: decode, drop duplicates, build correspondences,
//! solve one pose per standalone tag and one per observed bundle.

mod error;
mod result;
mod timing;

pub use error::PipelineError;
pub use result::{
    FrameDiagnostics, FrameHeader, FrameOutput, PoseFailure, TagDetection, TagDetectionArray,
};
pub use timing::{FrameStage, FrameTiming};

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tagpose_core::{CameraIntrinsics, GrayImageView};
use tagpose_pnp::{IterativePnp, PoseSolver};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::broadcast::{LogBroadcaster, StampedTransform, TransformBroadcaster};
use crate::config::{ConfigError, DetectorConfig};
use crate::correspondence::CorrespondenceSet;
use crate::decoder::TagDecoder;
use crate::detection::{RawDetection, TagId};
use crate::duplicates::remove_duplicates;
use crate::estimator::PoseEstimator;
use crate::family::DecoderTable;
use crate::registry::{StandaloneTagDescription, TagRegistry};
use crate::throttle::LogThrottle;

/// One camera image with its metadata and calibration.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub header: &'a FrameHeader,
    pub image: GrayImageView<'a>,
    pub intrinsics: CameraIntrinsics,
}

/// Detection pipeline bound to one decoder.
///
/// `process` takes `&mut self`: one frame in flight per instance. Pipelines
/// for different streams can share one registry.
pub struct TagPipeline<D, S = IterativePnp> {
    registry: Arc<TagRegistry>,
    decoder: D,
    estimator: PoseEstimator<S>,
    camera_frame: String,
    broadcaster: Option<Box<dyn TransformBroadcaster + Send>>,
    unknown_warnings: LogThrottle,
}

impl<D: TagDecoder, S: PoseSolver> TagPipeline<D, S> {
    pub fn new(registry: Arc<TagRegistry>, decoder: D, solver: S) -> Self {
        Self {
            registry,
            decoder,
            estimator: PoseEstimator::new(solver),
            camera_frame: "camera".to_string(),
            broadcaster: None,
            unknown_warnings: LogThrottle::default(),
        }
    }

    /// Apply the non-registry settings of `config`: camera frame, unknown-tag
    /// warning interval, and a log broadcaster when `publish_tf` is set.
    pub fn with_config(mut self, config: &DetectorConfig) -> Self {
        self.camera_frame = config.camera_frame.clone();
        let interval = config.unknown_tag_warn_interval_s;
        match Duration::try_from_secs_f64(interval) {
            Ok(interval) => self.unknown_warnings = LogThrottle::new(interval),
            Err(e) => warn!("ignoring unknown_tag_warn_interval_s {interval}: {e}"),
        }
        if config.publish_tf && self.broadcaster.is_none() {
            self.broadcaster = Some(Box::new(LogBroadcaster));
        }
        self
    }

    pub fn with_camera_frame(mut self, camera_frame: impl Into<String>) -> Self {
        self.camera_frame = camera_frame.into();
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: Box<dyn TransformBroadcaster + Send>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn with_unknown_tag_interval(mut self, interval: Duration) -> Self {
        self.unknown_warnings = LogThrottle::new(interval);
        self
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }

    pub fn camera_frame(&self) -> &str {
        &self.camera_frame
    }

    /// Minimum spacing between two unknown-tag warnings.
    pub fn unknown_tag_interval(&self) -> Duration {
        self.unknown_warnings.interval()
    }

    /// Decode `frame` and estimate every pose it supports.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, frame),
            fields(seq = frame.header.seq, width = frame.image.width, height = frame.image.height)
        )
    )]
    pub fn process(&mut self, frame: &Frame<'_>) -> Result<FrameOutput, PipelineError> {
        check_intrinsics(&frame.intrinsics)?;
        let mut timing = FrameTiming::default();
        let detections = timing.measure(FrameStage::Detecting, || self.decoder.detect(&frame.image))?;
        debug!("frame {}: decoder returned {} tag(s)", frame.header.seq, detections.len());
        Ok(self.run(frame.header, &frame.intrinsics, detections, timing))
    }

    /// Same as [`TagPipeline::process`] on detections produced elsewhere.
    pub fn process_detections(
        &mut self,
        header: &FrameHeader,
        intrinsics: &CameraIntrinsics,
        detections: Vec<RawDetection>,
    ) -> Result<FrameOutput, PipelineError> {
        check_intrinsics(intrinsics)?;
        Ok(self.run(header, intrinsics, detections, FrameTiming::default()))
    }

    fn run(
        &mut self,
        header: &FrameHeader,
        intrinsics: &CameraIntrinsics,
        detections: Vec<RawDetection>,
        mut timing: FrameTiming,
    ) -> FrameOutput {
        let mut diagnostics = FrameDiagnostics::default();

        let (kept, duplicate_ids) =
            timing.measure(FrameStage::Resolving, || remove_duplicates(detections));
        diagnostics.duplicate_ids = duplicate_ids;

        let registry = Arc::clone(&self.registry);
        let (standalone, bundles) = timing.measure(FrameStage::Correlating, || {
            self.correlate(&registry, &kept, &mut diagnostics.unknown_ids)
        });

        let out = timing.measure(FrameStage::Estimating, || {
            let mut out = Vec::with_capacity(standalone.len() + bundles.len());
            for (tag, set) in &standalone {
                match self.estimator.estimate(set, intrinsics) {
                    Ok(pose) => out.push(TagDetection {
                        ids: vec![tag.id],
                        sizes: vec![tag.size],
                        frame_name: tag.frame_name.clone(),
                        header: header.clone(),
                        pose,
                    }),
                    Err(error) => {
                        warn!("skipping tag {} ({}): pose solve failed: {error}", tag.id, tag.frame_name);
                        diagnostics.pose_failures.push(PoseFailure {
                            frame_name: tag.frame_name.clone(),
                            observed_ids: vec![tag.id],
                            error,
                        });
                    }
                }
            }

            for (bundle, (set, observed)) in registry.bundles().iter().zip(&bundles) {
                if set.is_empty() {
                    continue;
                }
                match self.estimator.estimate(set, intrinsics) {
                    Ok(pose) => out.push(TagDetection {
                        ids: bundle.member_ids(),
                        sizes: bundle.member_sizes(),
                        frame_name: bundle.name().to_string(),
                        header: header.clone(),
                        pose,
                    }),
                    Err(error) => {
                        warn!("skipping bundle {}: pose solve failed: {error}", bundle.name());
                        diagnostics.pose_failures.push(PoseFailure {
                            frame_name: bundle.name().to_string(),
                            observed_ids: observed.clone(),
                            error,
                        });
                    }
                }
            }
            out
        });

        let array = TagDetectionArray {
            header: header.clone(),
            detections: out,
        };
        self.broadcast(&array);
        debug!("frame {} timing: {timing}", header.seq);

        FrameOutput {
            detections: array,
            diagnostics,
            timing,
        }
    }

    /// Sort the detections into standalone sets (ascending id) and one
    /// accumulator per configured bundle (configuration order).
    #[allow(clippy::type_complexity)]
    fn correlate<'r>(
        &mut self,
        registry: &'r TagRegistry,
        detections: &[RawDetection],
        unknown_ids: &mut Vec<TagId>,
    ) -> (
        Vec<(&'r StandaloneTagDescription, CorrespondenceSet)>,
        Vec<(CorrespondenceSet, Vec<TagId>)>,
    ) {
        let mut standalone = Vec::new();
        let mut bundles: Vec<(CorrespondenceSet, Vec<TagId>)> =
            vec![Default::default(); registry.bundles().len()];

        for det in detections {
            let mut in_bundle = false;
            for m in registry.bundles_containing(det.id) {
                let (set, observed) = &mut bundles[m.bundle_index];
                set.add_tag(m.member.size, &m.member.offset, det);
                observed.push(det.id);
                in_bundle = true;
            }

            match registry.lookup_standalone(det.id) {
                Some(tag) => standalone.push((tag, CorrespondenceSet::for_tag(tag.size, det))),
                None if !in_bundle => {
                    unknown_ids.push(det.id);
                    if self.unknown_warnings.should_emit(Instant::now()) {
                        warn!(
                            "tag {} detected but has no standalone or bundle description",
                            det.id
                        );
                    }
                }
                None => {}
            }
        }
        (standalone, bundles)
    }

    fn broadcast(&mut self, array: &TagDetectionArray) {
        let Some(broadcaster) = self.broadcaster.as_mut() else {
            return;
        };
        for det in &array.detections {
            broadcaster.send_transform(&StampedTransform {
                stamp: array.header.stamp,
                parent_frame: self.camera_frame.clone(),
                child_frame: det.frame_name.clone(),
                transform: det.pose,
            });
        }
    }
}

impl TagPipeline<Box<dyn TagDecoder + Send>, IterativePnp> {
    /// Build registry, decoder and solver from a config. Registry section
    /// errors do not fail the build; they are returned next to the pipeline.
    pub fn from_config(
        config: &DetectorConfig,
        decoders: &DecoderTable,
    ) -> Result<(Self, Vec<ConfigError>), ConfigError> {
        let decoder = decoders.build(config.tag_family, &config.decoder)?;
        let load = config.build_registry();
        let pipeline = Self::new(
            Arc::new(load.registry),
            decoder,
            IterativePnp::new(config.solver.clone()),
        )
        .with_config(config);
        Ok((pipeline, load.errors))
    }
}

fn check_intrinsics(k: &CameraIntrinsics) -> Result<(), PipelineError> {
    if k.is_valid() {
        Ok(())
    } else {
        Err(PipelineError::InvalidIntrinsics {
            fx: k.fx,
            fy: k.fy,
            cx: k.cx,
            cy: k.cy,
        })
    }
}
