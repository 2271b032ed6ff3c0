//! Seam to the external tag decoder.

use std::collections::VecDeque;

use tagpose_core::{GrayImageView, ImageError};

use crate::detection::{RawDetection, TagId};
use crate::family::{DecoderSettings, TagFamily};

/// Errors surfaced by a decoder. Any of them aborts the current frame.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("{family} decoder failed: {reason}")]
    Failed { family: TagFamily, reason: String },

    #[error("tag {id}: corners do not define a valid homography")]
    DegenerateCorners { id: TagId },

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// A fiducial decoder for one tag family.
///
/// `detect` takes `&mut self`: an instance serves at most one frame at a time,
/// concurrent streams need one decoder each. The returned detections are owned
/// by the caller and stay valid after the next call.
pub trait TagDecoder {
    fn family(&self) -> TagFamily;

    fn detect(&mut self, image: &GrayImageView<'_>) -> Result<Vec<RawDetection>, DecodeError>;
}

impl<D: TagDecoder + ?Sized> TagDecoder for Box<D> {
    fn family(&self) -> TagFamily {
        (**self).family()
    }

    fn detect(&mut self, image: &GrayImageView<'_>) -> Result<Vec<RawDetection>, DecodeError> {
        (**self).detect(image)
    }
}

/// Decoder that hands out pre-recorded detection lists, one per call.
///
/// Once the queue is exhausted every call returns an empty list.
#[derive(Clone, Debug)]
pub struct ReplayDecoder {
    family: TagFamily,
    queue: VecDeque<Vec<RawDetection>>,
}

impl ReplayDecoder {
    pub fn new(family: TagFamily) -> Self {
        Self {
            family,
            queue: VecDeque::new(),
        }
    }

    /// Constructor usable in a [`crate::DecoderTable`].
    pub fn boxed(
        family: TagFamily,
        _settings: &DecoderSettings,
    ) -> Result<Box<dyn TagDecoder + Send>, DecodeError> {
        Ok(Box::new(Self::new(family)))
    }

    pub fn push_frame(&mut self, detections: Vec<RawDetection>) {
        self.queue.push_back(detections);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl TagDecoder for ReplayDecoder {
    fn family(&self) -> TagFamily {
        self.family
    }

    fn detect(&mut self, _image: &GrayImageView<'_>) -> Result<Vec<RawDetection>, DecodeError> {
        Ok(self.queue.pop_front().unwrap_or_default())
    }
}
