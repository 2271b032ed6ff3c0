//! 2D-3D corner correspondences per tag and per bundle.
//!
//! Object points live in the output tag frame (X right, Y up, Z out of the
//! tag). The decoder's tag frame has Y pointing down, so the image side walks
//! the decoder square with the Y sign flipped; index `i` of both sequences
//! refers to the same physical corner.

use nalgebra::{Isometry3, Point2, Point3};

use crate::detection::RawDetection;

/// Output-frame corner order, in half-edge units: counter-clockwise from the
/// lower-left corner.
pub const OBJECT_CORNERS: [(f64, f64); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

/// The same corners in decoder tag-local coordinates (Y down).
pub const DECODER_CORNERS: [(f64, f64); 4] = [(-1.0, 1.0), (1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)];

/// Corners of a `size` x `size` tag mapped through `offset` (tag -> target frame).
pub fn object_points(size: f64, offset: &Isometry3<f64>) -> [Point3<f64>; 4] {
    let s = 0.5 * size;
    OBJECT_CORNERS.map(|(x, y)| offset * Point3::new(x * s, y * s, 0.0))
}

/// Pixel positions of the corners, in the order of [`object_points`].
pub fn image_points(detection: &RawDetection) -> [Point2<f64>; 4] {
    DECODER_CORNERS.map(|(x, y)| detection.homography.project(x, y))
}

/// Parallel object/image point lists for one pose solve.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrespondenceSet {
    object: Vec<Point3<f64>>,
    image: Vec<Point2<f64>>,
    tags: usize,
}

impl CorrespondenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-tag set with identity offset.
    pub fn for_tag(size: f64, detection: &RawDetection) -> Self {
        let mut set = Self::new();
        set.add_tag(size, &Isometry3::identity(), detection);
        set
    }

    /// Append the four corners of one observed tag.
    pub fn add_tag(&mut self, size: f64, offset: &Isometry3<f64>, detection: &RawDetection) {
        self.object.extend(object_points(size, offset));
        self.image.extend(image_points(detection));
        self.tags += 1;
    }

    pub fn object_points(&self) -> &[Point3<f64>] {
        &self.object
    }

    pub fn image_points(&self) -> &[Point2<f64>] {
        &self.image
    }

    /// Number of point pairs.
    pub fn len(&self) -> usize {
        self.object.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object.is_empty()
    }

    /// Number of tags that contributed.
    pub fn tag_count(&self) -> usize {
        self.tags
    }
}
