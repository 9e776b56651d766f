//! Types shared by every stage of the keypoint benchmark pipeline.

mod descriptors;

pub use descriptors::{DescriptorMatrix, Descriptors, DistanceMetric};
pub use image::GrayImage;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Salient image location with scale and orientation metadata.
///
/// Coordinates are in pixels of the full-resolution image, `angle` is in
/// radians when the detector assigns one.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the meaningful neighbourhood
    pub size: f32,
    pub angle: Option<f32>,
    pub response: f32,
    /// Pyramid level or octave the keypoint was found in
    pub octave: u32,
    /// Detector-specific tag (AKAZE stores its evolution level here)
    pub class_id: Option<u32>,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            size,
            angle: None,
            response: 0.0,
            octave: 0,
            class_id: None,
        }
    }

    pub fn with_response(mut self, response: f32) -> Self {
        self.response = response;
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = Some(angle);
        self
    }

    pub fn with_octave(mut self, octave: u32) -> Self {
        self.octave = octave;
        self
    }

    pub fn with_class_id(mut self, class_id: u32) -> Self {
        self.class_id = Some(class_id);
        self
    }
}

/// Correspondence between a keypoint of the previous frame (`query_idx`)
/// and one of the current frame (`train_idx`).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

/// Axis-aligned rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Boundary-inclusive point test on all four edges.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        let (x0, y0) = (self.x as f32, self.y as f32);
        let (x1, y1) = (x0 + self.width as f32, y0 + self.height as f32);
        px >= x0 && px <= x1 && py >= y0 && py <= y1
    }
}

/// Number of worker threads used when the configuration does not say otherwise
pub fn default_threads() -> usize {
    num_cpus::get().max(1)
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rect_edges_are_inclusive() {
        let r = Rect::new(535, 180, 180, 150);
        assert!(r.contains(535.0, 180.0));
        assert!(r.contains(715.0, 330.0));
        assert!(r.contains(600.5, 250.25));
        assert!(!r.contains(534.9, 200.0));
        assert!(!r.contains(600.0, 330.1));
    }

    #[test]
    fn test_keypoint_builder() {
        let kp = Keypoint::new(3.0, 4.0, 7.0)
            .with_response(12.5)
            .with_angle(0.5)
            .with_octave(2)
            .with_class_id(9);
        assert_eq!(kp.size, 7.0);
        assert_eq!(kp.angle, Some(0.5));
        assert_eq!(kp.octave, 2);
        assert_eq!(kp.class_id, Some(9));
        assert_eq!(kp.response, 12.5);
    }

    proptest! {
        #[test]
        fn prop_contains_matches_bounds(px in -100.0f32..1000.0, py in -100.0f32..1000.0) {
            let r = Rect::new(100, 50, 300, 200);
            let inside = px >= 100.0 && px <= 400.0 && py >= 50.0 && py <= 250.0;
            prop_assert_eq!(r.contains(px, py), inside);
        }
    }
}
