use crate::config::FastParams;
use crate::corner_detection::CornerDetector;
use crate::detector::{ensure_min_size, KeypointDetector};
use crate::error::DetectResult;
use image::GrayImage;
use kpb_core::Keypoint;

/// Single-scale FAST-9/16 corner detector
pub struct FastDetector {
    params: FastParams,
}

impl FastDetector {
    pub fn new(params: FastParams) -> Self {
        Self { params }
    }
}

impl KeypointDetector for FastDetector {
    fn name(&self) -> &'static str {
        "FAST"
    }

    fn detect_keypoints(&self, img: &GrayImage) -> DetectResult<Vec<Keypoint>> {
        // FAST requires at least 7x7 image (3-pixel border on each side)
        ensure_min_size(img, 7)?;
        let p = &self.params;
        let corners = CornerDetector::detect_fast(img, p.threshold, p.nonmax_suppression, 3);
        Ok(corners
            .into_iter()
            .map(|(x, y, score)| Keypoint::new(x as f32, y as f32, p.keypoint_size).with_response(score))
            .collect())
    }
}
