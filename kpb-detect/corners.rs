use crate::config::{HarrisParams, ShiTomasiParams};
use crate::corner_detection::Gradients;
use crate::detector::{ensure_min_size, KeypointDetector};
use crate::error::DetectResult;
use crate::refinement::KeypointRefinement;
use image::GrayImage;
use kpb_core::Keypoint;

/// Harris corner detector with overlap-based suppression.
///
/// The response map is min-max normalised to 0..255 before thresholding so
/// `min_response` is independent of image contrast.
pub struct HarrisDetector {
    params: HarrisParams,
}

impl HarrisDetector {
    pub fn new(params: HarrisParams) -> Self {
        Self { params }
    }
}

impl KeypointDetector for HarrisDetector {
    fn name(&self) -> &'static str {
        "HARRIS"
    }

    fn detect_keypoints(&self, img: &GrayImage) -> DetectResult<Vec<Keypoint>> {
        ensure_min_size(img, 3)?;
        let p = &self.params;
        let gradients = Gradients::sobel(img);
        let mut response = gradients.harris_map(p.block_size, p.k);

        let (lo, hi) = (response.min_value(), response.max_value());
        if hi - lo <= f32::EPSILON {
            return Ok(Vec::new());
        }
        let scale = 255.0 / (hi - lo);
        response.data.iter_mut().for_each(|v| *v = (*v - lo) * scale);

        let mut candidates = Vec::new();
        for y in 0..response.height {
            for x in 0..response.width {
                let r = response.get(x, y);
                if r > p.min_response {
                    candidates.push(Keypoint::new(x as f32, y as f32, p.keypoint_size).with_response(r));
                }
            }
        }
        log::trace!("harris: {} candidates above {}", candidates.len(), p.min_response);
        Ok(KeypointRefinement::overlap_suppression(candidates, p.max_overlap))
    }
}

/// Shi-Tomasi "good features to track" on the minimum eigenvalue map.
pub struct ShiTomasiDetector {
    params: ShiTomasiParams,
}

impl ShiTomasiDetector {
    pub fn new(params: ShiTomasiParams) -> Self {
        Self { params }
    }
}

impl KeypointDetector for ShiTomasiDetector {
    fn name(&self) -> &'static str {
        "SHITOMASI"
    }

    fn detect_keypoints(&self, img: &GrayImage) -> DetectResult<Vec<Keypoint>> {
        ensure_min_size(img, 3)?;
        let p = &self.params;
        let eig = Gradients::sobel(img).min_eigen_map(p.block_size);
        let max = eig.max_value();
        if max <= 0.0 {
            return Ok(Vec::new());
        }
        let threshold = max * p.quality_level;

        let mut candidates = Vec::new();
        for y in 1..eig.height - 1 {
            for x in 1..eig.width - 1 {
                let v = eig.get(x, y);
                if v <= threshold {
                    continue;
                }
                // plateau-tolerant 3x3 maximum, ties are resolved by distance below
                let is_peak = (y - 1..=y + 1).all(|yy| (x - 1..=x + 1).all(|xx| eig.get(xx, yy) <= v));
                if is_peak {
                    candidates.push(Keypoint::new(x as f32, y as f32, p.keypoint_size).with_response(v));
                }
            }
        }

        let max_corners = ((img.width() * img.height()) as f32 / p.min_distance.max(1.0)) as usize;
        let mut corners = KeypointRefinement::non_maximum_suppression(&candidates, p.min_distance);
        corners.truncate(max_corners);
        Ok(corners)
    }
}
