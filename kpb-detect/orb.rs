use crate::config::OrbParams;
use crate::corner_detection::{CornerDetector, Gradients};
use crate::detector::{ensure_min_size, KeypointDetector};
use crate::error::DetectResult;
use crate::pyramid::ImagePyramid;
use crate::refinement::KeypointRefinement;
use image::GrayImage;
use kpb_core::Keypoint;
use rayon::prelude::*;

/// Oriented FAST over an image pyramid, ranked by Harris response
pub struct OrbDetector {
    params: OrbParams,
}

impl OrbDetector {
    pub fn new(params: OrbParams) -> Self {
        Self { params }
    }

    /// Feature budget per level, decaying geometrically with the scale factor
    pub fn features_per_level(&self, n_levels: usize) -> Vec<usize> {
        let p = &self.params;
        if n_levels == 0 {
            return Vec::new();
        }
        let factor = 1.0 / p.scale_factor;
        let mut desired = p.n_features as f32 * (1.0 - factor) / (1.0 - factor.powi(n_levels as i32));
        let mut budget = Vec::with_capacity(n_levels);
        let mut assigned = 0usize;
        for _ in 0..n_levels - 1 {
            let n = (desired.round() as usize).min(p.n_features - assigned);
            budget.push(n);
            assigned += n;
            desired *= factor;
        }
        budget.push(p.n_features.saturating_sub(assigned));
        budget
    }
}

impl KeypointDetector for OrbDetector {
    fn name(&self) -> &'static str {
        "ORB"
    }

    fn detect_keypoints(&self, img: &GrayImage) -> DetectResult<Vec<Keypoint>> {
        ensure_min_size(img, 7)?;
        let p = &self.params;
        let (w, h) = img.dimensions();
        let levels = ImagePyramid::generate_scale_levels(w as usize, h as usize, p.n_levels, p.scale_factor, 7);
        let pyramid = ImagePyramid::build(img, &levels);
        let budget = self.features_per_level(p.n_levels);
        let border = p.edge_threshold as f32;
        let half_patch = (p.patch_size / 2) as f32;

        let per_level: Vec<Vec<Keypoint>> = levels
            .par_iter()
            .zip(pyramid.par_iter())
            .map(|(level, level_img)| {
                let desired = budget[level.level];
                let mut kps: Vec<Keypoint> =
                    CornerDetector::detect_fast(level_img, p.fast_threshold, true, 3)
                        .into_iter()
                        .map(|(x, y, score)| Keypoint::new(x as f32, y as f32, p.patch_size as f32).with_response(score))
                        .collect();
                KeypointRefinement::remove_border(&mut kps, level_img.width(), level_img.height(), border.max(half_patch));
                KeypointRefinement::retain_best(&mut kps, 2 * desired);

                let gradients = Gradients::sobel(level_img);
                for kp in kps.iter_mut() {
                    kp.response = gradients.harris_at(kp.x as usize, kp.y as usize, p.harris_block_size, 0.04);
                }
                KeypointRefinement::retain_best(&mut kps, desired);

                kps.into_iter()
                    .map(|kp| {
                        let angle = KeypointRefinement::intensity_centroid_angle(level_img, kp.x, kp.y, p.patch_size);
                        Keypoint::new(kp.x * level.scale, kp.y * level.scale, p.patch_size as f32 * level.scale)
                            .with_response(kp.response)
                            .with_angle(angle)
                            .with_octave(level.level as u32)
                    })
                    .collect()
            })
            .collect();

        Ok(per_level.into_iter().flatten().collect())
    }
}
