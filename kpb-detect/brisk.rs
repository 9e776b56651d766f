use crate::config::BriskParams;
use crate::corner_detection::CornerDetector;
use crate::detector::{ensure_min_size, KeypointDetector};
use crate::error::DetectResult;
use crate::refinement::KeypointRefinement;
use crate::types::FloatImage;
use image::imageops::{self, FilterType};
use image::GrayImage;
use kpb_core::Keypoint;
use rayon::prelude::*;

/// One octave or intra-octave layer of the BRISK scale space
struct Layer {
    image: GrayImage,
    scale: f32,
    scores: FloatImage,
}

impl Layer {
    /// Largest score in the 3x3 neighbourhood of the position that maps to
    /// full-resolution (fx, fy)
    fn max_score_near(&self, fx: f32, fy: f32) -> f32 {
        let x = (fx / self.scale).round() as isize;
        let y = (fy / self.scale).round() as isize;
        let mut best = 0.0f32;
        for dy in -1..=1 {
            for dx in -1..=1 {
                best = best.max(self.scores.get_clamped(x + dx, y + dy));
            }
        }
        best
    }
}

/// Multi-scale FAST detector over octaves and intra-octaves (scale 1.5 x
/// 2^i), keeping corners that dominate their neighbours in space and scale.
pub struct BriskDetector {
    params: BriskParams,
}

impl BriskDetector {
    pub fn new(params: BriskParams) -> Self {
        Self { params }
    }

    fn build_layers(&self, img: &GrayImage) -> Vec<Layer> {
        let n_layers = (2 * self.params.octaves).max(1);
        let mut images: Vec<(GrayImage, f32)> = Vec::with_capacity(n_layers);
        images.push((img.clone(), 1.0));

        if n_layers > 1 {
            let (w, h) = img.dimensions();
            let intra = imageops::resize(img, (w as f32 / 1.5) as u32, (h as f32 / 1.5) as u32, FilterType::Triangle);
            images.push((intra, 1.5));
        }
        while images.len() < n_layers {
            let (prev, scale) = &images[images.len() - 2];
            let (w, h) = prev.dimensions();
            if w / 2 < 7 || h / 2 < 7 {
                break;
            }
            let next = imageops::resize(prev, w / 2, h / 2, FilterType::Triangle);
            let scale = scale * 2.0;
            images.push((next, scale));
        }

        let threshold = self.params.threshold;
        images
            .into_par_iter()
            .filter(|(image, _)| image.width() >= 7 && image.height() >= 7)
            .map(|(image, scale)| {
                let scores = CornerDetector::fast_score_map(&image, threshold, 3);
                Layer { image, scale, scores }
            })
            .collect()
    }
}

impl KeypointDetector for BriskDetector {
    fn name(&self) -> &'static str {
        "BRISK"
    }

    fn detect_keypoints(&self, img: &GrayImage) -> DetectResult<Vec<Keypoint>> {
        ensure_min_size(img, 7)?;
        let layers = self.build_layers(img);
        let base_size = self.params.base_size;

        let per_layer: Vec<Vec<Keypoint>> = (0..layers.len())
            .into_par_iter()
            .map(|i| {
                let layer = &layers[i];
                // layers are ordered c0, d0, c1, d1, ... so neighbours in
                // scale are the adjacent indices
                let below = i.checked_sub(1).map(|j| &layers[j]);
                let above = layers.get(i + 1);
                let map = &layer.scores;
                let mut found = Vec::new();
                for y in 1..map.height.saturating_sub(1) {
                    for x in 1..map.width.saturating_sub(1) {
                        let s = map.get(x, y);
                        if s <= 0.0 || !map.is_plateau_max_3x3(x, y) {
                            continue;
                        }
                        let (ox, oy) = KeypointRefinement::subpixel_offset(map, x, y);
                        let fx = (x as f32 + ox) * layer.scale;
                        let fy = (y as f32 + oy) * layer.scale;
                        let dominated = below.map_or(false, |l| l.max_score_near(fx, fy) > s)
                            || above.map_or(false, |l| l.max_score_near(fx, fy) > s);
                        if dominated {
                            continue;
                        }
                        found.push(
                            Keypoint::new(fx, fy, base_size * layer.scale)
                                .with_response(s)
                                .with_octave(i as u32),
                        );
                    }
                }
                log::trace!(
                    "brisk layer {} ({}x{}, scale {:.2}): {} keypoints",
                    i,
                    layer.image.width(),
                    layer.image.height(),
                    layer.scale,
                    found.len()
                );
                found
            })
            .collect();

        Ok(per_layer.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_layer_scales() {
        let img = GrayImage::new(120, 90);
        let layers = BriskDetector::new(BriskParams::default()).build_layers(&img);
        let scales: Vec<f32> = layers.iter().map(|l| l.scale).collect();
        assert_eq!(scales, vec![1.0, 1.5, 2.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_uniform_image_has_no_keypoints() {
        let img = GrayImage::from_pixel(100, 100, Luma([77]));
        let kps = BriskDetector::new(BriskParams::default()).detect_keypoints(&img).unwrap();
        assert!(kps.is_empty());
    }

    #[test]
    fn test_dots_are_found_at_fine_scale() {
        let dots = [(30u32, 30u32), (80, 40), (50, 90)];
        let mut img = GrayImage::from_pixel(128, 128, Luma([40]));
        for &(x, y) in &dots {
            img.put_pixel(x, y, Luma([230]));
        }
        let kps = BriskDetector::new(BriskParams::default()).detect_keypoints(&img).unwrap();
        for &(x, y) in &dots {
            assert!(kps
                .iter()
                .any(|k| k.octave == 0 && (k.x - x as f32).abs() < 1.0 && (k.y - y as f32).abs() < 1.0));
        }
        for kp in &kps {
            let near = dots
                .iter()
                .any(|&(x, y)| (kp.x - x as f32).abs() <= 8.0 && (kp.y - y as f32).abs() <= 8.0);
            assert!(near, "spurious keypoint at ({}, {})", kp.x, kp.y);
            assert!((kp.size / 12.0 - [1.0, 1.5, 2.0, 3.0, 4.0, 6.0][kp.octave as usize]).abs() < 1e-4);
        }
    }
}
