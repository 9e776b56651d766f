use crate::types::ScaleLevel;
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Image pyramid operations for multi-scale feature detection
pub struct ImagePyramid;

impl ImagePyramid {
    /// Scale levels with a constant `scale_factor` between consecutive
    /// levels; stops early once a level would shrink below `min_size`.
    pub fn generate_scale_levels(
        width: usize,
        height: usize,
        n_levels: usize,
        scale_factor: f32,
        min_size: usize,
    ) -> Vec<ScaleLevel> {
        let mut levels = Vec::with_capacity(n_levels);
        let mut current_scale = 1.0f32;

        for level in 0..n_levels {
            let scaled_width = ((width as f32) / current_scale).round() as usize;
            let scaled_height = ((height as f32) / current_scale).round() as usize;

            if scaled_width < min_size || scaled_height < min_size {
                break;
            }

            levels.push(ScaleLevel {
                level,
                scale: current_scale,
                width: scaled_width,
                height: scaled_height,
            });
            current_scale *= scale_factor;
        }

        levels
    }

    /// One resized image per scale level; level 0 is a copy of `img`.
    pub fn build(img: &GrayImage, scale_levels: &[ScaleLevel]) -> Vec<GrayImage> {
        scale_levels
            .iter()
            .map(|sl| {
                if sl.level == 0 || (sl.width as u32, sl.height as u32) == img.dimensions() {
                    img.clone()
                } else {
                    imageops::resize(img, sl.width as u32, sl.height as u32, FilterType::Triangle)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_levels_follow_factor() {
        let levels = ImagePyramid::generate_scale_levels(640, 480, 8, 1.2, 32);
        assert_eq!(levels.len(), 8);
        assert_eq!(levels[0].width, 640);
        assert!((levels[1].scale - 1.2).abs() < 1e-6);
        assert!(levels.windows(2).all(|w| w[1].width < w[0].width));
    }

    #[test]
    fn test_small_images_stop_early() {
        let levels = ImagePyramid::generate_scale_levels(40, 40, 8, 1.2, 32);
        assert_eq!(levels.len(), 2);
        let img = GrayImage::new(40, 40);
        let pyr = ImagePyramid::build(&img, &levels);
        assert_eq!(pyr[1].dimensions(), (levels[1].width as u32, levels[1].height as u32));
    }
}
