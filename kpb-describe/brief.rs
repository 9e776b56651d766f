use crate::error::DescribeResult;
use crate::sampling::{pack_bits, smooth};
use crate::DescriptorExtractor;
use image::GrayImage;
use kpb_core::{DescriptorMatrix, Descriptors, DistanceMetric, Keypoint};
use once_cell::sync::Lazy;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

pub const BRIEF_BYTES: usize = 32;
const PATCH_SIZE: f32 = 48.0;
const SMOOTHING_SIGMA: f32 = 2.0;

/// Point pairs drawn from an isotropic Gaussian (sigma^2 = S^2 / 25) around
/// the keypoint and clipped to the patch. Seeded so every frame shares the
/// same pattern.
static BRIEF_PAIRS: Lazy<Vec<[i8; 4]>> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(0x6272_6965_6600);
    let sigma = PATCH_SIZE / 5.0;
    let half = PATCH_SIZE / 2.0 - 1.0;
    (0..BRIEF_BYTES * 8)
        .map(|_| {
            let mut sample = || {
                let z: f32 = StandardNormal.sample(&mut rng);
                (z * sigma).round().clamp(-half, half) as i8
            };
            [sample(), sample(), sample(), sample()]
        })
        .collect()
});

/// Binary test `I(p) < I(q)` on a Gaussian-smoothed image. The pattern is
/// axis-aligned, so keypoint orientation is ignored.
pub struct BriefExtractor;

impl BriefExtractor {
    pub fn new() -> Self {
        Self
    }

    fn describe_one(img: &GrayImage, kp: &Keypoint) -> [u8; BRIEF_BYTES] {
        let (w, h) = (img.width() as i32, img.height() as i32);
        let (cx, cy) = (kp.x.round() as i32, kp.y.round() as i32);
        let at = |dx: i8, dy: i8| {
            let x = (cx + dx as i32).clamp(0, w - 1) as u32;
            let y = (cy + dy as i32).clamp(0, h - 1) as u32;
            img.get_pixel(x, y)[0]
        };
        let mut d = [0u8; BRIEF_BYTES];
        pack_bits(BRIEF_PAIRS.iter().map(|&[x1, y1, x2, y2]| at(x1, y1) < at(x2, y2)), &mut d);
        d
    }
}

impl Default for BriefExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorExtractor for BriefExtractor {
    fn name(&self) -> &'static str {
        "BRIEF"
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Hamming
    }

    fn compute(&self, keypoints: &[Keypoint], img: &GrayImage) -> DescribeResult<Descriptors> {
        if keypoints.is_empty() {
            return Ok(Descriptors::Binary(DescriptorMatrix::new(BRIEF_BYTES)));
        }
        let smoothed = smooth(img, SMOOTHING_SIGMA);
        let rows: Vec<[u8; BRIEF_BYTES]> = keypoints
            .par_iter()
            .map(|kp| Self::describe_one(&smoothed, kp))
            .collect();
        let mut m = DescriptorMatrix::with_capacity(BRIEF_BYTES, rows.len());
        for row in &rows {
            m.push_row(row);
        }
        Ok(Descriptors::Binary(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn texture(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([((x * 31 + y * 17) % 97 * 2 + (x / 8 + y / 8) % 3 * 20) as u8]))
    }

    #[test]
    fn test_pattern_is_deterministic_and_bounded() {
        assert_eq!(BRIEF_PAIRS.len(), 256);
        assert!(BRIEF_PAIRS.iter().flatten().all(|&v| (-23..=23).contains(&v)));
        // not every pair can be degenerate
        assert!(BRIEF_PAIRS.iter().filter(|p| p[0] != p[2] || p[1] != p[3]).count() > 200);
    }

    #[test]
    fn test_rows_match_keypoints_even_at_border() {
        let img = texture(64, 64);
        let kps = vec![
            Keypoint::new(0.0, 0.0, 7.0),
            Keypoint::new(32.0, 32.0, 7.0),
            Keypoint::new(63.0, 10.0, 7.0),
        ];
        let d = BriefExtractor::new().compute(&kps, &img).unwrap();
        assert_eq!(d.rows(), 3);
        assert_eq!(d.cols(), 32);
        assert_eq!(d.metric(), DistanceMetric::Hamming);
    }

    #[test]
    fn test_same_patch_same_descriptor() {
        let img = texture(128, 64);
        let mut twin = GrayImage::new(128, 64);
        for y in 0..64 {
            for x in 0..64 {
                let v = img.get_pixel(x, y)[0];
                twin.put_pixel(x, y, Luma([v]));
                twin.put_pixel(x + 64, y, Luma([v]));
            }
        }
        let kps = vec![Keypoint::new(32.0, 32.0, 7.0), Keypoint::new(96.0, 32.0, 7.0)];
        let Descriptors::Binary(m) = BriefExtractor::new().compute(&kps, &twin).unwrap() else {
            panic!("expected binary descriptors");
        };
        assert_eq!(m.row(0), m.row(1));
    }

    #[test]
    fn test_empty_keypoints_give_empty_matrix() {
        let img = texture(32, 32);
        let d = BriefExtractor::new().compute(&[], &img).unwrap();
        assert!(d.is_empty());
        assert_eq!(d.cols(), 32);
    }
}
