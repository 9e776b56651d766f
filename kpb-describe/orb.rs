use crate::DescriptorExtractor;
use crate::error::DescribeResult;
use crate::sampling::{pack_bits, sample_bilinear, smooth};
use image::GrayImage;
use kpb_core::{DescriptorMatrix, Descriptors, DistanceMetric, Keypoint};
use kpb_detect::KeypointRefinement;
use once_cell::sync::Lazy;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

pub const ORB_BYTES: usize = 32;
const PATCH_SIZE: f32 = 31.0;

/// Test pairs in patch coordinates, clipped to the 31x31 patch
static ORB_PAIRS: Lazy<Vec<[f32; 4]>> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(0x6f72_625f_7061_6972);
    let sigma = PATCH_SIZE / 5.0;
    let half = (PATCH_SIZE - 1.0) / 2.0;
    (0..ORB_BYTES * 8)
        .map(|_| {
            let mut sample = || {
                let z: f32 = StandardNormal.sample(&mut rng);
                (z * sigma).round().clamp(-half, half)
            };
            [sample(), sample(), sample(), sample()]
        })
        .collect()
});

/// Rotated BRIEF ("steered" tests) on a smoothed image.
///
/// The pattern is scaled by `size / 31` so pyramid keypoints sample a patch
/// proportional to their scale.
pub struct OrbExtractor;

impl OrbExtractor {
    pub fn new() -> Self {
        Self
    }

    fn describe_one(raw: &GrayImage, smoothed: &GrayImage, kp: &Keypoint) -> [u8; ORB_BYTES] {
        let angle = kp
            .angle
            .unwrap_or_else(|| KeypointRefinement::intensity_centroid_angle(raw, kp.x, kp.y, PATCH_SIZE as usize));
        let scale = if kp.size > 0.0 { kp.size / PATCH_SIZE } else { 1.0 };
        let (sin, cos) = angle.sin_cos();
        let at = |px: f32, py: f32| {
            let u = (px * cos - py * sin) * scale;
            let v = (px * sin + py * cos) * scale;
            sample_bilinear(smoothed, kp.x + u, kp.y + v)
        };
        let mut d = [0u8; ORB_BYTES];
        pack_bits(ORB_PAIRS.iter().map(|&[x1, y1, x2, y2]| at(x1, y1) < at(x2, y2)), &mut d);
        d
    }
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorExtractor for OrbExtractor {
    fn name(&self) -> &'static str {
        "ORB"
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Hamming
    }

    fn compute(&self, keypoints: &[Keypoint], img: &GrayImage) -> DescribeResult<Descriptors> {
        let mut m = DescriptorMatrix::with_capacity(ORB_BYTES, keypoints.len());
        if keypoints.is_empty() {
            return Ok(Descriptors::Binary(m));
        }
        let smoothed = smooth(img, 2.0);
        let rows: Vec<[u8; ORB_BYTES]> = keypoints
            .par_iter()
            .map(|kp| Self::describe_one(img, &smoothed, kp))
            .collect();
        for row in &rows {
            m.push_row(row);
        }
        Ok(Descriptors::Binary(m))
    }
}
