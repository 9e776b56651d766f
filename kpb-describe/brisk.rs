use crate::DescriptorExtractor;
use crate::error::DescribeResult;
use crate::sampling::{IntegralImage, pack_bits};
use image::GrayImage;
use kpb_core::{DescriptorMatrix, Descriptors, DistanceMetric, Keypoint};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use std::f32::consts::PI;

pub const BRISK_BYTES: usize = 64;
const RADII: [f32; 5] = [0.0, 2.9, 4.9, 7.4, 10.8];
const COUNTS: [usize; 5] = [1, 10, 14, 15, 20];
const LONG_PAIR_MIN: f32 = 13.67;
/// Keypoint size the unscaled pattern corresponds to
const BASE_SIZE: f32 = 12.0;

struct PatternPoint {
    x: f32,
    y: f32,
    sigma: f32,
}

struct BriskPattern {
    points: Vec<PatternPoint>,
    short_pairs: Vec<(usize, usize)>,
    long_pairs: Vec<(usize, usize)>,
}

static PATTERN: Lazy<BriskPattern> = Lazy::new(|| {
    let mut points = Vec::with_capacity(COUNTS.iter().sum());
    for (&r, &n) in RADII.iter().zip(&COUNTS) {
        let sigma = if r == 0.0 { 0.5 } else { 0.85 * PI * r / n as f32 };
        for k in 0..n {
            let theta = 2.0 * PI * k as f32 / n as f32;
            points.push(PatternPoint {
                x: r * theta.cos(),
                y: r * theta.sin(),
                sigma,
            });
        }
    }

    let mut pairs = Vec::with_capacity(points.len() * (points.len() - 1) / 2);
    for i in 1..points.len() {
        for j in 0..i {
            let d = ((points[i].x - points[j].x).powi(2) + (points[i].y - points[j].y).powi(2)).sqrt();
            pairs.push((i, j, d));
        }
    }
    let long_pairs = pairs
        .iter()
        .filter(|p| p.2 > LONG_PAIR_MIN)
        .map(|&(i, j, _)| (i, j))
        .collect();
    pairs.sort_by(|a, b| a.2.total_cmp(&b.2));
    let short_pairs = pairs
        .iter()
        .take(BRISK_BYTES * 8)
        .map(|&(i, j, _)| (i, j))
        .collect();

    BriskPattern {
        points,
        short_pairs,
        long_pairs,
    }
});

/// Concentric-ring binary descriptor with box-smoothed samples and a
/// gradient orientation estimated from the long-distance pairs.
pub struct BriskExtractor;

impl BriskExtractor {
    pub fn new() -> Self {
        Self
    }

    fn sample_ring(ii: &IntegralImage, kp: &Keypoint, scale: f32, angle: f32) -> Vec<f32> {
        let (sin, cos) = angle.sin_cos();
        PATTERN
            .points
            .iter()
            .map(|p| {
                let u = (p.x * cos - p.y * sin) * scale;
                let v = (p.x * sin + p.y * cos) * scale;
                ii.box_mean(kp.x + u, kp.y + v, p.sigma * scale)
            })
            .collect()
    }

    /// Mean local gradient over the long pairs, in pattern coordinates
    fn orientation(values: &[f32], scale: f32) -> f32 {
        let (mut gx, mut gy) = (0.0f32, 0.0f32);
        for &(i, j) in &PATTERN.long_pairs {
            let (pi, pj) = (&PATTERN.points[i], &PATTERN.points[j]);
            let (dx, dy) = ((pj.x - pi.x) * scale, (pj.y - pi.y) * scale);
            let w = (values[j] - values[i]) / (dx * dx + dy * dy);
            gx += w * dx;
            gy += w * dy;
        }
        gy.atan2(gx)
    }

    fn describe_one(ii: &IntegralImage, kp: &Keypoint) -> [u8; BRISK_BYTES] {
        let scale = if kp.size > 0.0 { kp.size / BASE_SIZE } else { 1.0 };
        let upright = Self::sample_ring(ii, kp, scale, 0.0);
        let angle = Self::orientation(&upright, scale);
        let values = Self::sample_ring(ii, kp, scale, angle);
        let mut d = [0u8; BRISK_BYTES];
        pack_bits(PATTERN.short_pairs.iter().map(|&(i, j)| values[i] > values[j]), &mut d);
        d
    }
}

impl Default for BriskExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorExtractor for BriskExtractor {
    fn name(&self) -> &'static str {
        "BRISK"
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Hamming
    }

    fn compute(&self, keypoints: &[Keypoint], img: &GrayImage) -> DescribeResult<Descriptors> {
        let mut m = DescriptorMatrix::with_capacity(BRISK_BYTES, keypoints.len());
        if keypoints.is_empty() {
            return Ok(Descriptors::Binary(m));
        }
        let ii = IntegralImage::new(img);
        let rows: Vec<[u8; BRISK_BYTES]> = keypoints.par_iter().map(|kp| Self::describe_one(&ii, kp)).collect();
        for row in &rows {
            m.push_row(row);
        }
        Ok(Descriptors::Binary(m))
    }
}
