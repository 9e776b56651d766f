use crate::DescriptorExtractor;
use crate::error::DescribeResult;
use crate::sampling::{IntegralImage, pack_bits};
use image::GrayImage;
use kpb_core::{DescriptorMatrix, Descriptors, DistanceMetric, Keypoint};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use std::f32::consts::PI;

pub const FREAK_BYTES: usize = 64;
const RINGS: usize = 7;
const POINTS_PER_RING: usize = 6;
const PATTERN_SCALE: f32 = 22.0;
/// Keypoint size at which the pattern has its nominal scale
const SMALLEST_KP_SIZE: f32 = 7.0;

struct RetinaPoint {
    x: f32,
    y: f32,
    sigma: f32,
}

struct RetinaPattern {
    points: Vec<RetinaPoint>,
    pairs: Vec<(usize, usize)>,
    orientation_pairs: Vec<(usize, usize)>,
}

/// Ring radii in pattern units, outermost first; the receptive fields
/// shrink and overlap towards the centre.
fn ring_radii() -> [f32; RINGS] {
    let big_r = 2.0 / 3.0;
    let small_r = 2.0 / 24.0;
    let unit = (big_r - small_r) / 21.0;
    [
        big_r,
        big_r - 6.0 * unit,
        big_r - 11.0 * unit,
        big_r - 15.0 * unit,
        big_r - 18.0 * unit,
        big_r - 20.0 * unit,
        small_r,
    ]
}

static PATTERN: Lazy<RetinaPattern> = Lazy::new(|| {
    let radii = ring_radii();
    let mut points = Vec::with_capacity(RINGS * POINTS_PER_RING + 1);
    for (ring, &r) in radii.iter().enumerate() {
        let offset = if ring % 2 == 1 { PI / POINTS_PER_RING as f32 } else { 0.0 };
        for k in 0..POINTS_PER_RING {
            let theta = 2.0 * PI * k as f32 / POINTS_PER_RING as f32 + offset;
            points.push(RetinaPoint {
                x: r * theta.cos(),
                y: r * theta.sin(),
                sigma: r / 2.0,
            });
        }
    }
    points.push(RetinaPoint {
        x: 0.0,
        y: 0.0,
        sigma: radii[RINGS - 1] / 2.0,
    });

    // coarse-to-fine: pairs of large receptive fields come first
    let mut all = Vec::with_capacity(points.len() * (points.len() - 1) / 2);
    for i in 1..points.len() {
        for j in 0..i {
            all.push((i, j, points[i].sigma + points[j].sigma));
        }
    }
    all.sort_by(|a, b| b.2.total_cmp(&a.2));
    let pairs = all.iter().take(FREAK_BYTES * 8).map(|&(i, j, _)| (i, j)).collect();

    // opposite and second-neighbour points on every ring
    let mut orientation_pairs = Vec::with_capacity(RINGS * POINTS_PER_RING);
    for ring in 0..RINGS {
        let base = ring * POINTS_PER_RING;
        for k in 0..POINTS_PER_RING / 2 {
            orientation_pairs.push((base + k, base + k + POINTS_PER_RING / 2));
            orientation_pairs.push((base + k, base + (k + 2) % POINTS_PER_RING));
        }
    }

    RetinaPattern {
        points,
        pairs,
        orientation_pairs,
    }
});

/// Fast Retina Keypoint descriptor
pub struct FreakExtractor;

impl FreakExtractor {
    pub fn new() -> Self {
        Self
    }

    fn sample(ii: &IntegralImage, kp: &Keypoint, scale: f32, angle: f32) -> Vec<f32> {
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

    fn orientation(values: &[f32]) -> f32 {
        let (mut ox, mut oy) = (0.0f32, 0.0f32);
        for &(i, j) in &PATTERN.orientation_pairs {
            let (pi, pj) = (&PATTERN.points[i], &PATTERN.points[j]);
            let (dx, dy) = (pi.x - pj.x, pi.y - pj.y);
            let norm = (dx * dx + dy * dy).sqrt();
            let diff = values[i] - values[j];
            ox += diff * dx / norm;
            oy += diff * dy / norm;
        }
        oy.atan2(ox)
    }

    fn describe_one(ii: &IntegralImage, kp: &Keypoint) -> [u8; FREAK_BYTES] {
        let size = if kp.size > 0.0 { kp.size } else { SMALLEST_KP_SIZE };
        let scale = PATTERN_SCALE * size / SMALLEST_KP_SIZE;
        let angle = Self::orientation(&Self::sample(ii, kp, scale, 0.0));
        let values = Self::sample(ii, kp, scale, angle);
        let mut d = [0u8; FREAK_BYTES];
        pack_bits(PATTERN.pairs.iter().map(|&(i, j)| values[i] > values[j]), &mut d);
        d
    }
}

impl Default for FreakExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorExtractor for FreakExtractor {
    fn name(&self) -> &'static str {
        "FREAK"
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Hamming
    }

    fn compute(&self, keypoints: &[Keypoint], img: &GrayImage) -> DescribeResult<Descriptors> {
        let mut m = DescriptorMatrix::with_capacity(FREAK_BYTES, keypoints.len());
        if keypoints.is_empty() {
            return Ok(Descriptors::Binary(m));
        }
        let ii = IntegralImage::new(img);
        let rows: Vec<[u8; FREAK_BYTES]> = keypoints.par_iter().map(|kp| Self::describe_one(&ii, kp)).collect();
        for row in &rows {
            m.push_row(row);
        }
        Ok(Descriptors::Binary(m))
    }
}
