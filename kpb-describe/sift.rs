use crate::DescriptorExtractor;
use crate::error::DescribeResult;
use image::GrayImage;
use kpb_core::{DescriptorMatrix, Descriptors, DistanceMetric, Keypoint};
use kpb_detect::{FloatImage, SiftParams, SiftPyramid};
use rayon::prelude::*;
use std::f32::consts::{SQRT_2, TAU};

const HIST_WIDTH: usize = 4;
const ORI_BINS: usize = 8;
pub const SIFT_LEN: usize = HIST_WIDTH * HIST_WIDTH * ORI_BINS;
/// Spatial bin width in units of the keypoint scale
const SCALE_FACTOR: f32 = 3.0;
const MAG_THRESHOLD: f32 = 0.2;
const INT_FACTOR: f32 = 512.0;

/// Gradient histogram descriptor on the Gaussian pyramid.
///
/// Works for keypoints from any detector: the pyramid image closest to the
/// keypoint's scale is picked from its `size`.
pub struct SiftExtractor {
    params: SiftParams,
}

impl SiftExtractor {
    pub fn new(params: SiftParams) -> Self {
        Self { params }
    }

    /// Octave, layer and the keypoint scale in that octave's pixels
    fn locate(&self, pyramid: &SiftPyramid, kp: &Keypoint) -> (usize, usize, f32) {
        let sigma = self.params.sigma;
        let layers = self.params.octave_layers;
        let kp_scale = (kp.size / 2.0).max(sigma);
        let octave = ((kp_scale / sigma).log2().floor().max(0.0) as usize).min(pyramid.gaussians.len() - 1);
        let local = kp_scale / 2f32.powi(octave as i32);
        let layer = (layers as f32 * (local / sigma).log2()).round().clamp(0.0, (layers + 2) as f32) as usize;
        (octave, layer, local)
    }

    fn describe_one(&self, pyramid: &SiftPyramid, kp: &Keypoint) -> [f32; SIFT_LEN] {
        let (octave, layer, scale) = self.locate(pyramid, kp);
        let img = &pyramid.gaussians[octave][layer];
        let ratio = 2f32.powi(octave as i32);
        let (x, y) = ((kp.x / ratio).round() as isize, (kp.y / ratio).round() as isize);
        histogram(img, x, y, kp.angle.unwrap_or(0.0), scale)
    }
}

/// 4x4 spatial cells of 8 orientation bins with trilinear interpolation,
/// normalised, clipped and rescaled.
fn histogram(img: &FloatImage, x: isize, y: isize, angle: f32, scale: f32) -> [f32; SIFT_LEN] {
    let d = HIST_WIDTH as f32;
    let bins_per_rad = ORI_BINS as f32 / TAU;
    let hist_width = SCALE_FACTOR * scale;
    let diagonal = ((img.width * img.width + img.height * img.height) as f32).sqrt();
    let radius = (hist_width * SQRT_2 * (d + 1.0) * 0.5).round().min(diagonal) as isize;
    let (sin, cos) = angle.sin_cos();
    let (sin_t, cos_t) = (sin / hist_width, cos / hist_width);
    let exp_scale = -1.0 / (d * d * 0.5);

    // padded by one cell on every side so interpolation never branches
    let stride = HIST_WIDTH + 2;
    let mut hist = vec![0.0f32; stride * stride * (ORI_BINS + 2)];
    for i in -radius..=radius {
        for j in -radius..=radius {
            let c_rot = j as f32 * cos_t - i as f32 * sin_t;
            let r_rot = j as f32 * sin_t + i as f32 * cos_t;
            let rbin = r_rot + d / 2.0 - 0.5;
            let cbin = c_rot + d / 2.0 - 0.5;
            let (r, c) = (y + i, x + j);
            if rbin <= -1.0 || rbin >= d || cbin <= -1.0 || cbin >= d {
                continue;
            }
            if r <= 0 || c <= 0 || r >= img.height as isize - 1 || c >= img.width as isize - 1 {
                continue;
            }
            let dx = img.get_clamped(c + 1, r) - img.get_clamped(c - 1, r);
            let dy = img.get_clamped(c, r + 1) - img.get_clamped(c, r - 1);
            let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
            let mag = (dx * dx + dy * dy).sqrt() * weight;
            let obin = (dy.atan2(dx) - angle).rem_euclid(TAU) * bins_per_rad;

            let (r0, c0, o0) = (rbin.floor(), cbin.floor(), obin.floor());
            let (fr, fc, fo) = (rbin - r0, cbin - c0, obin - o0);
            let (r0, c0) = ((r0 as isize + 1) as usize, (c0 as isize + 1) as usize);
            let o0 = o0 as usize % ORI_BINS;
            for (dr, wr) in [(0, 1.0 - fr), (1, fr)] {
                for (dc, wc) in [(0, 1.0 - fc), (1, fc)] {
                    for (dob, wo) in [(0, 1.0 - fo), (1, fo)] {
                        let idx = ((r0 + dr) * stride + c0 + dc) * (ORI_BINS + 2) + o0 + dob;
                        hist[idx] += mag * wr * wc * wo;
                    }
                }
            }
        }
    }

    // fold the wrapped orientation bin back and drop the padding
    let mut out = [0.0f32; SIFT_LEN];
    for r in 0..HIST_WIDTH {
        for c in 0..HIST_WIDTH {
            let base = ((r + 1) * stride + c + 1) * (ORI_BINS + 2);
            let mut cell = [0.0f32; ORI_BINS];
            cell.copy_from_slice(&hist[base..base + ORI_BINS]);
            cell[0] += hist[base + ORI_BINS];
            cell[1] += hist[base + ORI_BINS + 1];
            out[(r * HIST_WIDTH + c) * ORI_BINS..][..ORI_BINS].copy_from_slice(&cell);
        }
    }

    let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
    let threshold = norm * MAG_THRESHOLD;
    for v in out.iter_mut() {
        *v = v.min(threshold);
    }
    let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt().max(f32::EPSILON);
    for v in out.iter_mut() {
        *v = (*v * INT_FACTOR / norm).round().min(255.0);
    }
    out
}

impl DescriptorExtractor for SiftExtractor {
    fn name(&self) -> &'static str {
        "SIFT"
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::L2
    }

    fn compute(&self, keypoints: &[Keypoint], img: &GrayImage) -> DescribeResult<Descriptors> {
        let mut m = DescriptorMatrix::with_capacity(SIFT_LEN, keypoints.len());
        if keypoints.is_empty() {
            return Ok(Descriptors::Float(m));
        }
        let pyramid = SiftPyramid::build(img, self.params.octave_layers, self.params.sigma);
        let rows: Vec<[f32; SIFT_LEN]> = keypoints.par_iter().map(|kp| self.describe_one(&pyramid, kp)).collect();
        for row in &rows {
            m.push_row(row);
        }
        Ok(Descriptors::Float(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn ramp(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| Luma([(x * 2) as u8]))
    }

    #[test]
    fn test_descriptor_values_are_bounded() {
        let img = GrayImage::from_fn(96, 96, |x, y| Luma([((x * 7 + y * 11) % 53 * 4) as u8]));
        let kps = [Keypoint::new(48.0, 48.0, 6.4), Keypoint::new(1.0, 94.0, 20.0)];
        let Descriptors::Float(m) = SiftExtractor::new(SiftParams::default()).compute(&kps, &img).unwrap() else {
            panic!("expected float descriptors");
        };
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 128);
        assert!(m.as_slice().iter().all(|v| (0.0..=255.0).contains(v)));
        assert!(m.row(0).iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_ramp_votes_into_a_single_orientation() {
        let img = ramp(96, 96);
        let kp = Keypoint::new(48.0, 48.0, 6.4).with_angle(0.0);
        let Descriptors::Float(m) = SiftExtractor::new(SiftParams::default()).compute(&[kp], &img).unwrap() else {
            panic!("expected float descriptors");
        };
        // gradient along +x lands in orientation bin 0 (and its wrap neighbour)
        let row = m.row(0);
        let bin0: f32 = row.chunks(ORI_BINS).map(|cell| cell[0]).sum();
        let others: f32 = row.chunks(ORI_BINS).map(|cell| cell[2..7].iter().sum::<f32>()).sum();
        assert!(bin0 > 0.0);
        assert_eq!(others, 0.0);
    }

    #[test]
    fn test_flat_image_is_all_zero() {
        let img = GrayImage::from_pixel(64, 64, Luma([77]));
        let d = SiftExtractor::new(SiftParams::default())
            .compute(&[Keypoint::new(32.0, 32.0, 4.0)], &img)
            .unwrap();
        let Descriptors::Float(m) = d else { panic!("expected float descriptors") };
        assert!(m.row(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_large_keypoints_use_coarser_octaves() {
        let img = ramp(128, 128);
        let ext = SiftExtractor::new(SiftParams::default());
        let pyramid = SiftPyramid::build(&img, 3, 1.6);
        let (o_small, _, _) = ext.locate(&pyramid, &Keypoint::new(64.0, 64.0, 3.2));
        let (o_large, _, _) = ext.locate(&pyramid, &Keypoint::new(64.0, 64.0, 26.0));
        assert_eq!(o_small, 0);
        assert!(o_large >= 2);
    }
}
