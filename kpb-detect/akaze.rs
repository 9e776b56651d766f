use crate::config::AkazeParams;
use crate::detector::{ensure_min_size, KeypointDetector};
use crate::error::DetectResult;
use crate::refinement::KeypointRefinement;
use crate::scale_space::ScaleSpace;
use crate::types::FloatImage;
use image::GrayImage;
use kpb_core::Keypoint;
use rayon::prelude::*;
use std::f32::consts::PI;

const DERIVATIVE_FACTOR: f32 = 1.5;
const HISTOGRAM_BINS: usize = 300;
const DEFAULT_CONTRAST: f32 = 0.03;
const MIN_OCTAVE_SIZE: usize = 16;
/// Stability limit of the explicit diffusion scheme
const MAX_TAU: f32 = 0.25;

/// One image of the nonlinear scale space together with its first
/// derivatives and scale-normalised Hessian determinant.
#[derive(Debug, Clone)]
pub struct Evolution {
    pub image: FloatImage,
    pub lx: FloatImage,
    pub ly: FloatImage,
    pub det: FloatImage,
    pub esigma: f32,
    pub octave: usize,
    pub sublevel: usize,
    /// Sampling step in pixels of this level's resolution
    pub sigma_size: usize,
    /// Downsampling factor relative to the input image
    pub ratio: f32,
}

impl Evolution {
    fn max_det_near(&self, fx: f32, fy: f32) -> f32 {
        let x = (fx / self.ratio).round() as isize;
        let y = (fy / self.ratio).round() as isize;
        let mut best = f32::NEG_INFINITY;
        for dy in -1..=1 {
            for dx in -1..=1 {
                best = best.max(self.det.get_clamped(x + dx, y + dy));
            }
        }
        best
    }
}

/// Perona-Malik (g2) scale space with octaves at halved resolution.
#[derive(Debug, Clone)]
pub struct AkazeScaleSpace {
    pub levels: Vec<Evolution>,
}

impl AkazeScaleSpace {
    pub fn build(img: &GrayImage, params: &AkazeParams) -> Self {
        let base = FloatImage::from_gray(img, 1.0 / 255.0);
        let mut current = ScaleSpace::gaussian_blur(&base, params.base_sigma);
        let mut k = contrast_factor(&current, params.contrast_percentile);
        let mut levels: Vec<Evolution> = Vec::with_capacity(params.octaves * params.sublevels);
        let mut prev_time = 0.5 * params.base_sigma * params.base_sigma;

        'octaves: for octave in 0..params.octaves {
            if octave > 0 {
                if current.width / 2 < MIN_OCTAVE_SIZE || current.height / 2 < MIN_OCTAVE_SIZE {
                    break 'octaves;
                }
                current = ScaleSpace::downsample_half(&ScaleSpace::gaussian_blur(&current, 1.0));
                k *= 0.75;
            }
            let ratio = 2f32.powi(octave as i32);
            for sublevel in 0..params.sublevels {
                let esigma = params.base_sigma
                    * 2f32.powf(sublevel as f32 / params.sublevels as f32 + octave as f32);
                let etime = 0.5 * esigma * esigma;
                if !levels.is_empty() {
                    diffuse(&mut current, k, etime - prev_time);
                }
                prev_time = etime;

                let sigma_size = ((esigma * DERIVATIVE_FACTOR / ratio).round() as usize).max(1);
                let (lx, ly, det) = hessian_response(&current, esigma / ratio);
                levels.push(Evolution {
                    image: current.clone(),
                    lx,
                    ly,
                    det,
                    esigma,
                    octave,
                    sublevel,
                    sigma_size,
                    ratio,
                });
            }
        }
        log::trace!("akaze scale space with {} levels, contrast {:.5}", levels.len(), k);
        Self { levels }
    }
}

/// Gradient magnitude at the given percentile of the non-zero histogram
fn contrast_factor(img: &FloatImage, percentile: f32) -> f32 {
    let smooth = ScaleSpace::gaussian_blur(img, 1.0);
    let lx = ScaleSpace::derivative_x(&smooth);
    let ly = ScaleSpace::derivative_y(&smooth);
    let magnitudes: Vec<f32> = lx
        .data
        .iter()
        .zip(ly.data.iter())
        .map(|(x, y)| (x * x + y * y).sqrt())
        .collect();
    let hmax = magnitudes.iter().copied().fold(0.0f32, f32::max);
    if hmax <= 0.0 {
        return DEFAULT_CONTRAST;
    }

    let mut hist = [0usize; HISTOGRAM_BINS];
    let mut npoints = 0usize;
    for &m in magnitudes.iter().filter(|&&m| m > 0.0) {
        let bin = ((m / hmax) * HISTOGRAM_BINS as f32).min(HISTOGRAM_BINS as f32 - 1.0) as usize;
        hist[bin] += 1;
        npoints += 1;
    }
    let target = (npoints as f32 * percentile) as usize;
    let mut acc = 0usize;
    let mut bin = 0usize;
    while bin < HISTOGRAM_BINS && acc + hist[bin] < target {
        acc += hist[bin];
        bin += 1;
    }
    let k = hmax * bin as f32 / HISTOGRAM_BINS as f32;
    if k > 0.0 { k } else { DEFAULT_CONTRAST }
}

/// Explicit nonlinear diffusion for `time` units, split into stable steps.
fn diffuse(img: &mut FloatImage, k: f32, time: f32) {
    if time <= 0.0 {
        return;
    }
    let smooth = ScaleSpace::gaussian_blur(img, 1.0);
    let gx = ScaleSpace::derivative_x(&smooth);
    let gy = ScaleSpace::derivative_y(&smooth);
    let inv_k2 = 1.0 / (k * k);
    let conductance = FloatImage {
        width: img.width,
        height: img.height,
        data: gx
            .data
            .iter()
            .zip(gy.data.iter())
            .map(|(x, y)| 1.0 / (1.0 + (x * x + y * y) * inv_k2))
            .collect(),
    };

    let steps = (time / MAX_TAU).ceil().max(1.0) as usize;
    let tau = time / steps as f32;
    let w = img.width;
    for _ in 0..steps {
        let prev = img.clone();
        img.data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let yi = y as isize;
            for (x, out) in row.iter_mut().enumerate() {
                let xi = x as isize;
                let c = conductance.get(x, y);
                let l = prev.get(x, y);
                let xpos = (c + conductance.get_clamped(xi + 1, yi)) * (prev.get_clamped(xi + 1, yi) - l);
                let xneg = (conductance.get_clamped(xi - 1, yi) + c) * (l - prev.get_clamped(xi - 1, yi));
                let ypos = (c + conductance.get_clamped(xi, yi + 1)) * (prev.get_clamped(xi, yi + 1) - l);
                let yneg = (conductance.get_clamped(xi, yi - 1) + c) * (l - prev.get_clamped(xi, yi - 1));
                *out = l + 0.5 * tau * (xpos - xneg + ypos - yneg);
            }
        });
    }
}

/// Scale-normalised first derivatives and Hessian determinant of `img`
/// smoothed at `sigma` (in pixels of this level).
fn hessian_response(img: &FloatImage, sigma: f32) -> (FloatImage, FloatImage, FloatImage) {
    let smooth = ScaleSpace::gaussian_blur(img, sigma);
    let mut lx = ScaleSpace::derivative_x(&smooth);
    let mut ly = ScaleSpace::derivative_y(&smooth);
    let lxx = ScaleSpace::derivative_x(&lx);
    let lyy = ScaleSpace::derivative_y(&ly);
    let lxy = ScaleSpace::derivative_y(&lx);

    let s4 = sigma.powi(4);
    let det = FloatImage {
        width: img.width,
        height: img.height,
        data: lxx
            .data
            .iter()
            .zip(lyy.data.iter())
            .zip(lxy.data.iter())
            .map(|((xx, yy), xy)| (xx * yy - xy * xy) * s4)
            .collect(),
    };
    lx.data.iter_mut().for_each(|v| *v *= sigma);
    ly.data.iter_mut().for_each(|v| *v *= sigma);
    (lx, ly, det)
}

/// Dominant orientation from Gaussian-weighted first derivatives, found by
/// sliding a pi/3 window around the circle.
pub fn dominant_orientation(level: &Evolution, x: f32, y: f32) -> f32 {
    let s = ((level.esigma / level.ratio).round() as isize).max(1);
    let (cx, cy) = ((x / level.ratio).round() as isize, (y / level.ratio).round() as isize);
    let sigma = 2.5 * s as f32;
    let mut samples: Vec<(f32, f32, f32)> = Vec::with_capacity(109);
    for i in -6..=6isize {
        for j in -6..=6isize {
            if i * i + j * j >= 36 {
                continue;
            }
            let (dx, dy) = (i * s, j * s);
            let w = (-((dx * dx + dy * dy) as f32) / (2.0 * sigma * sigma)).exp();
            let rx = w * level.lx.get_clamped(cx + dx, cy + dy);
            let ry = w * level.ly.get_clamped(cx + dx, cy + dy);
            samples.push((ry.atan2(rx).rem_euclid(2.0 * PI), rx, ry));
        }
    }

    let mut best = (0.0f32, 0.0f32, 0.0f32);
    let mut ang1 = 0.0f32;
    while ang1 < 2.0 * PI {
        let ang2 = (ang1 + PI / 3.0).rem_euclid(2.0 * PI);
        let (mut sx, mut sy) = (0.0f32, 0.0f32);
        for &(a, rx, ry) in &samples {
            let inside = if ang1 < ang2 {
                a > ang1 && a < ang2
            } else {
                a > ang1 || a < ang2
            };
            if inside {
                sx += rx;
                sy += ry;
            }
        }
        let mag = sx * sx + sy * sy;
        if mag > best.0 {
            best = (mag, sx, sy);
        }
        ang1 += 0.15;
    }
    best.2.atan2(best.1)
}

/// Accelerated-KAZE style detector on the nonlinear scale space.
///
/// Keypoints carry `class_id = Some(level index)` so the matching
/// descriptor can find the evolution they were detected in.
pub struct AkazeDetector {
    params: AkazeParams,
}

impl AkazeDetector {
    pub fn new(params: AkazeParams) -> Self {
        Self { params }
    }

    /// Detect on an already built scale space
    pub fn detect_in(&self, space: &AkazeScaleSpace) -> Vec<Keypoint> {
        let levels = &space.levels;
        let threshold = self.params.threshold;
        let per_level: Vec<Vec<Keypoint>> = (0..levels.len())
            .into_par_iter()
            .map(|i| {
                let level = &levels[i];
                let det = &level.det;
                let border = level.sigma_size + 1;
                let mut found = Vec::new();
                if det.width <= 2 * border || det.height <= 2 * border {
                    return found;
                }
                for y in border..det.height - border {
                    for x in border..det.width - border {
                        let v = det.get(x, y);
                        if v <= threshold || !det.is_local_max_3x3(x, y) {
                            continue;
                        }
                        let (ox, oy) = KeypointRefinement::subpixel_offset(det, x, y);
                        let fx = (x as f32 + ox) * level.ratio;
                        let fy = (y as f32 + oy) * level.ratio;
                        let below = i.checked_sub(1).map(|j| &levels[j]);
                        let above = levels.get(i + 1);
                        if below.map_or(false, |l| l.max_det_near(fx, fy) > v)
                            || above.map_or(false, |l| l.max_det_near(fx, fy) > v)
                        {
                            continue;
                        }
                        let angle = dominant_orientation(level, fx, fy);
                        found.push(
                            Keypoint::new(fx, fy, 2.0 * level.esigma * DERIVATIVE_FACTOR)
                                .with_response(v)
                                .with_angle(angle)
                                .with_octave(level.octave as u32)
                                .with_class_id(i as u32),
                        );
                    }
                }
                found
            })
            .collect();
        per_level.into_iter().flatten().collect()
    }
}

impl KeypointDetector for AkazeDetector {
    fn name(&self) -> &'static str {
        "AKAZE"
    }

    fn detect_keypoints(&self, img: &GrayImage) -> DetectResult<Vec<Keypoint>> {
        ensure_min_size(img, MIN_OCTAVE_SIZE as u32)?;
        let space = AkazeScaleSpace::build(img, &self.params);
        Ok(self.detect_in(&space))
    }
}
