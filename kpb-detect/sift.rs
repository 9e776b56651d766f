use crate::config::SiftParams;
use crate::detector::{ensure_min_size, KeypointDetector};
use crate::error::DetectResult;
use crate::refinement::KeypointRefinement;
use crate::scale_space::ScaleSpace;
use crate::types::FloatImage;
use image::GrayImage;
use kpb_core::Keypoint;
use rayon::prelude::*;

/// Pixels skipped at the border of every DoG image
const IMG_BORDER: usize = 5;
const MAX_INTERP_STEPS: usize = 5;
/// Blur already present in a camera image
const INIT_SIGMA: f32 = 0.5;
const ORI_BINS: usize = 36;
const ORI_PEAK_RATIO: f32 = 0.8;
const ORI_SIG_FCTR: f32 = 1.5;
const ORI_RADIUS: f32 = 3.0 * ORI_SIG_FCTR;

/// Gaussian and difference-of-Gaussian pyramids, one `Vec` per octave
pub struct SiftPyramid {
    pub gaussians: Vec<Vec<FloatImage>>,
    pub dogs: Vec<Vec<FloatImage>>,
}

impl SiftPyramid {
    pub fn build(img: &GrayImage, layers: usize, sigma: f32) -> Self {
        let (w, h) = img.dimensions();
        let n_octaves = (((w.min(h) as f32).log2() - 2.0).round().max(1.0)) as usize;

        // incremental blur between successive layers of an octave
        let k = 2f32.powf(1.0 / layers as f32);
        let mut sig = vec![sigma; layers + 3];
        for (i, s) in sig.iter_mut().enumerate().skip(1) {
            let prev = sigma * k.powi(i as i32 - 1);
            let total = prev * k;
            *s = (total * total - prev * prev).sqrt();
        }

        let base_diff = (sigma * sigma - INIT_SIGMA * INIT_SIGMA).max(0.01).sqrt();
        let base = ScaleSpace::gaussian_blur(&FloatImage::from_gray(img, 1.0 / 255.0), base_diff);

        let mut gaussians: Vec<Vec<FloatImage>> = Vec::with_capacity(n_octaves);
        for o in 0..n_octaves {
            let first = if o == 0 {
                base.clone()
            } else {
                let src = &gaussians[o - 1][layers];
                if src.width / 2 < 2 * IMG_BORDER + 3 || src.height / 2 < 2 * IMG_BORDER + 3 {
                    break;
                }
                ScaleSpace::downsample_half(src)
            };
            let mut octave = Vec::with_capacity(layers + 3);
            octave.push(first);
            for s in sig.iter().skip(1) {
                let next = ScaleSpace::gaussian_blur(&octave[octave.len() - 1], *s);
                octave.push(next);
            }
            gaussians.push(octave);
        }

        let dogs = gaussians
            .par_iter()
            .map(|octave| octave.windows(2).map(|pair| pair[1].difference(&pair[0])).collect::<Vec<_>>())
            .collect();
        Self { gaussians, dogs }
    }
}

/// Solves the 3x3 system `h * x = b` by Cramer's rule
fn solve3(h: [[f32; 3]; 3], b: [f32; 3]) -> Option<[f32; 3]> {
    let det = |m: [[f32; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };
    let d = det(h);
    if d.abs() < 1e-12 {
        return None;
    }
    let mut out = [0.0f32; 3];
    for (col, o) in out.iter_mut().enumerate() {
        let mut m = h;
        for row in 0..3 {
            m[row][col] = b[row];
        }
        *o = det(m) / d;
    }
    Some(out)
}

/// Scale-invariant feature detector on DoG extrema
pub struct SiftDetector {
    params: SiftParams,
}

impl SiftDetector {
    pub fn new(params: SiftParams) -> Self {
        Self { params }
    }

    fn is_extremum(dogs: &[FloatImage], layer: usize, x: usize, y: usize, threshold: f32) -> bool {
        let v = dogs[layer].get(x, y);
        if v.abs() <= threshold {
            return false;
        }
        let mut is_max = true;
        let mut is_min = true;
        for img in &dogs[layer - 1..=layer + 1] {
            for yy in y - 1..=y + 1 {
                for xx in x - 1..=x + 1 {
                    let n = img.get(xx, yy);
                    is_max &= v >= n;
                    is_min &= v <= n;
                }
            }
        }
        (v > 0.0 && is_max) || (v < 0.0 && is_min)
    }

    /// Iterative quadratic refinement in (x, y, layer). Returns the refined
    /// integer position, the offsets and the interpolated contrast, or `None`
    /// when the point is unstable, low-contrast or lies on an edge.
    fn refine(&self, dogs: &[FloatImage], mut layer: usize, mut x: usize, mut y: usize) -> Option<(usize, usize, usize, [f32; 3], f32)> {
        let layers = self.params.octave_layers;
        let (w, h) = (dogs[0].width, dogs[0].height);
        for _ in 0..MAX_INTERP_STEPS {
            let (prev, cur, next) = (&dogs[layer - 1], &dogs[layer], &dogs[layer + 1]);
            let v2 = 2.0 * cur.get(x, y);
            let dd = [
                (cur.get(x + 1, y) - cur.get(x - 1, y)) * 0.5,
                (cur.get(x, y + 1) - cur.get(x, y - 1)) * 0.5,
                (next.get(x, y) - prev.get(x, y)) * 0.5,
            ];
            let dxx = cur.get(x + 1, y) + cur.get(x - 1, y) - v2;
            let dyy = cur.get(x, y + 1) + cur.get(x, y - 1) - v2;
            let dss = next.get(x, y) + prev.get(x, y) - v2;
            let dxy = (cur.get(x + 1, y + 1) - cur.get(x - 1, y + 1) - cur.get(x + 1, y - 1) + cur.get(x - 1, y - 1)) * 0.25;
            let dxs = (next.get(x + 1, y) - next.get(x - 1, y) - prev.get(x + 1, y) + prev.get(x - 1, y)) * 0.25;
            let dys = (next.get(x, y + 1) - next.get(x, y - 1) - prev.get(x, y + 1) + prev.get(x, y - 1)) * 0.25;
            let hess = [[dxx, dxy, dxs], [dxy, dyy, dys], [dxs, dys, dss]];
            let sol = solve3(hess, dd)?;
            let offset = [-sol[0], -sol[1], -sol[2]];

            if offset.iter().all(|o| o.abs() < 0.5) {
                let contrast = cur.get(x, y) + 0.5 * (dd[0] * offset[0] + dd[1] * offset[1] + dd[2] * offset[2]);
                if contrast.abs() * (layers as f32) < self.params.contrast_threshold {
                    return None;
                }
                let tr = dxx + dyy;
                let det = dxx * dyy - dxy * dxy;
                let r = self.params.edge_threshold;
                if det <= 0.0 || tr * tr * r >= (r + 1.0) * (r + 1.0) * det {
                    return None;
                }
                return Some((layer, x, y, offset, contrast));
            }
            if offset.iter().any(|o| o.abs() > 1e6) {
                return None;
            }
            let nx = x as isize + offset[0].round() as isize;
            let ny = y as isize + offset[1].round() as isize;
            let nl = layer as isize + offset[2].round() as isize;
            if nl < 1 || nl > layers as isize
                || nx < IMG_BORDER as isize || nx >= (w - IMG_BORDER) as isize
                || ny < IMG_BORDER as isize || ny >= (h - IMG_BORDER) as isize
            {
                return None;
            }
            x = nx as usize;
            y = ny as usize;
            layer = nl as usize;
        }
        None
    }
}

impl KeypointDetector for SiftDetector {
    fn name(&self) -> &'static str {
        "SIFT"
    }

    fn detect_keypoints(&self, img: &GrayImage) -> DetectResult<Vec<Keypoint>> {
        ensure_min_size(img, (2 * IMG_BORDER + 3) as u32)?;
        let p = &self.params;
        let layers = p.octave_layers;
        let pyramid = SiftPyramid::build(img, layers, p.sigma);
        let threshold = 0.5 * p.contrast_threshold / layers as f32;

        let tasks: Vec<(usize, usize)> = (0..pyramid.dogs.len())
            .flat_map(|o| (1..=layers).map(move |l| (o, l)))
            .collect();

        let mut keypoints: Vec<Keypoint> = tasks
            .par_iter()
            .flat_map_iter(|&(o, l)| {
                let dogs = &pyramid.dogs[o];
                let (w, h) = (dogs[l].width, dogs[l].height);
                let mut found = Vec::new();
                if w <= 2 * IMG_BORDER || h <= 2 * IMG_BORDER {
                    return found.into_iter();
                }
                let octave_scale = 2f32.powi(o as i32);
                for y in IMG_BORDER..h - IMG_BORDER {
                    for x in IMG_BORDER..w - IMG_BORDER {
                        if !Self::is_extremum(dogs, l, x, y, threshold) {
                            continue;
                        }
                        let Some((rl, rx, ry, off, contrast)) = self.refine(dogs, l, x, y) else {
                            continue;
                        };
                        let scale = p.sigma * 2f32.powf((rl as f32 + off[2]) / layers as f32);
                        let kp = Keypoint::new(
                            (rx as f32 + off[0]) * octave_scale,
                            (ry as f32 + off[1]) * octave_scale,
                            2.0 * scale * octave_scale,
                        )
                        .with_response(contrast.abs())
                        .with_octave(o as u32);

                        let gauss = &pyramid.gaussians[o][rl];
                        let hist = ScaleSpace::orientation_histogram(
                            gauss,
                            rx as f32,
                            ry as f32,
                            (ORI_RADIUS * scale).round() as i32,
                            ORI_SIG_FCTR * scale,
                            ORI_BINS,
                        );
                        let max = hist.iter().copied().fold(0.0f32, f32::max);
                        if max <= 0.0 {
                            found.push(kp.with_angle(0.0));
                            continue;
                        }
                        let before = found.len();
                        for i in 0..ORI_BINS {
                            let left = hist[(i + ORI_BINS - 1) % ORI_BINS];
                            let right = hist[(i + 1) % ORI_BINS];
                            if hist[i] > left && hist[i] > right && hist[i] >= ORI_PEAK_RATIO * max {
                                found.push(kp.with_angle(ScaleSpace::peak_angle(&hist, i)));
                            }
                        }
                        if found.len() == before {
                            // flat-topped histogram: fall back to the first maximal bin
                            let best = hist.iter().position(|&v| v == max).unwrap_or(0);
                            found.push(kp.with_angle(ScaleSpace::peak_angle(&hist, best)));
                        }
                    }
                }
                found.into_iter()
            })
            .collect();

        if p.n_features > 0 {
            KeypointRefinement::retain_best(&mut keypoints, p.n_features);
        }
        Ok(keypoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn blobs(w: u32, h: u32, centers: &[(f32, f32)], sigma: f32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let mut v = 30.0f32;
            for &(cx, cy) in centers {
                let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                v += 200.0 * (-d2 / (2.0 * sigma * sigma)).exp();
            }
            Luma([v.min(255.0) as u8])
        })
    }

    #[test]
    fn test_solve3_identity() {
        let x = solve3([[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 1.0]], [2.0, 2.0, -3.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-6 && (x[1] - 0.5).abs() < 1e-6 && (x[2] + 3.0).abs() < 1e-6);
        assert!(solve3([[0.0; 3]; 3], [1.0, 1.0, 1.0]).is_none());
    }

    #[test]
    fn test_pyramid_shape() {
        let img = GrayImage::new(128, 96);
        let pyr = SiftPyramid::build(&img, 3, 1.6);
        assert_eq!(pyr.gaussians[0].len(), 6);
        assert_eq!(pyr.dogs[0].len(), 5);
        assert_eq!(pyr.gaussians[1][0].width, 64);
    }

    #[test]
    fn test_flat_image_has_no_keypoints() {
        let img = GrayImage::from_pixel(64, 64, Luma([100]));
        let kps = SiftDetector::new(SiftParams::default()).detect_keypoints(&img).unwrap();
        assert!(kps.is_empty());
    }

    #[test]
    fn test_blobs_are_detected() {
        let centers = [(40.0, 40.0), (90.0, 50.0), (60.0, 100.0)];
        let img = blobs(128, 128, &centers, 3.0);
        let kps = SiftDetector::new(SiftParams::default()).detect_keypoints(&img).unwrap();
        for &(cx, cy) in &centers {
            assert!(
                kps.iter().any(|k| (k.x - cx).abs() <= 3.0 && (k.y - cy).abs() <= 3.0),
                "blob at ({}, {}) missed",
                cx,
                cy
            );
        }
        assert!(kps.iter().all(|k| k.angle.is_some() && k.size > 0.0));
    }
}
