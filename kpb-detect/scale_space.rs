use crate::types::FloatImage;
use rayon::prelude::*;

/// Scale-space building blocks on f32 rasters (Gaussian smoothing,
/// decimation, finite-difference derivatives).
pub struct ScaleSpace;

impl ScaleSpace {
    /// Normalised 1-D Gaussian kernel covering +-3 sigma
    pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
        let radius = (3.0 * sigma).ceil().max(1.0) as isize;
        let denom = 2.0 * sigma * sigma;
        let mut kernel: Vec<f32> = (-radius..=radius)
            .map(|i| (-((i * i) as f32) / denom).exp())
            .collect();
        let sum: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|k| *k /= sum);
        kernel
    }

    /// Separable Gaussian blur with replicated borders.
    pub fn gaussian_blur(img: &FloatImage, sigma: f32) -> FloatImage {
        if sigma <= 0.0 || img.width == 0 || img.height == 0 {
            return img.clone();
        }
        let kernel = Self::gaussian_kernel(sigma);
        let radius = (kernel.len() / 2) as isize;
        let (w, h) = (img.width, img.height);

        let mut horizontal = FloatImage::new(w, h);
        horizontal
            .data
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    for (k, &c) in kernel.iter().enumerate() {
                        let xx = x as isize + k as isize - radius;
                        acc += c * img.get_clamped(xx, y as isize);
                    }
                    *out = acc;
                }
            });

        let mut out = FloatImage::new(w, h);
        out.data
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, o) in row.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    for (k, &c) in kernel.iter().enumerate() {
                        let yy = y as isize + k as isize - radius;
                        acc += c * horizontal.get_clamped(x as isize, yy);
                    }
                    *o = acc;
                }
            });
        out
    }

    /// Keeps every second pixel in both directions.
    pub fn downsample_half(img: &FloatImage) -> FloatImage {
        let w = (img.width / 2).max(1);
        let h = (img.height / 2).max(1);
        let mut out = FloatImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                out.set(x, y, img.get((2 * x).min(img.width - 1), (2 * y).min(img.height - 1)));
            }
        }
        out
    }

    /// Central-difference derivative along x
    pub fn derivative_x(img: &FloatImage) -> FloatImage {
        let mut out = FloatImage::new(img.width, img.height);
        for y in 0..img.height {
            for x in 0..img.width {
                let (xi, yi) = (x as isize, y as isize);
                out.set(x, y, 0.5 * (img.get_clamped(xi + 1, yi) - img.get_clamped(xi - 1, yi)));
            }
        }
        out
    }

    /// Central-difference derivative along y
    pub fn derivative_y(img: &FloatImage) -> FloatImage {
        let mut out = FloatImage::new(img.width, img.height);
        for y in 0..img.height {
            for x in 0..img.width {
                let (xi, yi) = (x as isize, y as isize);
                out.set(x, y, 0.5 * (img.get_clamped(xi, yi + 1) - img.get_clamped(xi, yi - 1)));
            }
        }
        out
    }

    /// Second derivatives (dxx, dyy, dxy) at a pixel by finite differences
    #[inline]
    pub fn hessian_at(img: &FloatImage, x: usize, y: usize) -> (f32, f32, f32) {
        let (xi, yi) = (x as isize, y as isize);
        let c = img.get_clamped(xi, yi);
        let dxx = img.get_clamped(xi + 1, yi) + img.get_clamped(xi - 1, yi) - 2.0 * c;
        let dyy = img.get_clamped(xi, yi + 1) + img.get_clamped(xi, yi - 1) - 2.0 * c;
        let dxy = (img.get_clamped(xi + 1, yi + 1) - img.get_clamped(xi - 1, yi + 1)
            - img.get_clamped(xi + 1, yi - 1)
            + img.get_clamped(xi - 1, yi - 1))
            * 0.25;
        (dxx, dyy, dxy)
    }

    /// Gradient orientation histogram around (x, y) with `bins` bins,
    /// Gaussian-weighted by `sigma` within `radius` pixels.
    pub fn orientation_histogram(
        img: &FloatImage,
        x: f32,
        y: f32,
        radius: i32,
        sigma: f32,
        bins: usize,
    ) -> Vec<f32> {
        let mut hist = vec![0.0f32; bins];
        let (cx, cy) = (x.round() as isize, y.round() as isize);
        let denom = 2.0 * sigma * sigma;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let px = cx + dx as isize;
                let py = cy + dy as isize;
                if px <= 0 || py <= 0 || px >= img.width as isize - 1 || py >= img.height as isize - 1 {
                    continue;
                }
                let gx = img.get_clamped(px + 1, py) - img.get_clamped(px - 1, py);
                let gy = img.get_clamped(px, py + 1) - img.get_clamped(px, py - 1);
                let mag = (gx * gx + gy * gy).sqrt();
                if mag == 0.0 {
                    continue;
                }
                let weight = (-((dx * dx + dy * dy) as f32) / denom).exp();
                let angle = gy.atan2(gx).rem_euclid(std::f32::consts::TAU);
                let bin = ((angle / std::f32::consts::TAU) * bins as f32) as usize % bins;
                hist[bin] += weight * mag;
            }
        }
        // Smooth the histogram a little to stabilise peaks
        let raw = hist.clone();
        for i in 0..bins {
            let prev = raw[(i + bins - 1) % bins];
            let next = raw[(i + 1) % bins];
            hist[i] = 0.25 * prev + 0.5 * raw[i] + 0.25 * next;
        }
        hist
    }

    /// Angle in radians of the histogram bin `i` refined by a parabola
    /// through its neighbours.
    pub fn peak_angle(hist: &[f32], i: usize) -> f32 {
        let bins = hist.len();
        let l = hist[(i + bins - 1) % bins];
        let c = hist[i];
        let r = hist[(i + 1) % bins];
        let denom = l - 2.0 * c + r;
        let offset = if denom.abs() > f32::EPSILON { 0.5 * (l - r) / denom } else { 0.0 };
        let bin = (i as f32 + 0.5 + offset).rem_euclid(bins as f32);
        bin / bins as f32 * std::f32::consts::TAU
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_is_normalised() {
        let k = ScaleSpace::gaussian_kernel(1.6);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(k.len() % 2, 1);
    }

    #[test]
    fn test_blur_preserves_constant_image() {
        let mut img = FloatImage::new(16, 12);
        img.data.iter_mut().for_each(|v| *v = 0.5);
        let blurred = ScaleSpace::gaussian_blur(&img, 2.0);
        assert!(blurred.data.iter().all(|v| (v - 0.5).abs() < 1e-5));
    }

    #[test]
    fn test_derivatives_of_ramp() {
        let mut img = FloatImage::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                img.set(x, y, x as f32 * 2.0 + y as f32);
            }
        }
        let dx = ScaleSpace::derivative_x(&img);
        let dy = ScaleSpace::derivative_y(&img);
        assert!((dx.get(4, 4) - 2.0).abs() < 1e-6);
        assert!((dy.get(4, 4) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_downsample_dimensions() {
        let img = FloatImage::new(33, 20);
        let half = ScaleSpace::downsample_half(&img);
        assert_eq!((half.width, half.height), (16, 10));
    }

    #[test]
    fn test_orientation_histogram_of_horizontal_ramp() {
        let mut img = FloatImage::new(21, 21);
        for y in 0..21 {
            for x in 0..21 {
                img.set(x, y, x as f32);
            }
        }
        let hist = ScaleSpace::orientation_histogram(&img, 10.0, 10.0, 5, 3.0, 36);
        let (best, _) = hist
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        // gradient points along +x, i.e. the first bin
        assert!(best == 0 || best == 35);
    }
}
