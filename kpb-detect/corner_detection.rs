use crate::types::{CornerType, FloatImage};
use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use rayon::prelude::*;

/// Corner response kernels shared by the corner-family detectors
/// (FAST segment test, Harris and Shi-Tomasi structure tensors).
pub struct CornerDetector;

impl CornerDetector {
    /// FAST circle offsets for corner detection
    pub const FAST_OFFSETS: [(i32, i32); 16] = [
        (0, -3), (1, -3), (2, -2), (3, -1),
        (3, 0), (3, 1), (2, 2), (1, 3),
        (0, 3), (-1, 3), (-2, 2), (-3, 1),
        (-3, 0), (-3, -1), (-2, -2), (-1, -3),
    ];

    /// Contiguous arc length required by FAST-9/16
    pub const FAST_ARC: usize = 9;

    /// Runs the segment test at (x, y). The caller keeps the pixel at least
    /// three pixels away from the image border.
    pub(crate) fn segment_test(img: &GrayImage, x: u32, y: u32, threshold: u8) -> CornerType {
        let raw = img.as_raw();
        let width = img.width() as i64;
        let center = raw[(y as i64 * width + x as i64) as usize] as i32;
        let t = threshold as i32;

        let mut signs = [0i8; 16];
        for (i, &(dx, dy)) in Self::FAST_OFFSETS.iter().enumerate() {
            let idx = ((y as i64 + dy as i64) * width + x as i64 + dx as i64) as usize;
            let q = raw[idx] as i32;
            signs[i] = if q > center + t {
                1
            } else if q < center - t {
                -1
            } else {
                0
            };
        }

        // Walk the circle twice so arcs wrapping past index 15 are counted
        let mut run = 0usize;
        let mut run_sign = 0i8;
        for i in 0..32 {
            let s = signs[i % 16];
            if s != 0 && s == run_sign {
                run += 1;
            } else {
                run_sign = s;
                run = if s != 0 { 1 } else { 0 };
            }
            if run >= Self::FAST_ARC {
                return if run_sign > 0 { CornerType::Bright } else { CornerType::Dark };
            }
        }
        CornerType::None
    }

    /// FAST score: the largest threshold for which (x, y) still passes the
    /// segment test. Returns 0 when it fails at `threshold`.
    pub fn fast_score(img: &GrayImage, x: u32, y: u32, threshold: u8) -> f32 {
        if Self::segment_test(img, x, y, threshold) == CornerType::None {
            return 0.0;
        }
        let (mut lo, mut hi) = (threshold as u32, 255u32);
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if Self::segment_test(img, x, y, mid as u8) != CornerType::None {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo as f32
    }

    /// Dense FAST score map; pixels closer than `border` (at least 3) to the
    /// edge are left at zero.
    pub fn fast_score_map(img: &GrayImage, threshold: u8, border: u32) -> FloatImage {
        let (w, h) = img.dimensions();
        let border = border.max(3);
        let mut map = FloatImage::new(w as usize, h as usize);
        if w <= 2 * border || h <= 2 * border {
            return map;
        }
        map.data
            .par_chunks_mut(w as usize)
            .enumerate()
            .filter(|(y, _)| (*y as u32) >= border && (*y as u32) < h - border)
            .for_each(|(y, row)| {
                for x in border..w - border {
                    row[x as usize] = Self::fast_score(img, x, y as u32, threshold);
                }
            });
        map
    }

    /// FAST corners as (x, y, score). With `nonmax` a corner survives only
    /// if no neighbour scores higher; on a flat peak the first pixel in
    /// row-major order is kept.
    pub fn detect_fast(img: &GrayImage, threshold: u8, nonmax: bool, border: u32) -> Vec<(u32, u32, f32)> {
        let map = Self::fast_score_map(img, threshold, border);
        let (w, h) = (map.width, map.height);
        if w < 3 || h < 3 {
            return Vec::new();
        }
        (1..h - 1)
            .into_par_iter()
            .flat_map_iter(|y| {
                let map = &map;
                (1..w - 1).filter_map(move |x| {
                    let score = map.get(x, y);
                    if score <= 0.0 {
                        return None;
                    }
                    if nonmax && !map.is_plateau_max_3x3(x, y) {
                        return None;
                    }
                    Some((x as u32, y as u32, score))
                })
            })
            .collect()
    }
}

/// Sobel gradients of an 8-bit image, stored as f32.
pub struct Gradients {
    pub width: usize,
    pub height: usize,
    pub gx: Vec<f32>,
    pub gy: Vec<f32>,
}

impl Gradients {
    pub fn sobel(img: &GrayImage) -> Self {
        let gx = horizontal_sobel(img);
        let gy = vertical_sobel(img);
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            gx: gx.as_raw().iter().map(|&v| v as f32).collect(),
            gy: gy.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    /// Structure tensor sums (sxx, syy, sxy) over a `block` x `block`
    /// window anchored at the block centre; out-of-image taps are clamped.
    pub fn tensor_at(&self, x: usize, y: usize, block: usize) -> (f32, f32, f32) {
        let lo = -((block / 2) as isize);
        let hi = lo + block as isize - 1;
        let (mut sxx, mut syy, mut sxy) = (0.0f32, 0.0f32, 0.0f32);
        for dy in lo..=hi {
            let yy = (y as isize + dy).clamp(0, self.height as isize - 1) as usize;
            for dx in lo..=hi {
                let xx = (x as isize + dx).clamp(0, self.width as isize - 1) as usize;
                let i = yy * self.width + xx;
                let (gx, gy) = (self.gx[i], self.gy[i]);
                sxx += gx * gx;
                syy += gy * gy;
                sxy += gx * gy;
            }
        }
        (sxx, syy, sxy)
    }

    /// Harris response det(M) - k * trace(M)^2 at a pixel
    pub fn harris_at(&self, x: usize, y: usize, block: usize, k: f32) -> f32 {
        let (a, c, b) = self.tensor_at(x, y, block);
        a * c - b * b - k * (a + c) * (a + c)
    }

    /// Smaller eigenvalue of the structure tensor at a pixel
    pub fn min_eigen_at(&self, x: usize, y: usize, block: usize) -> f32 {
        let (a, c, b) = self.tensor_at(x, y, block);
        let (a, c, b) = (0.5 * a, 0.5 * c, b);
        (a + c) - ((a - c) * (a - c) + b * b).sqrt()
    }

    fn response_map<F>(&self, f: F) -> FloatImage
    where
        F: Fn(usize, usize) -> f32 + Sync,
    {
        let mut map = FloatImage::new(self.width, self.height);
        if self.width == 0 {
            return map;
        }
        map.data
            .par_chunks_mut(self.width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, v) in row.iter_mut().enumerate() {
                    *v = f(x, y);
                }
            });
        map
    }

    pub fn harris_map(&self, block: usize, k: f32) -> FloatImage {
        self.response_map(|x, y| self.harris_at(x, y, block, k))
    }

    pub fn min_eigen_map(&self, block: usize) -> FloatImage {
        self.response_map(|x, y| self.min_eigen_at(x, y, block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn dot_image(w: u32, h: u32, dots: &[(u32, u32)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([50]));
        for &(x, y) in dots {
            img.put_pixel(x, y, Luma([255]));
        }
        img
    }

    #[test]
    fn test_uniform_image_has_no_fast_corners() {
        let img = GrayImage::from_pixel(32, 32, Luma([128]));
        assert!(CornerDetector::detect_fast(&img, 20, true, 3).is_empty());
    }

    #[test]
    fn test_isolated_dot_is_fast_corner() {
        let img = dot_image(32, 32, &[(16, 16)]);
        assert_eq!(CornerDetector::segment_test(&img, 16, 16, 20), CornerType::Dark);
        let corners = CornerDetector::detect_fast(&img, 20, true, 3);
        assert_eq!(corners.len(), 1);
        assert_eq!((corners[0].0, corners[0].1), (16, 16));
    }

    #[test]
    fn test_bright_square_yields_corner_per_vertex() {
        let mut img = GrayImage::from_pixel(40, 40, Luma([30]));
        for y in 16..24 {
            for x in 16..24 {
                img.put_pixel(x, y, Luma([220]));
            }
        }
        let corners = CornerDetector::detect_fast(&img, 20, true, 3);
        assert!(!corners.is_empty());
        let vertices = [(16, 16), (23, 16), (16, 23), (23, 23)];
        let near = |(x, y): (u32, u32), (vx, vy): (u32, u32)| x.abs_diff(vx) <= 2 && y.abs_diff(vy) <= 2;
        for c in &corners {
            assert!(vertices.iter().any(|&v| near((c.0, c.1), v)), "stray corner {:?}", c);
        }
        for v in vertices {
            assert!(corners.iter().any(|c| near((c.0, c.1), v)), "no corner near {:?}", v);
        }
        // same peaks survive without suppression, plus their shoulders
        assert!(CornerDetector::detect_fast(&img, 20, false, 3).len() > corners.len());
    }

    #[test]
    fn test_fast_score_is_maximal_threshold() {
        let img = dot_image(16, 16, &[(8, 8)]);
        // centre 255, circle 50: passes for every t < 205
        let score = CornerDetector::fast_score(&img, 8, 8, 10);
        assert_eq!(score, 204.0);
        assert_eq!(CornerDetector::fast_score(&img, 8, 8, 250), 0.0);
    }

    #[test]
    fn test_wrapping_arc_detected() {
        // Bright arc covering circle indices 12..=15 and 0..=4 (9 pixels)
        let mut img = GrayImage::from_pixel(16, 16, Luma([100]));
        for &i in &[12usize, 13, 14, 15, 0, 1, 2, 3, 4] {
            let (dx, dy) = CornerDetector::FAST_OFFSETS[i];
            img.put_pixel((8 + dx) as u32, (8 + dy) as u32, Luma([200]));
        }
        assert_eq!(CornerDetector::segment_test(&img, 8, 8, 20), CornerType::Bright);
    }

    #[test]
    fn test_harris_prefers_corners_over_edges() {
        let mut img = GrayImage::from_pixel(40, 40, Luma([0]));
        for y in 20..40 {
            for x in 20..40 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let g = Gradients::sobel(&img);
        let corner = g.harris_at(20, 20, 3, 0.04);
        let edge = g.harris_at(30, 20, 3, 0.04);
        let flat = g.harris_at(5, 5, 3, 0.04);
        assert!(corner > 0.0);
        assert!(edge < corner);
        assert_eq!(flat, 0.0);
        assert!(g.min_eigen_at(20, 20, 4) > g.min_eigen_at(30, 20, 4));
    }
}
