use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::integral_image::integral_image;

/// Summed-area table for constant-time box means
pub struct IntegralImage {
    table: ImageBuffer<Luma<u64>, Vec<u64>>,
    width: i64,
    height: i64,
}

impl IntegralImage {
    pub fn new(img: &GrayImage) -> Self {
        Self {
            table: integral_image::<_, u64>(img),
            width: img.width() as i64,
            height: img.height() as i64,
        }
    }

    #[inline]
    fn at(&self, x: i64, y: i64) -> u64 {
        self.table.get_pixel(x as u32, y as u32)[0]
    }

    /// Sum over the inclusive rectangle, clipped to the image
    pub fn box_sum(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> (u64, u64) {
        let x0 = x0.clamp(0, self.width - 1);
        let y0 = y0.clamp(0, self.height - 1);
        let x1 = x1.clamp(x0, self.width - 1);
        let y1 = y1.clamp(y0, self.height - 1);
        let sum = self.at(x1 + 1, y1 + 1) + self.at(x0, y0) - self.at(x0, y1 + 1) - self.at(x1 + 1, y0);
        let area = ((x1 - x0 + 1) * (y1 - y0 + 1)) as u64;
        (sum, area)
    }

    /// Mean intensity of the square of half-width `half` around (cx, cy).
    /// Squares reaching past the border are clipped, so the result is always
    /// defined.
    pub fn box_mean(&self, cx: f32, cy: f32, half: f32) -> f32 {
        let r = half.round().max(0.0) as i64;
        let (x, y) = (cx.round() as i64, cy.round() as i64);
        let (sum, area) = self.box_sum(x - r, y - r, x + r, y + r);
        sum as f32 / area.max(1) as f32
    }
}

/// Gaussian pre-smoothing applied before intensity tests
pub fn smooth(img: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return img.clone();
    }
    gaussian_blur_f32(img, sigma)
}

/// Bilinear lookup with replicated borders
pub fn sample_bilinear(img: &GrayImage, x: f32, y: f32) -> f32 {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);
    let (x0, y0) = (x.floor() as i64, y.floor() as i64);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);
    let p = |xx: i64, yy: i64| img.get_pixel(xx as u32, yy as u32)[0] as f32;
    let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
    let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Packs booleans LSB-first into `out`, eight per byte.
pub fn pack_bits(bits: impl IntoIterator<Item = bool>, out: &mut [u8]) {
    for (i, bit) in bits.into_iter().enumerate() {
        if bit && i / 8 < out.len() {
            out[i / 8] |= 1 << (i % 8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_mean_matches_direct_average() {
        let img = GrayImage::from_fn(10, 10, |x, y| Luma([(x * 10 + y) as u8]));
        let ii = IntegralImage::new(&img);
        let mut direct = 0.0;
        for y in 3..=5 {
            for x in 4..=6 {
                direct += img.get_pixel(x, y)[0] as f32;
            }
        }
        assert!((ii.box_mean(5.0, 4.0, 1.0) - direct / 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_box_mean_clips_at_border() {
        let img = GrayImage::from_pixel(6, 6, Luma([40]));
        let ii = IntegralImage::new(&img);
        assert_eq!(ii.box_mean(0.0, 0.0, 3.0), 40.0);
        assert_eq!(ii.box_mean(-20.0, 50.0, 2.0), 40.0);
    }

    #[test]
    fn test_bilinear_and_packing() {
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([(x * 100) as u8]));
        assert!((sample_bilinear(&img, 0.25, 0.0) - 25.0).abs() < 1e-4);
        assert_eq!(sample_bilinear(&img, 9.0, -3.0), 100.0);

        let mut out = [0u8; 2];
        pack_bits([true, false, true, false, false, false, false, false, true], &mut out);
        assert_eq!(out, [0b0000_0101, 0b0000_0001]);
    }
}
