use image::GrayImage;

/// Scale information for pyramid levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLevel {
    pub level: usize,
    pub scale: f32,
    pub width: usize,
    pub height: usize,
}

/// Segment-test classification of a FAST candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CornerType {
    Bright,
    Dark,
    None,
}

/// Single-channel f32 raster used for response maps and scale spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl FloatImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Converts an 8-bit image, multiplying every pixel by `scale`.
    pub fn from_gray(img: &GrayImage, scale: f32) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().iter().map(|&p| p as f32 * scale).collect(),
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Pixel lookup with replicated borders
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        let xx = x.clamp(0, self.width as isize - 1) as usize;
        let yy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[yy * self.width + xx]
    }

    /// Bilinear interpolation for fractional coordinates, clamped to the border
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (xi, yi) = (x0 as isize, y0 as isize);

        let p00 = self.get_clamped(xi, yi);
        let p10 = self.get_clamped(xi + 1, yi);
        let p01 = self.get_clamped(xi, yi + 1);
        let p11 = self.get_clamped(xi + 1, yi + 1);

        let top = p00 * (1.0 - fx) + p10 * fx;
        let bottom = p01 * (1.0 - fx) + p11 * fx;
        top * (1.0 - fy) + bottom * fy
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn min_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Element-wise `self - other`; both images must share dimensions.
    pub fn difference(&self, other: &FloatImage) -> FloatImage {
        FloatImage {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| a - b)
                .collect(),
        }
    }

    /// True if `v` at (x, y) is strictly greater than its 8 neighbours.
    /// Callers keep (x, y) one pixel away from the border.
    pub fn is_local_max_3x3(&self, x: usize, y: usize) -> bool {
        let v = self.get(x, y);
        for yy in y - 1..=y + 1 {
            for xx in x - 1..=x + 1 {
                if (xx != x || yy != y) && self.get(xx, yy) >= v {
                    return false;
                }
            }
        }
        true
    }

    /// Plateau-tolerant 3x3 maximum: `v` must be at least every neighbour
    /// and strictly above the neighbours already visited in row-major scan
    /// order, so exactly the first pixel of a flat peak survives.
    pub fn is_plateau_max_3x3(&self, x: usize, y: usize) -> bool {
        let v = self.get(x, y);
        for yy in y - 1..=y + 1 {
            for xx in x - 1..=x + 1 {
                if xx == x && yy == y {
                    continue;
                }
                let n = self.get(xx, yy);
                let earlier = yy < y || (yy == y && xx < x);
                if n > v || (earlier && n == v) {
                    return false;
                }
            }
        }
        true
    }
}
