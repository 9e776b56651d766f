use crate::DescriptorExtractor;
use crate::error::{DescribeError, DescribeResult};
use crate::sampling::pack_bits;
use image::GrayImage;
use kpb_core::{DescriptorMatrix, Descriptors, DistanceMetric, Keypoint};
use kpb_detect::{AkazeParams, AkazeScaleSpace, Evolution, dominant_orientation};
use rayon::prelude::*;

const GRIDS: [usize; 3] = [2, 3, 4];
/// Half-width of the sampled square in units of the keypoint scale
const PATTERN_SIZE: f32 = 10.0;
const SUBSAMPLES: usize = 4;
/// 3 channels compared over every cell pair of each grid
pub const MLDB_BITS: usize = 3 * (4 * 3 / 2 + 9 * 8 / 2 + 16 * 15 / 2);
pub const MLDB_BYTES: usize = MLDB_BITS.div_ceil(8);

/// Modified Local Difference Binary descriptor computed on the nonlinear
/// scale space. Only keypoints from the AKAZE detector carry the evolution
/// level (`class_id`) this needs.
pub struct AkazeExtractor {
    params: AkazeParams,
}

impl AkazeExtractor {
    pub fn new(params: AkazeParams) -> Self {
        Self { params }
    }

    fn check_keypoints(keypoints: &[Keypoint], levels: usize) -> DescribeResult<()> {
        for (i, kp) in keypoints.iter().enumerate() {
            let Some(class_id) = kp.class_id else {
                return Err(DescribeError::IncompatibleKeypoints {
                    descriptor: "AKAZE",
                    reason: format!("keypoint {} has no evolution level; use the AKAZE detector", i),
                });
            };
            if class_id as usize >= levels {
                return Err(DescribeError::IncompatibleKeypoints {
                    descriptor: "AKAZE",
                    reason: format!("keypoint {} refers to level {} of {}", i, class_id, levels),
                });
            }
        }
        Ok(())
    }

    /// Cell means of intensity and rotated derivatives for one grid
    fn grid_means(level: &Evolution, cx: f32, cy: f32, s: f32, (sin, cos): (f32, f32), n: usize) -> Vec<[f32; 3]> {
        let side = 2.0 * PATTERN_SIZE * s;
        let cell = side / n as f32;
        let step = cell / SUBSAMPLES as f32;
        let mut cells = Vec::with_capacity(n * n);
        for gy in 0..n {
            for gx in 0..n {
                let mut acc = [0.0f32; 3];
                for sy in 0..SUBSAMPLES {
                    for sx in 0..SUBSAMPLES {
                        let u = -side / 2.0 + gx as f32 * cell + (sx as f32 + 0.5) * step;
                        let v = -side / 2.0 + gy as f32 * cell + (sy as f32 + 0.5) * step;
                        let x = cx + u * cos - v * sin;
                        let y = cy + u * sin + v * cos;
                        let (lx, ly) = (level.lx.sample(x, y), level.ly.sample(x, y));
                        acc[0] += level.image.sample(x, y);
                        acc[1] += lx * cos + ly * sin;
                        acc[2] += -lx * sin + ly * cos;
                    }
                }
                let norm = (SUBSAMPLES * SUBSAMPLES) as f32;
                cells.push(acc.map(|v| v / norm));
            }
        }
        cells
    }

    fn describe_one(space: &AkazeScaleSpace, kp: &Keypoint) -> [u8; MLDB_BYTES] {
        let level = &space.levels[kp.class_id.unwrap_or_default() as usize];
        let angle = kp.angle.unwrap_or_else(|| dominant_orientation(level, kp.x, kp.y));
        let s = (0.5 * kp.size / level.ratio).round().max(1.0);
        let (cx, cy) = (kp.x / level.ratio, kp.y / level.ratio);
        let rot = angle.sin_cos();

        let mut bits = Vec::with_capacity(MLDB_BITS);
        for n in GRIDS {
            let cells = Self::grid_means(level, cx, cy, s, rot, n);
            for a in 0..cells.len() {
                for b in a + 1..cells.len() {
                    for c in 0..3 {
                        bits.push(cells[a][c] > cells[b][c]);
                    }
                }
            }
        }
        let mut d = [0u8; MLDB_BYTES];
        pack_bits(bits, &mut d);
        d
    }
}

impl DescriptorExtractor for AkazeExtractor {
    fn name(&self) -> &'static str {
        "AKAZE"
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Hamming
    }

    fn compute(&self, keypoints: &[Keypoint], img: &GrayImage) -> DescribeResult<Descriptors> {
        let mut m = DescriptorMatrix::with_capacity(MLDB_BYTES, keypoints.len());
        if keypoints.is_empty() {
            return Ok(Descriptors::Binary(m));
        }
        // missing tags fail before the scale space is built
        Self::check_keypoints(keypoints, usize::MAX)?;
        let space = AkazeScaleSpace::build(img, &self.params);
        Self::check_keypoints(keypoints, space.levels.len())?;

        let rows: Vec<[u8; MLDB_BYTES]> = keypoints.par_iter().map(|kp| Self::describe_one(&space, kp)).collect();
        for row in &rows {
            m.push_row(row);
        }
        Ok(Descriptors::Binary(m))
    }
}
