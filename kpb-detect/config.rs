use crate::error::{invalid, DetectResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Harris corner parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct HarrisParams {
    /// Neighbourhood summed into the structure tensor
    pub block_size: usize,
    /// Sobel aperture; only 3 is supported
    pub aperture_size: usize,
    pub k: f32,
    /// Threshold on the response normalised to 0..255
    pub min_response: f32,
    /// Maximum permissible overlap between two keypoints
    pub max_overlap: f32,
    pub keypoint_size: f32,
}

impl Default for HarrisParams {
    fn default() -> Self {
        Self {
            block_size: 2,
            aperture_size: 3,
            k: 0.04,
            min_response: 100.0,
            max_overlap: 0.0,
            keypoint_size: 6.0,
        }
    }
}

/// Shi-Tomasi (good features to track) parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ShiTomasiParams {
    pub block_size: usize,
    pub min_distance: f32,
    pub quality_level: f32,
    pub keypoint_size: f32,
}

impl Default for ShiTomasiParams {
    fn default() -> Self {
        Self {
            block_size: 4,
            min_distance: 4.0,
            quality_level: 0.01,
            keypoint_size: 4.0,
        }
    }
}

/// FAST-9/16 parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct FastParams {
    pub threshold: u8,
    pub nonmax_suppression: bool,
    pub keypoint_size: f32,
}

impl Default for FastParams {
    fn default() -> Self {
        Self {
            threshold: 30,
            nonmax_suppression: true,
            keypoint_size: 7.0,
        }
    }
}

/// BRISK scale-space corner parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct BriskParams {
    pub threshold: u8,
    pub octaves: usize,
    /// Keypoint diameter at scale 1
    pub base_size: f32,
}

impl Default for BriskParams {
    fn default() -> Self {
        Self {
            threshold: 30,
            octaves: 3,
            base_size: 12.0,
        }
    }
}

/// Oriented FAST parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct OrbParams {
    pub n_features: usize,
    pub scale_factor: f32,
    pub n_levels: usize,
    pub edge_threshold: u32,
    pub fast_threshold: u8,
    pub harris_block_size: usize,
    pub patch_size: usize,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            n_features: 500,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 31,
            fast_threshold: 20,
            harris_block_size: 7,
            patch_size: 31,
        }
    }
}

/// Nonlinear scale-space parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct AkazeParams {
    pub octaves: usize,
    pub sublevels: usize,
    /// Detector response threshold on the normalised Hessian determinant
    pub threshold: f32,
    /// Percentile of the gradient histogram used as contrast factor
    pub contrast_percentile: f32,
    pub base_sigma: f32,
}

impl Default for AkazeParams {
    fn default() -> Self {
        Self {
            octaves: 4,
            sublevels: 4,
            threshold: 0.001,
            contrast_percentile: 0.7,
            base_sigma: 1.6,
        }
    }
}

/// Difference-of-Gaussians parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SiftParams {
    /// Limits the result to the strongest N keypoints; 0 keeps all
    pub n_features: usize,
    pub octave_layers: usize,
    pub contrast_threshold: f32,
    pub edge_threshold: f32,
    pub sigma: f32,
}

impl Default for SiftParams {
    fn default() -> Self {
        Self {
            n_features: 0,
            octave_layers: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            sigma: 1.6,
        }
    }
}

/// Parameters for every detector family, one section per algorithm
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct DetectorParams {
    pub harris: HarrisParams,
    pub shi_tomasi: ShiTomasiParams,
    pub fast: FastParams,
    pub brisk: BriskParams,
    pub orb: OrbParams,
    pub akaze: AkazeParams,
    pub sift: SiftParams,
}

impl DetectorParams {
    /// Validate every parameter section
    pub fn validate(&self) -> DetectResult<()> {
        let h = &self.harris;
        if h.block_size == 0 {
            return Err(invalid("harris.block_size", "must be at least 1"));
        }
        if h.aperture_size != 3 {
            return Err(invalid("harris.aperture_size", format!("{} (only 3 is supported)", h.aperture_size)));
        }
        if !(0.0..=1.0).contains(&h.max_overlap) {
            return Err(invalid("harris.max_overlap", "must be in [0, 1]"));
        }

        let s = &self.shi_tomasi;
        if s.block_size == 0 {
            return Err(invalid("shi_tomasi.block_size", "must be at least 1"));
        }
        if s.min_distance <= 0.0 {
            return Err(invalid("shi_tomasi.min_distance", "must be positive"));
        }
        if !(s.quality_level > 0.0 && s.quality_level < 1.0) {
            return Err(invalid("shi_tomasi.quality_level", "must be in (0, 1)"));
        }

        if self.fast.threshold == 0 {
            return Err(invalid("fast.threshold", "must be at least 1"));
        }

        if self.brisk.threshold == 0 {
            return Err(invalid("brisk.threshold", "must be at least 1"));
        }
        if self.brisk.octaves > 8 {
            return Err(invalid("brisk.octaves", "at most 8 octaves are supported"));
        }

        let o = &self.orb;
        if o.n_features == 0 {
            return Err(invalid("orb.n_features", "must be at least 1"));
        }
        if o.n_levels == 0 {
            return Err(invalid("orb.n_levels", "must be at least 1"));
        }
        if o.scale_factor <= 1.0 {
            return Err(invalid("orb.scale_factor", "must be greater than 1"));
        }
        if o.fast_threshold == 0 {
            return Err(invalid("orb.fast_threshold", "must be at least 1"));
        }
        if o.patch_size < 3 {
            return Err(invalid("orb.patch_size", "must be at least 3"));
        }

        let a = &self.akaze;
        if a.octaves == 0 || a.sublevels == 0 {
            return Err(invalid("akaze.octaves", "octaves and sublevels must be at least 1"));
        }
        if a.threshold <= 0.0 {
            return Err(invalid("akaze.threshold", "must be positive"));
        }
        if !(a.contrast_percentile > 0.0 && a.contrast_percentile < 1.0) {
            return Err(invalid("akaze.contrast_percentile", "must be in (0, 1)"));
        }

        let f = &self.sift;
        if f.octave_layers == 0 {
            return Err(invalid("sift.octave_layers", "must be at least 1"));
        }
        if f.sigma <= 0.0 {
            return Err(invalid("sift.sigma", "must be positive"));
        }
        if f.edge_threshold <= 1.0 {
            return Err(invalid("sift.edge_threshold", "must be greater than 1"));
        }
        Ok(())
    }
}
