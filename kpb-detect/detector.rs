use crate::akaze::AkazeDetector;
use crate::brisk::BriskDetector;
use crate::config::DetectorParams;
use crate::corners::{HarrisDetector, ShiTomasiDetector};
use crate::error::{DetectError, DetectResult};
use crate::fast::FastDetector;
use crate::orb::OrbDetector;
use crate::sift::SiftDetector;
use image::GrayImage;
use kpb_core::Keypoint;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// A keypoint detection strategy.
///
/// Implementations are stateless between calls apart from their parameters,
/// so a single instance can serve a whole image sequence.
pub trait KeypointDetector: Send + Sync {
    /// Upper-case identifier used in reports
    fn name(&self) -> &'static str;

    fn detect_keypoints(&self, img: &GrayImage) -> DetectResult<Vec<Keypoint>>;

    /// Runs [`detect_keypoints`](Self::detect_keypoints) and returns the
    /// elapsed wall-clock time in seconds alongside the keypoints.
    fn detect(&self, img: &GrayImage) -> DetectResult<(Vec<Keypoint>, f64)> {
        let start = Instant::now();
        let keypoints = self.detect_keypoints(img)?;
        let elapsed = start.elapsed().as_secs_f64();
        log::debug!(
            "{} detection with n={} keypoints in {:.3} ms",
            self.name(),
            keypoints.len(),
            elapsed * 1000.0
        );
        Ok((keypoints, elapsed))
    }
}

/// Every detector family the benchmark knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    Harris,
    ShiTomasi,
    Fast,
    Brisk,
    Orb,
    Akaze,
    Sift,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 7] = [
        DetectorKind::Harris,
        DetectorKind::ShiTomasi,
        DetectorKind::Fast,
        DetectorKind::Brisk,
        DetectorKind::Orb,
        DetectorKind::Akaze,
        DetectorKind::Sift,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Harris => "HARRIS",
            DetectorKind::ShiTomasi => "SHITOMASI",
            DetectorKind::Fast => "FAST",
            DetectorKind::Brisk => "BRISK",
            DetectorKind::Orb => "ORB",
            DetectorKind::Akaze => "AKAZE",
            DetectorKind::Sift => "SIFT",
        }
    }

    /// Validate `params` and construct the strategy for this kind
    pub fn build(&self, params: &DetectorParams) -> DetectResult<Box<dyn KeypointDetector>> {
        params.validate()?;
        let detector: Box<dyn KeypointDetector> = match self {
            DetectorKind::Harris => Box::new(HarrisDetector::new(params.harris.clone())),
            DetectorKind::ShiTomasi => Box::new(ShiTomasiDetector::new(params.shi_tomasi.clone())),
            DetectorKind::Fast => Box::new(FastDetector::new(params.fast.clone())),
            DetectorKind::Brisk => Box::new(BriskDetector::new(params.brisk.clone())),
            DetectorKind::Orb => Box::new(OrbDetector::new(params.orb.clone())),
            DetectorKind::Akaze => Box::new(AkazeDetector::new(params.akaze.clone())),
            DetectorKind::Sift => Box::new(SiftDetector::new(params.sift.clone())),
        };
        Ok(detector)
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorKind {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        DetectorKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| DetectError::UnsupportedDetector(name.to_string()))
    }
}

/// Rejects images smaller than `min_size` in either dimension
pub(crate) fn ensure_min_size(img: &GrayImage, min_size: u32) -> DetectResult<()> {
    let (width, height) = img.dimensions();
    if width < min_size || height < min_size {
        return Err(DetectError::ImageTooSmall { width, height, min_size });
    }
    Ok(())
}
