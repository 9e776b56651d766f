//! Keypoint descriptor extractors: BRIEF, ORB, BRISK, FREAK, AKAZE (M-LDB)
//! and SIFT behind a single [`DescriptorExtractor`] trait.
//!
//! Every extractor returns exactly one row per keypoint it is given, so row
//! `i` of the result always describes keypoint `i`.

mod akaze;
mod brief;
mod brisk;
mod error;
mod freak;
mod orb;
mod sampling;
mod sift;

pub use akaze::AkazeExtractor;
pub use brief::BriefExtractor;
pub use brisk::BriskExtractor;
pub use error::{DescribeError, DescribeResult};
pub use freak::FreakExtractor;
pub use orb::OrbExtractor;
pub use sift::SiftExtractor;

use image::GrayImage;
use kpb_core::{Descriptors, DistanceMetric, Keypoint};
use kpb_detect::{DetectorKind, DetectorParams};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// A descriptor extraction strategy.
pub trait DescriptorExtractor: Send + Sync {
    /// Upper-case identifier used in reports
    fn name(&self) -> &'static str;

    /// Distance the produced rows are compared with
    fn metric(&self) -> DistanceMetric;

    fn compute(&self, keypoints: &[Keypoint], img: &GrayImage) -> DescribeResult<Descriptors>;

    /// Runs [`compute`](Self::compute) and returns the elapsed wall-clock time
    /// in seconds alongside the descriptors.
    fn describe(&self, keypoints: &[Keypoint], img: &GrayImage) -> DescribeResult<(Descriptors, f64)> {
        let start = Instant::now();
        let descriptors = self.compute(keypoints, img)?;
        let elapsed = start.elapsed().as_secs_f64();
        log::debug!(
            "{} descriptor extraction in {:.3} ms",
            self.name(),
            elapsed * 1000.0
        );
        Ok((descriptors, elapsed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Brief,
    Orb,
    Freak,
    Akaze,
    Sift,
    Brisk,
}

impl DescriptorKind {
    pub const ALL: [DescriptorKind; 6] = [
        DescriptorKind::Brief,
        DescriptorKind::Orb,
        DescriptorKind::Freak,
        DescriptorKind::Akaze,
        DescriptorKind::Sift,
        DescriptorKind::Brisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorKind::Brief => "BRIEF",
            DescriptorKind::Orb => "ORB",
            DescriptorKind::Freak => "FREAK",
            DescriptorKind::Akaze => "AKAZE",
            DescriptorKind::Sift => "SIFT",
            DescriptorKind::Brisk => "BRISK",
        }
    }

    pub fn native_metric(&self) -> DistanceMetric {
        match self {
            DescriptorKind::Sift => DistanceMetric::L2,
            _ => DistanceMetric::Hamming,
        }
    }

    /// Detector whose keypoints this extractor needs, if it is picky
    pub fn required_detector(&self) -> Option<DetectorKind> {
        match self {
            DescriptorKind::Akaze => Some(DetectorKind::Akaze),
            _ => None,
        }
    }

    /// True when keypoints of `detector` carry what this extractor needs
    pub fn accepts(&self, detector: DetectorKind) -> bool {
        self.required_detector().is_none_or(|required| required == detector)
    }

    /// Row width in elements: bytes for binary descriptors, floats for SIFT
    pub fn descriptor_size(&self) -> usize {
        match self {
            DescriptorKind::Brief | DescriptorKind::Orb => 32,
            DescriptorKind::Freak | DescriptorKind::Brisk => 64,
            DescriptorKind::Akaze => akaze::MLDB_BYTES,
            DescriptorKind::Sift => sift::SIFT_LEN,
        }
    }

    /// Construct the extractor. `params` supplies the scale-space settings
    /// that must agree with the detector side (AKAZE and SIFT).
    pub fn build(&self, params: &DetectorParams) -> DescribeResult<Box<dyn DescriptorExtractor>> {
        params.validate()?;
        let extractor: Box<dyn DescriptorExtractor> = match self {
            DescriptorKind::Brief => Box::new(BriefExtractor::new()),
            DescriptorKind::Orb => Box::new(OrbExtractor::new()),
            DescriptorKind::Freak => Box::new(FreakExtractor::new()),
            DescriptorKind::Akaze => Box::new(AkazeExtractor::new(params.akaze.clone())),
            DescriptorKind::Sift => Box::new(SiftExtractor::new(params.sift.clone())),
            DescriptorKind::Brisk => Box::new(BriskExtractor::new()),
        };
        Ok(extractor)
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DescriptorKind {
    type Err = DescribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        DescriptorKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| DescribeError::UnsupportedDescriptor(name.to_string()))
    }
}
