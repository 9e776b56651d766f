//! Keypoint detection strategies: Harris, Shi-Tomasi, FAST, BRISK, ORB,
//! AKAZE and SIFT behind a single [`KeypointDetector`] trait.
//!
//! ```no_run
//! use kpb_detect::{DetectorKind, DetectorParams};
//!
//! let img = image::open("frame.png").unwrap().to_luma8();
//! let detector = "FAST".parse::<DetectorKind>()?.build(&DetectorParams::default())?;
//! let (keypoints, seconds) = detector.detect(&img)?;
//! println!("{} keypoints in {:.3} ms", keypoints.len(), seconds * 1000.0);
//! # Ok::<(), kpb_detect::DetectError>(())
//! ```

mod akaze;
mod brisk;
mod config;
mod corner_detection;
mod corners;
mod detector;
mod error;
mod fast;
mod orb;
mod pyramid;
mod refinement;
mod scale_space;
mod sift;
mod types;

pub use akaze::{dominant_orientation, AkazeDetector, AkazeScaleSpace, Evolution};
pub use brisk::BriskDetector;
pub use config::{
    AkazeParams, BriskParams, DetectorParams, FastParams, HarrisParams, OrbParams, ShiTomasiParams, SiftParams,
};
pub use corner_detection::{CornerDetector, Gradients};
pub use corners::{HarrisDetector, ShiTomasiDetector};
pub use detector::{DetectorKind, KeypointDetector};
pub use error::{DetectError, DetectResult};
pub use fast::FastDetector;
pub use orb::OrbDetector;
pub use pyramid::ImagePyramid;
pub use refinement::KeypointRefinement;
pub use scale_space::ScaleSpace;
pub use sift::{SiftDetector, SiftPyramid};
pub use types::{FloatImage, ScaleLevel};
