use crate::error::SourceError;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Random-access sequence of grayscale frames
pub trait FrameSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn frame(&self, index: usize) -> Result<GrayImage, SourceError>;
}

/// Numbered image files such as `images/KITTI/.../0000000003.png`.
///
/// The file name is `base_path / prefix + index + extension`, with the
/// index zero-padded to `fill_width` digits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSequence {
    pub base_path: PathBuf,
    pub prefix: String,
    pub start_index: usize,
    pub end_index: usize,
    pub fill_width: usize,
    pub extension: String,
}

impl Default for ImageSequence {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("images"),
            prefix: "KITTI/2011_09_26/image_00/data/000000".into(),
            start_index: 0,
            end_index: 9,
            fill_width: 4,
            extension: ".png".into(),
        }
    }
}

impl ImageSequence {
    /// Path of the `i`-th frame of the range
    pub fn path(&self, i: usize) -> PathBuf {
        let number = format!("{:0width$}", self.start_index + i, width = self.fill_width);
        self.base_path
            .join(format!("{}{}{}", self.prefix, number, self.extension))
    }
}

impl FrameSource for ImageSequence {
    fn len(&self) -> usize {
        self.end_index.saturating_add(1).saturating_sub(self.start_index)
    }

    fn frame(&self, index: usize) -> Result<GrayImage, SourceError> {
        if index >= self.len() {
            return Err(SourceError::OutOfRange { index, len: self.len() });
        }
        let path = self.path(index);
        log::debug!("loading {}", path.display());
        let img = image::open(&path).map_err(|source| SourceError::Load { path, source })?;
        Ok(img.to_luma8())
    }
}

/// Frames already decoded into memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    frames: Vec<GrayImage>,
}

impl InMemorySource {
    pub fn new(frames: Vec<GrayImage>) -> Self {
        Self { frames }
    }
}

impl FrameSource for InMemorySource {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Result<GrayImage, SourceError> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(SourceError::OutOfRange { index, len: self.frames.len() })
    }
}
