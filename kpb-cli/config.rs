use crate::error::ConfigError;
use crate::roi::VEHICLE_RECT;
use crate::source::ImageSequence;
use kpb_core::Rect;
use kpb_detect::DetectorParams;
use kpb_match::MatcherConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything one benchmark sweep needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Frames held in memory at the same time
    pub buffer_size: usize,
    pub filter_to_roi: bool,
    pub detectors: Vec<String>,
    pub descriptors: Vec<String>,
    /// CSV file the per-frame rows are appended to
    pub output: PathBuf,
    /// Directory for side-by-side match images
    pub visualize: Option<PathBuf>,
    /// Worker threads; 0 uses every core
    pub threads: usize,
    pub source: ImageSequence,
    /// Keypoints outside this rectangle are dropped when `filter_to_roi` is set
    pub roi: Rect,
    pub matcher: MatcherConfig,
    pub detector_params: DetectorParams,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            source: ImageSequence::default(),
            buffer_size: 2,
            roi: VEHICLE_RECT,
            filter_to_roi: true,
            matcher: MatcherConfig::default(),
            detectors: ["HARRIS", "FAST", "BRISK", "ORB", "AKAZE", "SIFT"].map(String::from).to_vec(),
            descriptors: ["BRIEF", "ORB", "FREAK", "AKAZE", "SIFT", "BRISK"].map(String::from).to_vec(),
            detector_params: DetectorParams::default(),
            output: PathBuf::from("experiment.csv"),
            visualize: None,
            threads: 0,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl BenchConfig {
    /// Rectangle the keypoints are filtered to, if filtering is on
    pub fn region(&self) -> Option<Rect> {
        self.filter_to_roi.then_some(self.roi)
    }

    /// Structural checks. Algorithm names are resolved per configuration
    /// by the sweep so one bad name does not stop the others.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(invalid("buffer_size", "must be at least 1"));
        }
        if self.source.end_index < self.source.start_index {
            return Err(invalid(
                "source.end_index",
                format!("{} is before start index {}", self.source.end_index, self.source.start_index),
            ));
        }
        if self.detectors.is_empty() {
            return Err(invalid("detectors", "list is empty"));
        }
        if self.descriptors.is_empty() {
            return Err(invalid("descriptors", "list is empty"));
        }
        if self.roi.width == 0 || self.roi.height == 0 {
            return Err(invalid("roi", "rectangle has no area"));
        }
        self.matcher
            .validate()
            .map_err(|e| invalid("matcher", e.to_string()))?;
        self.detector_params
            .validate()
            .map_err(|e| invalid("detector_params", e.to_string()))?;
        Ok(())
    }

    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_toml(&read(path.as_ref())?)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_json(&read(path.as_ref())?)
    }

    /// Picks the format from the file extension, TOML unless it is `.json`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::load_json(path),
            _ => Self::load_toml(path),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
