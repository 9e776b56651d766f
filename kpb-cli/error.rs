use kpb_describe::DescribeError;
use kpb_detect::DetectError;
use kpb_match::MatchError;
use std::path::PathBuf;

/// Failure to produce a frame from an image source
#[derive(Debug)]
pub enum SourceError {
    OutOfRange { index: usize, len: usize },
    Load { path: PathBuf, source: image::ImageError },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::OutOfRange { index, len } => {
                write!(f, "frame {} requested from a source of {} frames", index, len)
            }
            SourceError::Load { path, source } => write!(f, "cannot load {}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Load { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(String),
    Serialize(String),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => write!(f, "cannot read {}: {}", path.display(), source),
            ConfigError::Parse(msg) => write!(f, "malformed configuration: {}", msg),
            ConfigError::Serialize(msg) => write!(f, "cannot serialize configuration: {}", msg),
            ConfigError::Invalid { field, reason } => write!(f, "invalid {}: {}", field, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Serialize(e.to_string())
    }
}

/// Any failure while benchmarking one detector/descriptor configuration
#[derive(Debug)]
pub enum BenchError {
    Detect(DetectError),
    Describe(DescribeError),
    Match(MatchError),
    Source(SourceError),
    Io(std::io::Error),
    Config(ConfigError),
}

impl std::fmt::Display for BenchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchError::Detect(e) => write!(f, "detection failed: {}", e),
            BenchError::Describe(e) => write!(f, "description failed: {}", e),
            BenchError::Match(e) => write!(f, "matching failed: {}", e),
            BenchError::Source(e) => write!(f, "image source: {}", e),
            BenchError::Io(e) => write!(f, "I/O error: {}", e),
            BenchError::Config(e) => write!(f, "configuration error: {}", e),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchError::Detect(e) => Some(e),
            BenchError::Describe(e) => Some(e),
            BenchError::Match(e) => Some(e),
            BenchError::Source(e) => Some(e),
            BenchError::Io(e) => Some(e),
            BenchError::Config(e) => Some(e),
        }
    }
}

impl From<DetectError> for BenchError {
    fn from(e: DetectError) -> Self {
        BenchError::Detect(e)
    }
}

impl From<DescribeError> for BenchError {
    fn from(e: DescribeError) -> Self {
        BenchError::Describe(e)
    }
}

impl From<MatchError> for BenchError {
    fn from(e: MatchError) -> Self {
        BenchError::Match(e)
    }
}

impl From<SourceError> for BenchError {
    fn from(e: SourceError) -> Self {
        BenchError::Source(e)
    }
}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self {
        BenchError::Io(e)
    }
}

impl From<ConfigError> for BenchError {
    fn from(e: ConfigError) -> Self {
        BenchError::Config(e)
    }
}

pub type BenchResult<T> = Result<T, BenchError>;
