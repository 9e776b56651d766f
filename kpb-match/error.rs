use kpb_core::DistanceMetric;

#[derive(Debug, Clone, PartialEq)]
pub enum MatchError {
    UnsupportedStrategy(String),
    InvalidParameter { name: &'static str, reason: String },
    /// The two frames were described with different extractors
    IncompatibleDescriptors {
        query: (DistanceMetric, usize),
        train: (DistanceMetric, usize),
    },
    /// Descriptor rows and keypoints are out of step
    RowMismatch {
        frame: &'static str,
        keypoints: usize,
        rows: usize,
    },
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchError::UnsupportedStrategy(name) => write!(f, "unsupported matcher or selector type: {}", name),
            MatchError::InvalidParameter { name, reason } => {
                write!(f, "invalid matcher parameter {}: {}", name, reason)
            }
            MatchError::IncompatibleDescriptors { query, train } => write!(
                f,
                "incompatible descriptors: {} x {} against {} x {}",
                query.0, query.1, train.0, train.1
            ),
            MatchError::RowMismatch { frame, keypoints, rows } => write!(
                f,
                "{} frame has {} keypoints but {} descriptor rows",
                frame, keypoints, rows
            ),
        }
    }
}

impl std::error::Error for MatchError {}

pub type MatchResult<T> = Result<T, MatchError>;
