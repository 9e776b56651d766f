use kpb_detect::DetectError;

#[derive(Debug, Clone, PartialEq)]
pub enum DescribeError {
    UnsupportedDescriptor(String),
    /// The keypoints lack data the extractor depends on
    IncompatibleKeypoints { descriptor: &'static str, reason: String },
    Detect(DetectError),
}

impl std::fmt::Display for DescribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescribeError::UnsupportedDescriptor(name) => {
                write!(f, "unsupported descriptor type: {}", name)
            }
            DescribeError::IncompatibleKeypoints { descriptor, reason } => {
                write!(f, "{} descriptor cannot use these keypoints: {}", descriptor, reason)
            }
            DescribeError::Detect(e) => write!(f, "descriptor setup failed: {}", e),
        }
    }
}

impl std::error::Error for DescribeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DescribeError::Detect(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DetectError> for DescribeError {
    fn from(e: DetectError) -> Self {
        DescribeError::Detect(e)
    }
}

pub type DescribeResult<T> = Result<T, DescribeError>;
