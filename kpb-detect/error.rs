#[derive(Debug, Clone, PartialEq)]
pub enum DetectError {
    UnsupportedDetector(String),
    InvalidParameter { name: &'static str, reason: String },
    ImageTooSmall { width: u32, height: u32, min_size: u32 },
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectError::UnsupportedDetector(name) => {
                write!(f, "unsupported detector type: {}", name)
            }
            DetectError::InvalidParameter { name, reason } => {
                write!(f, "Invalid detector parameter {}: {}", name, reason)
            }
            DetectError::ImageTooSmall { width, height, min_size } => {
                write!(f, "Image {}x{} too small (minimum {}x{})", width, height, min_size, min_size)
            }
        }
    }
}

impl std::error::Error for DetectError {}

pub type DetectResult<T> = Result<T, DetectError>;

pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> DetectError {
    DetectError::InvalidParameter { name, reason: reason.into() }
}
