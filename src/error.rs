use thiserror::Error;

/// Errors surfaced by the nesting pipeline.
///
/// Search-budget exhaustion is not an error: the packers always return the
/// placements accepted so far.
#[derive(Error, Debug)]
pub enum NestError {
    /// No usable silhouette was detected in the input image.
    #[error("no usable contour found in piece image")]
    NoContourFound,

    #[error("unsupported or undecodable image: {0}")]
    UnsupportedImageFormat(String),

    /// Only produced on request, see [`crate::layout::NestingResult::require_placements`].
    #[error("no orientation of the piece fits on the sheet")]
    PieceTooLargeForSheet,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for NestError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => NestError::Io(e),
            other => NestError::UnsupportedImageFormat(other.to_string()),
        }
    }
}
