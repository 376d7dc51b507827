//! Pixel-level operations used by the stitching pipeline: grayscale
//! conversion for feature detection, proportional resizing for the
//! estimation pass, Gaussian smoothing and perspective warping.

pub mod color;
pub mod convolve;
pub mod geometry;
pub mod resize;

pub use color::*;
pub use convolve::*;
pub use geometry::*;
pub use resize::*;

pub type Result<T> = std::result::Result<T, ImgprocError>;

#[derive(Debug, thiserror::Error)]
pub enum ImgprocError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Degenerate transform: {0}")]
    DegenerateTransform(String),
}

impl From<ImgprocError> for cv_core::Error {
    fn from(e: ImgprocError) -> Self {
        match e {
            ImgprocError::InvalidParameter(msg) => cv_core::Error::InvalidParameter(msg),
            ImgprocError::DimensionMismatch(msg) => cv_core::Error::DimensionMismatch(msg),
            ImgprocError::DegenerateTransform(_) => cv_core::Error::DegenerateHomography,
        }
    }
}
