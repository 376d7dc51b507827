use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot load image {path:?}: {reason}")]
    ImageLoad { path: PathBuf, reason: String },

    #[error("image {image} has {found} keypoints, at least {required} required")]
    InsufficientFeatures {
        image: usize,
        found: usize,
        required: usize,
    },

    #[error("{found} correspondences survived matching, at least {required} required")]
    InsufficientCorrespondences { found: usize, required: usize },

    #[error("homography estimation failed: {0}")]
    HomographyEstimationFailed(String),

    #[error("canvas {width}x{height} exceeds the {max}px limit")]
    CanvasOverflow { width: u64, height: u64, max: u32 },

    #[error("homography is degenerate")]
    DegenerateHomography,

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl Error {
    /// Whether a stitching run can skip the offending pair and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientFeatures { .. }
                | Error::InsufficientCorrespondences { .. }
                | Error::HomographyEstimationFailed(_)
                | Error::CanvasOverflow { .. }
                | Error::DegenerateHomography
        )
    }
}
