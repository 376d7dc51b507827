//! Plotting and Visualization
//!
//! Human-inspection artifacts for a stitching run:
//!
//! - [`draw_matches`]: both images side by side with matched keypoints
//!   joined, as a raster ready for PNG encoding
//! - [`homography_heatmap_svg`]: a 3×3 heat map of a homography with the
//!   entries printed in each cell

pub mod heatmap;
pub mod matches;
pub mod style;

pub use heatmap::homography_heatmap_svg;
pub use matches::draw_matches;
pub use style::{Color, COLORS};

pub type Result<T> = std::result::Result<T, PlotError>;

/// Plotting error types
#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<PlotError> for cv_core::Error {
    fn from(e: PlotError) -> Self {
        match e {
            PlotError::InvalidData(msg) => cv_core::Error::Encoding(msg),
        }
    }
}
