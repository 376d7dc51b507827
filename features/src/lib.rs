//! Feature detection, correspondence matching and homography estimation.

pub mod brief;
pub mod engine;
pub mod fast;
pub mod matcher;
pub mod ransac;

pub use brief::Brief;
pub use engine::*;
pub use fast::*;
pub use matcher::*;
pub use ransac::*;

pub use cv_core::{Correspondence, Descriptor, Descriptors, KeyPoint, KeyPoints};

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl From<FeatureError> for cv_core::Error {
    fn from(e: FeatureError) -> Self {
        match e {
            FeatureError::InvalidConfig(msg) => cv_core::Error::InvalidParameter(msg),
        }
    }
}

/// Default engine with its default configuration.
pub fn detect_features(raster: &cv_core::Raster) -> Features {
    FastBriefEngine::default().detect(raster)
}
