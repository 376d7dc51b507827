//! Feature engine boundary.
//!
//! The stitching core only needs keypoints and index-aligned descriptors for
//! a raster. Anything that produces them can be plugged in through
//! [`FeatureEngine`]; [`FastBriefEngine`] is the default.

use crate::brief::Brief;
use crate::fast::fast_detect;
use crate::{FeatureError, Result};
use cv_core::{Descriptors, KeyPoints, Raster};
use cv_imgproc::{convert_rgb_to_gray, gaussian_blur};
use tracing::debug;

/// Keypoints and their descriptors, index-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features {
    pub keypoints: KeyPoints,
    pub descriptors: Descriptors,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

pub trait FeatureEngine: Send + Sync {
    /// May return no keypoints for a flat or tiny raster.
    fn detect(&self, raster: &Raster) -> Features;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FastBriefConfig {
    pub max_features: usize,
    pub fast_threshold: u8,
    pub descriptor_bytes: usize,
    pub patch_size: u32,
    pub blur_sigma: Option<f32>,
    pub seed: u64,
}

impl Default for FastBriefConfig {
    fn default() -> Self {
        Self {
            max_features: 2000,
            fast_threshold: 20,
            descriptor_bytes: 32,
            patch_size: 31,
            blur_sigma: Some(1.2),
            seed: 0x5eed,
        }
    }
}

impl FastBriefConfig {
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = n;
        self
    }

    pub fn with_fast_threshold(mut self, threshold: u8) -> Self {
        self.fast_threshold = threshold;
        self
    }

    pub fn with_patch_size(mut self, size: u32) -> Self {
        self.patch_size = size;
        self
    }

    pub fn with_blur_sigma(mut self, sigma: Option<f32>) -> Self {
        self.blur_sigma = sigma;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(FeatureError::InvalidConfig("max_features must be positive".into()));
        }
        if self.descriptor_bytes == 0 {
            return Err(FeatureError::InvalidConfig("descriptor_bytes must be positive".into()));
        }
        if self.patch_size < 3 {
            return Err(FeatureError::InvalidConfig(format!(
                "patch_size must be at least 3, got {}",
                self.patch_size
            )));
        }
        if let Some(sigma) = self.blur_sigma {
            if !sigma.is_finite() || sigma < 0.0 {
                return Err(FeatureError::InvalidConfig(format!("invalid blur sigma {}", sigma)));
            }
        }
        Ok(())
    }
}

/// FAST-9 corners described with BRIEF bit strings.
#[derive(Debug, Clone)]
pub struct FastBriefEngine {
    config: FastBriefConfig,
    brief: Brief,
}

impl FastBriefEngine {
    pub fn new(config: FastBriefConfig) -> Self {
        let brief = Brief::new(config.descriptor_bytes, config.patch_size, config.seed);
        Self { config, brief }
    }

    /// Like [`FastBriefEngine::new`], rejecting unusable parameters.
    pub fn try_new(config: FastBriefConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &FastBriefConfig {
        &self.config
    }
}

impl Default for FastBriefEngine {
    fn default() -> Self {
        Self::new(FastBriefConfig::default())
    }
}

impl FeatureEngine for FastBriefEngine {
    fn detect(&self, raster: &Raster) -> Features {
        let gray = convert_rgb_to_gray(raster);
        let keypoints = fast_detect(&gray, self.config.fast_threshold, self.config.max_features);

        let smoothed = match self.config.blur_sigma {
            Some(sigma) if sigma > 0.0 => gaussian_blur(&gray, sigma),
            _ => gray,
        };
        let descriptors: Descriptors = self.brief.compute(&smoothed, &keypoints.keypoints).into();

        debug!(
            width = raster.width(),
            height = raster.height(),
            keypoints = keypoints.len(),
            "detected features"
        );

        Features {
            keypoints,
            descriptors,
        }
    }
}
