use crate::blend::{Blender, FeatherBlend, OverlapAverage};
use crate::{Error, Result};
use cv_features::RansacConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How two co-registered layers are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// 50/50 where both layers have content, otherwise whichever does.
    #[default]
    OverlapAverage,
    /// Weight ramp across the overlap, smoothed by a Gaussian.
    FeatheredLinear,
}

impl FromStr for BlendMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "overlap-average" | "average" => Ok(BlendMode::OverlapAverage),
            "feathered-linear" | "feather" => Ok(BlendMode::FeatheredLinear),
            other => Err(Error::InvalidParameter(format!(
                "unknown blend mode '{}' (expected overlap-average or feathered-linear)",
                other
            ))),
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendMode::OverlapAverage => write!(f, "overlap-average"),
            BlendMode::FeatheredLinear => write!(f, "feathered-linear"),
        }
    }
}

/// Parameters of a stitching run. Every field has a default, so a JSON file
/// only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    pub max_matches: usize,
    pub reproj_threshold: f64,
    pub ransac_max_iterations: usize,
    pub ransac_confidence: f64,
    pub ransac_seed: u64,
    /// Scale of the estimation pass.
    pub downscale_factor: f64,
    /// Scale of the composition pass.
    pub compose_scale: f64,
    pub max_canvas_dimension: u32,
    pub blend_mode: BlendMode,
    pub feather_sigma: f32,
    pub min_keypoints: usize,
    pub emit_intermediate: bool,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            max_matches: 50,
            reproj_threshold: 4.0,
            ransac_max_iterations: 2000,
            ransac_confidence: 0.995,
            ransac_seed: 0,
            downscale_factor: 0.25,
            compose_scale: 1.0,
            max_canvas_dimension: 4000,
            blend_mode: BlendMode::OverlapAverage,
            feather_sigma: 5.0,
            min_keypoints: 4,
            emit_intermediate: false,
        }
    }
}

impl StitchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_matches(mut self, n: usize) -> Self {
        self.max_matches = n;
        self
    }

    pub fn with_reproj_threshold(mut self, threshold: f64) -> Self {
        self.reproj_threshold = threshold;
        self
    }

    pub fn with_ransac_seed(mut self, seed: u64) -> Self {
        self.ransac_seed = seed;
        self
    }

    pub fn with_downscale_factor(mut self, factor: f64) -> Self {
        self.downscale_factor = factor;
        self
    }

    pub fn with_compose_scale(mut self, scale: f64) -> Self {
        self.compose_scale = scale;
        self
    }

    pub fn with_max_canvas_dimension(mut self, max: u32) -> Self {
        self.max_canvas_dimension = max;
        self
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn with_feather_sigma(mut self, sigma: f32) -> Self {
        self.feather_sigma = sigma;
        self
    }

    pub fn with_emit_intermediate(mut self, emit: bool) -> Self {
        self.emit_intermediate = emit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        fn unit_scale(name: &str, v: f64) -> Result<()> {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(Error::InvalidParameter(format!("{} must be in (0, 1], got {}", name, v)))
            }
        }

        if self.max_matches < 4 {
            return Err(Error::InvalidParameter(format!(
                "max_matches must be at least 4, got {}",
                self.max_matches
            )));
        }
        if !(self.reproj_threshold.is_finite() && self.reproj_threshold >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "reproj_threshold must be non-negative, got {}",
                self.reproj_threshold
            )));
        }
        if self.ransac_max_iterations == 0 {
            return Err(Error::InvalidParameter("ransac_max_iterations must be positive".into()));
        }
        if !(self.ransac_confidence > 0.0 && self.ransac_confidence < 1.0) {
            return Err(Error::InvalidParameter(format!(
                "ransac_confidence must be in (0, 1), got {}",
                self.ransac_confidence
            )));
        }
        unit_scale("downscale_factor", self.downscale_factor)?;
        unit_scale("compose_scale", self.compose_scale)?;
        if self.max_canvas_dimension == 0 {
            return Err(Error::InvalidParameter("max_canvas_dimension must be positive".into()));
        }
        if !(self.feather_sigma.is_finite() && self.feather_sigma >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "feather_sigma must be non-negative, got {}",
                self.feather_sigma
            )));
        }
        Ok(())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: StitchConfig = serde_json::from_str(&data).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn ransac(&self) -> RansacConfig {
        RansacConfig {
            threshold: self.reproj_threshold,
            max_iterations: self.ransac_max_iterations,
            confidence: self.ransac_confidence,
            seed: self.ransac_seed,
        }
    }

    pub fn blender(&self) -> Box<dyn Blender> {
        match self.blend_mode {
            BlendMode::OverlapAverage => Box::new(OverlapAverage),
            BlendMode::FeatheredLinear => Box::new(FeatherBlend::new(self.feather_sigma)),
        }
    }
}
