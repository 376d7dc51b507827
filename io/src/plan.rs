//! Transform plan persistence.
//!
//! The estimation pass records one entry per stitching step; the composition
//! pass replays them at another resolution without re-running matching.

use crate::{Error, Result};
use cv_core::Homography;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One stitching step: `homography` maps pixels of image `from` into the
/// frame of image `to`, at the plan's scale. `None` means the step was
/// skipped and `skip_reason` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPair {
    pub from: usize,
    pub to: usize,
    pub homography: Option<Homography>,
    pub matches: usize,
    pub inliers: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl PlannedPair {
    pub fn stitched(from: usize, to: usize, homography: Homography, matches: usize, inliers: usize) -> Self {
        Self {
            from,
            to,
            homography: Some(homography),
            matches,
            inliers,
            skip_reason: None,
        }
    }

    pub fn skipped(from: usize, to: usize, matches: usize, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            homography: None,
            matches,
            inliers: 0,
            skip_reason: Some(reason.into()),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.homography.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformPlan {
    /// Resize factor the homographies were estimated at.
    pub scale: f64,
    pub image_count: usize,
    pub pairs: Vec<PlannedPair>,
}

impl TransformPlan {
    pub fn new(scale: f64, image_count: usize) -> Self {
        Self {
            scale,
            image_count,
            pairs: Vec::new(),
        }
    }

    pub fn push(&mut self, pair: PlannedPair) {
        self.pairs.push(pair);
    }

    pub fn stitched_count(&self) -> usize {
        self.pairs.iter().filter(|p| !p.is_skipped()).count()
    }

    /// Checks that the plan describes `image_count` images in order.
    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(Error::InvalidParameter(format!("plan scale {} is not positive", self.scale)));
        }
        if self.pairs.len() + 1 != self.image_count.max(1) {
            return Err(Error::DimensionMismatch(format!(
                "plan for {} images holds {} steps",
                self.image_count,
                self.pairs.len()
            )));
        }
        for (step, pair) in self.pairs.iter().enumerate() {
            if pair.to != step + 1 || pair.from >= pair.to {
                return Err(Error::InvalidParameter(format!(
                    "step {} pairs image {} with image {}",
                    step + 1,
                    pair.from,
                    pair.to
                )));
            }
        }
        Ok(())
    }
}

pub fn plan_to_json(plan: &TransformPlan) -> Result<String> {
    serde_json::to_string_pretty(plan).map_err(|e| Error::Serialization(e.to_string()))
}

pub fn plan_from_json(json: &str) -> Result<TransformPlan> {
    let plan: TransformPlan = serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
    plan.validate()?;
    Ok(plan)
}

pub fn save_plan(path: impl AsRef<Path>, plan: &TransformPlan) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, plan_to_json(plan)?)?;
    debug!(path = %path.display(), steps = plan.pairs.len(), "saved transform plan");
    Ok(())
}

pub fn load_plan(path: impl AsRef<Path>) -> Result<TransformPlan> {
    let json = std::fs::read_to_string(path.as_ref())?;
    plan_from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> TransformPlan {
        let mut plan = TransformPlan::new(0.25, 3);
        plan.push(PlannedPair::stitched(0, 1, Homography::translation(-20.0, 1.5), 50, 41));
        plan.push(PlannedPair::skipped(1, 2, 2, "2 correspondences"));
        plan
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let plan = sample_plan();
        save_plan(&path, &plan).unwrap();
        assert_eq!(load_plan(&path).unwrap(), plan);
    }

    #[test]
    fn json_layout_is_readable() {
        let json = plan_to_json(&sample_plan()).unwrap();
        assert!(json.contains("\"scale\": 0.25"));
        assert!(json.contains("\"homography\": null"));
        assert!(json.contains("\"skip_reason\": \"2 correspondences\""));
    }

    #[test]
    fn inconsistent_plan_is_rejected() {
        let mut plan = sample_plan();
        plan.image_count = 5;
        assert!(plan_from_json(&plan_to_json(&plan).unwrap()).is_err());

        let mut plan = sample_plan();
        plan.pairs[1].to = 7;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn singular_matrix_in_file_is_rejected() {
        let json = r#"{"scale":1.0,"image_count":2,"pairs":[{"from":0,"to":1,
            "homography":[[0,0,0],[0,0,0],[0,0,1]],"matches":4,"inliers":4}]}"#;
        assert!(matches!(plan_from_json(json), Err(Error::Serialization(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(load_plan("/no/such/plan.json"), Err(Error::Io(_))));
    }
}
