use cv_core::Raster;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Stitched {
        matches: usize,
        inliers: usize,
        canvas: (u32, u32),
        clamped: bool,
    },
    Skipped {
        reason: String,
    },
}

/// What happened to one stitching step. `from` is the image the step was
/// anchored on, `to` the image being added.
#[derive(Debug, Clone, PartialEq)]
pub struct PairReport {
    pub from: usize,
    pub to: usize,
    pub outcome: PairOutcome,
}

impl PairReport {
    pub fn is_stitched(&self) -> bool {
        matches!(self.outcome, PairOutcome::Stitched { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StitchReport {
    pub image_count: usize,
    pub pairs: Vec<PairReport>,
    pub output: Option<PathBuf>,
}

impl StitchReport {
    pub fn new(image_count: usize) -> Self {
        Self {
            image_count,
            pairs: Vec::new(),
            output: None,
        }
    }

    pub fn stitched(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs.iter().filter(|p| p.is_stitched())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs.iter().filter(|p| !p.is_stitched())
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }
}

impl fmt::Display for StitchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stitched = self.stitched().count();
        writeln!(
            f,
            "{} images, {} of {} pairs stitched, {} skipped",
            self.image_count,
            stitched,
            self.pairs.len(),
            self.pairs.len() - stitched
        )?;
        for pair in &self.pairs {
            match &pair.outcome {
                PairOutcome::Stitched {
                    matches,
                    inliers,
                    canvas,
                    clamped,
                } => {
                    write!(
                        f,
                        "  {} -> {}: stitched ({} matches, {} inliers, canvas {}x{}",
                        pair.from, pair.to, matches, inliers, canvas.0, canvas.1
                    )?;
                    if *clamped {
                        write!(f, ", clamped")?;
                    }
                    writeln!(f, ")")?;
                }
                PairOutcome::Skipped { reason } => {
                    writeln!(f, "  {} -> {}: skipped ({})", pair.from, pair.to, reason)?;
                }
            }
        }
        if let Some(path) = &self.output {
            writeln!(f, "output: {}", path.display())?;
        }
        Ok(())
    }
}

/// Result of a full stitching run.
#[derive(Debug, Clone)]
pub struct StitchOutcome {
    pub panorama: Raster,
    pub report: StitchReport,
}
