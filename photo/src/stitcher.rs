//! Pipeline orchestration.
//!
//! [`Stitcher`] walks an ordered image sequence through
//! `Init → Processing(1) → … → Processing(n-1) → Done`. Every step pairs the
//! next image with the anchor (the last image placed on the canvas),
//! estimates the homography between them, warps the accumulated canvas into
//! the frame of the next image and blends both layers.
//!
//! Per-pair failures that [`Error::is_recoverable`] accepts skip the pair and
//! keep the canvas; anything else aborts the run.

use crate::blend::Blender;
use crate::canvas::CanvasComposer;
use crate::config::StitchConfig;
use crate::report::{PairOutcome, PairReport, StitchOutcome, StitchReport};
use crate::{Error, Result};
use cv_core::{Correspondence, Homography, Raster};
use cv_features::{estimate_homography, FastBriefEngine, FeatureEngine, Features, Matcher, MIN_CORRESPONDENCES};
use cv_io::{encode_png, ArtifactSink, ImageHandle, PlannedPair, TransformPlan};
use cv_plot::{draw_matches, homography_heatmap_svg};
use std::borrow::Cow;
use std::fmt;
use std::sync::{mpsc, Arc};
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    /// Adding image `i` to the canvas.
    Processing(usize),
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Init => write!(f, "init"),
            PipelineState::Processing(i) => write!(f, "processing({})", i),
            PipelineState::Done => write!(f, "done"),
        }
    }
}

struct Pipeline {
    state: PipelineState,
}

impl Pipeline {
    fn start(images: usize) -> Self {
        debug!(images, "pipeline initialized");
        Self {
            state: PipelineState::Init,
        }
    }

    fn enter(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "pipeline transition");
        self.state = next;
    }
}

/// Artifacts rendered on the rayon pool. Jobs own their inputs; results come
/// back over a channel and are only collected by [`Artifacts::drain`].
struct Artifacts {
    sink: Option<Arc<dyn ArtifactSink>>,
    tx: mpsc::Sender<(String, Result<()>)>,
    rx: mpsc::Receiver<(String, Result<()>)>,
}

impl Artifacts {
    fn new(sink: Option<Arc<dyn ArtifactSink>>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { sink, tx, rx }
    }

    fn enabled(&self) -> bool {
        self.sink.is_some()
    }

    fn submit<F>(&self, name: String, render: F)
    where
        F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
    {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let tx = self.tx.clone();
        rayon::spawn(move || {
            let result = render().and_then(|bytes| sink.write(&name, &bytes));
            // the receiver only goes away once the run is over
            let _ = tx.send((name, result));
        });
    }

    /// Waits for every submitted job. Returns the number of failures.
    fn drain(self) -> usize {
        let Artifacts { tx, rx, .. } = self;
        drop(tx);

        let mut failed = 0;
        for (name, result) in rx {
            match result {
                Ok(()) => debug!(artifact = %name, "artifact written"),
                Err(e) => {
                    error!(artifact = %name, error = %e, "failed to write artifact");
                    failed += 1;
                }
            }
        }
        failed
    }
}

/// Matches and estimate for one (anchor, next) pair. `matches` is kept on
/// failure so skips can report how far the pair got.
struct PairAttempt {
    matches: Vec<Correspondence>,
    estimate: Result<(Homography, Vec<bool>)>,
}

struct Placement {
    canvas: Raster,
    canvas_from_next: Homography,
    clamped: bool,
}

pub struct Stitcher {
    config: StitchConfig,
    engine: Arc<dyn FeatureEngine>,
    sink: Option<Arc<dyn ArtifactSink>>,
}

impl Default for Stitcher {
    fn default() -> Self {
        Self {
            config: StitchConfig::default(),
            engine: Arc::new(FastBriefEngine::default()),
            sink: None,
        }
    }
}

impl Stitcher {
    /// Stitcher with the default feature engine and no artifact sink.
    pub fn new(config: StitchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn with_engine(mut self, engine: Arc<dyn FeatureEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Estimation pass: pairwise homographies at `downscale_factor`.
    pub fn estimate(&self, sources: &[ImageHandle]) -> Result<TransformPlan> {
        check_count(sources.len())?;
        let scale = self.config.downscale_factor;
        let artifacts = Artifacts::new(self.sink.clone());

        let mut pipeline = Pipeline::start(sources.len());
        let load = |i: usize| sources[i].decode(scale).map(Cow::Owned);
        let plan = self.plan_with(sources.len(), scale, load, &artifacts, &mut pipeline);
        pipeline.enter(PipelineState::Done);

        artifacts.drain();
        plan
    }

    /// Composition pass: replays `plan` at `compose_scale`.
    pub fn compose_plan(&self, sources: &[ImageHandle], plan: &TransformPlan) -> Result<StitchOutcome> {
        check_count(sources.len())?;
        plan.validate()?;
        if plan.image_count != sources.len() {
            return Err(Error::InvalidParameter(format!(
                "plan covers {} images, {} given",
                plan.image_count,
                sources.len()
            )));
        }
        let scale = self.config.compose_scale;
        let artifacts = Artifacts::new(self.sink.clone());

        let mut pipeline = Pipeline::start(sources.len());
        let load = |i: usize| sources[i].decode(scale).map(Cow::Owned);
        let outcome = self.compose_with(plan, scale, load, &artifacts, &mut pipeline);
        pipeline.enter(PipelineState::Done);
        self.finish(outcome, artifacts)
    }

    /// Both passes back to back.
    pub fn stitch(&self, sources: &[ImageHandle]) -> Result<StitchOutcome> {
        let plan = self.estimate(sources)?;
        info!(
            stitched = plan.stitched_count(),
            pairs = plan.pairs.len(),
            "estimation pass finished"
        );
        self.compose_plan(sources, &plan)
    }

    /// Single pass over in-memory rasters at their own scale.
    pub fn stitch_rasters(&self, rasters: &[Raster]) -> Result<StitchOutcome> {
        check_count(rasters.len())?;
        let artifacts = Artifacts::new(self.sink.clone());
        let load = move |i: usize| Ok::<_, Error>(Cow::Borrowed(&rasters[i]));

        let mut pipeline = Pipeline::start(rasters.len());
        let outcome = self
            .plan_with(rasters.len(), 1.0, load, &artifacts, &mut pipeline)
            .and_then(|plan| self.compose_with(&plan, 1.0, load, &artifacts, &mut pipeline));
        pipeline.enter(PipelineState::Done);
        self.finish(outcome, artifacts)
    }

    fn finish(&self, outcome: Result<StitchOutcome>, artifacts: Artifacts) -> Result<StitchOutcome> {
        if let Ok(outcome) = &outcome {
            info!("{}", outcome.report);
            if artifacts.enabled() {
                let panorama = outcome.panorama.clone();
                artifacts.submit("panorama.png".to_string(), move || encode_png(&panorama));
            }
        }
        artifacts.drain();
        outcome
    }

    fn plan_with<'a, L>(
        &self,
        count: usize,
        scale: f64,
        load: L,
        artifacts: &Artifacts,
        pipeline: &mut Pipeline,
    ) -> Result<TransformPlan>
    where
        L: Fn(usize) -> Result<Cow<'a, Raster>>,
    {
        let mut plan = TransformPlan::new(scale, count);
        if count < 2 {
            return Ok(plan);
        }

        let mut anchor = 0;
        let mut anchor_raster = load(0)?;
        let mut anchor_features: Option<Features> = None;

        for i in 1..count {
            pipeline.enter(PipelineState::Processing(i));
            let next_raster = load(i)?;
            let span = info_span!("pair", index = i);
            let _enter = span.enter();

            let (fa, fb) = match anchor_features.take() {
                Some(fa) => (fa, self.engine.detect(&next_raster)),
                None => rayon::join(|| self.engine.detect(&anchor_raster), || self.engine.detect(&next_raster)),
            };
            debug!(anchor = fa.len(), next = fb.len(), "features detected");

            let attempt = self.estimate_pair(anchor, &fa, i, &fb);
            let PairAttempt { matches, estimate } = attempt;

            if artifacts.enabled() && !matches.is_empty() {
                let mask = estimate.as_ref().ok().map(|(_, mask)| mask.clone());
                let (left, right) = (Raster::clone(&anchor_raster), Raster::clone(&next_raster));
                let (left_kps, right_kps) = (fa.keypoints.clone(), fb.keypoints.clone());
                let matches = matches.clone();
                artifacts.submit(format!("matches_{}.png", i), move || {
                    let plot = draw_matches(&left, &left_kps, &right, &right_kps, &matches, mask.as_deref())?;
                    encode_png(&plot)
                });
            }

            match estimate {
                Ok((h, mask)) => {
                    let inliers = mask.iter().filter(|&&inlier| inlier).count();
                    info!(from = anchor, to = i, matches = matches.len(), inliers, "pair registered");
                    if artifacts.enabled() {
                        let title = format!("H {} -> {}", anchor, i);
                        artifacts.submit(format!("homography_{}.svg", i), move || {
                            Ok(homography_heatmap_svg(&h, &title).into_bytes())
                        });
                    }
                    plan.push(PlannedPair::stitched(anchor, i, h, matches.len(), inliers));
                    anchor = i;
                    anchor_raster = next_raster;
                    anchor_features = Some(fb);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(from = anchor, to = i, reason = %e, "pair skipped");
                    plan.push(PlannedPair::skipped(anchor, i, matches.len(), e.to_string()));
                    anchor_features = Some(fa);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(plan)
    }

    fn estimate_pair(&self, anchor: usize, fa: &Features, next: usize, fb: &Features) -> PairAttempt {
        let required = self.config.min_keypoints;
        for (image, features) in [(anchor, fa), (next, fb)] {
            if features.len() < required {
                return PairAttempt {
                    matches: Vec::new(),
                    estimate: Err(Error::InsufficientFeatures {
                        image,
                        found: features.len(),
                        required,
                    }),
                };
            }
        }

        let matcher = Matcher::new().with_max_matches(self.config.max_matches);
        let matches = matcher.match_descriptors(&fa.descriptors, &fb.descriptors);
        if matches.len() < MIN_CORRESPONDENCES {
            let found = matches.len();
            return PairAttempt {
                matches,
                estimate: Err(Error::InsufficientCorrespondences {
                    found,
                    required: MIN_CORRESPONDENCES,
                }),
            };
        }

        let result = estimate_homography(&fa.keypoints, &fb.keypoints, &matches, &self.config.ransac());
        let estimate = match result.homography {
            Some(h) => Ok((h, result.inliers)),
            None => Err(Error::HomographyEstimationFailed(format!(
                "no consensus among {} correspondences",
                matches.len()
            ))),
        };
        PairAttempt { matches, estimate }
    }

    fn compose_with<'a, L>(
        &self,
        plan: &TransformPlan,
        scale: f64,
        load: L,
        artifacts: &Artifacts,
        pipeline: &mut Pipeline,
    ) -> Result<StitchOutcome>
    where
        L: Fn(usize) -> Result<Cow<'a, Raster>>,
    {
        let factor = scale / plan.scale;
        let composer = CanvasComposer::new(self.config.max_canvas_dimension);
        let blender = self.config.blender();
        debug!(blender = blender.name(), factor, "composing");

        let mut report = StitchReport::new(plan.image_count);
        let mut canvas = load(0)?.into_owned();
        let mut canvas_from_prev = Homography::identity();
        let mut anchor = 0;

        for pair in &plan.pairs {
            pipeline.enter(PipelineState::Processing(pair.to));
            let span = info_span!("pair", index = pair.to);
            let _enter = span.enter();

            let skip = |reason: String| PairReport {
                from: pair.from,
                to: pair.to,
                outcome: PairOutcome::Skipped { reason },
            };

            let Some(h) = pair.homography else {
                let reason = pair
                    .skip_reason
                    .clone()
                    .unwrap_or_else(|| "no homography".to_string());
                report.pairs.push(skip(reason));
                continue;
            };
            if pair.from != anchor {
                let reason = format!("image {} is not on the canvas", pair.from);
                warn!(from = pair.from, to = pair.to, "{}", reason);
                report.pairs.push(skip(reason));
                continue;
            }

            let next = load(pair.to)?;
            match place(&canvas, &next, &h, factor, &canvas_from_prev, &composer, blender.as_ref()) {
                Ok(placement) => {
                    canvas = placement.canvas;
                    canvas_from_prev = placement.canvas_from_next;
                    anchor = pair.to;
                    info!(
                        from = pair.from,
                        to = pair.to,
                        width = canvas.width(),
                        height = canvas.height(),
                        "pair composed"
                    );
                    report.pairs.push(PairReport {
                        from: pair.from,
                        to: pair.to,
                        outcome: PairOutcome::Stitched {
                            matches: pair.matches,
                            inliers: pair.inliers,
                            canvas: canvas.dimensions(),
                            clamped: placement.clamped,
                        },
                    });

                    if self.config.emit_intermediate && artifacts.enabled() {
                        let snapshot = canvas.clone();
                        artifacts.submit(format!("panorama_step_{}.png", pair.to), move || encode_png(&snapshot));
                    }
                }
                Err(e) if e.is_recoverable() => {
                    warn!(from = pair.from, to = pair.to, reason = %e, "pair skipped");
                    report.pairs.push(skip(e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(StitchOutcome {
            panorama: canvas,
            report,
        })
    }
}

/// Warps the canvas into the frame of `next` and blends the two layers.
/// `h` maps the anchor image into `next` at plan scale; `canvas_from_prev`
/// maps the anchor image into the canvas.
fn place(
    canvas: &Raster,
    next: &Raster,
    h: &Homography,
    factor: f64,
    canvas_from_prev: &Homography,
    composer: &CanvasComposer,
    blender: &dyn Blender,
) -> Result<Placement> {
    let h = h.rescaled(factor)?;
    let warp = h.compose(&canvas_from_prev.inverse()?)?;
    let composition = composer.compose(canvas, next, &warp)?;
    let clamped = composition.clamped;
    let canvas_from_next = composition.canvas_from_next();
    let canvas = blender.blend(&composition.warped, &composition.placed)?;
    Ok(Placement {
        canvas,
        canvas_from_next,
        clamped,
    })
}

fn check_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::InvalidParameter("at least one image is required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_core::{Descriptor, Descriptors, KeyPoint, KeyPoints};
    use cv_io::MemorySink;

    /// Reports a fixed 5×5 grid of scene points, shifted by the image's
    /// horizontal position in the scene (stored in the red channel). Special
    /// red values: 255 is featureless, 254 gives every point the same
    /// descriptor, 253 puts every point on one row.
    struct GridEngine;

    impl FeatureEngine for GridEngine {
        fn detect(&self, raster: &Raster) -> Features {
            let tag = raster.pixel(0, 0)[0];
            let mut features = Features::default();
            if tag == 255 {
                return features;
            }
            let mut keypoints = KeyPoints::new();
            let mut descriptors = Descriptors::new();
            for gy in 0..5u8 {
                for gx in 0..5u8 {
                    let id = gy * 5 + gx;
                    let (x, y) = match tag {
                        253 => (4.0 + 3.0 * id as f64, 50.0),
                        _ => (80.0 + 4.0 * gx as f64 - tag as f64, 20.0 + 15.0 * gy as f64),
                    };
                    keypoints.push(KeyPoint::new(x, y));
                    let bits = if tag == 254 { 0xAA } else { id };
                    descriptors.push(Descriptor::Binary(vec![bits; 4]));
                }
            }
            features.keypoints = keypoints;
            features.descriptors = descriptors;
            features
        }
    }

    fn tagged(tag: u8) -> Raster {
        let mut r = Raster::new(100, 100);
        for y in 0..100 {
            for x in 0..100 {
                r.put_pixel(x, y, [tag, 60, 60]);
            }
        }
        r
    }

    fn grid_stitcher(config: StitchConfig) -> Stitcher {
        Stitcher::new(config).unwrap().with_engine(Arc::new(GridEngine))
    }

    #[test]
    fn no_images_is_an_error() {
        let result = Stitcher::default().stitch_rasters(&[]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn single_image_is_its_own_panorama() {
        let a = tagged(0);
        let outcome = Stitcher::default().stitch_rasters(std::slice::from_ref(&a)).unwrap();
        assert_eq!(outcome.panorama, a);
        assert!(outcome.report.pairs.is_empty());
        assert_eq!(outcome.report.image_count, 1);
    }

    #[test]
    fn translated_pair_extends_canvas() {
        let stitcher = grid_stitcher(StitchConfig::default());
        let outcome = stitcher.stitch_rasters(&[tagged(0), tagged(80)]).unwrap();

        assert_eq!(outcome.panorama.dimensions(), (180, 100));
        assert_eq!(outcome.panorama.pixel(10, 50), [0, 60, 60]);
        assert_eq!(outcome.panorama.pixel(90, 50), [40, 60, 60]);
        assert_eq!(outcome.panorama.pixel(170, 50), [80, 60, 60]);
        match &outcome.report.pairs[0].outcome {
            PairOutcome::Stitched { matches, inliers, canvas, clamped } => {
                assert_eq!(*matches, 25);
                assert_eq!(*inliers, 25);
                assert_eq!(*canvas, (180, 100));
                assert!(!clamped);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn featureless_image_is_skipped_and_anchor_kept() {
        let stitcher = grid_stitcher(StitchConfig::default());
        let outcome = stitcher
            .stitch_rasters(&[tagged(0), tagged(255), tagged(80)])
            .unwrap();

        let report = &outcome.report;
        assert_eq!(report.pairs.len(), 2);
        assert_eq!((report.pairs[0].from, report.pairs[0].to), (0, 1));
        assert!(matches!(
            &report.pairs[0].outcome,
            PairOutcome::Skipped { reason } if reason.contains("image 1 has 0 keypoints")
        ));
        assert_eq!((report.pairs[1].from, report.pairs[1].to), (0, 2));
        assert!(report.pairs[1].is_stitched());
        assert_eq!(outcome.panorama.dimensions(), (180, 100));
    }

    #[test]
    fn too_few_correspondences_skip_the_pair() {
        let stitcher = grid_stitcher(StitchConfig::default());
        let a = tagged(0);

        let outcome = stitcher.stitch_rasters(&[a.clone(), tagged(254)]).unwrap();
        assert_eq!(outcome.panorama, a);
        assert!(matches!(
            &outcome.report.pairs[0].outcome,
            PairOutcome::Skipped { reason } if reason.contains("correspondences survived")
        ));

        let outcome = stitcher.stitch_rasters(&[a, tagged(254), tagged(80)]).unwrap();
        let report = &outcome.report;
        assert!(!report.pairs[0].is_stitched());
        assert_eq!((report.pairs[1].from, report.pairs[1].to), (0, 2));
        assert!(report.pairs[1].is_stitched());
        assert_eq!(outcome.panorama.dimensions(), (180, 100));
    }

    #[test]
    fn collinear_correspondences_skip_the_pair_and_keep_anchor() {
        let stitcher = grid_stitcher(StitchConfig::default());
        let outcome = stitcher
            .stitch_rasters(&[tagged(0), tagged(253), tagged(80)])
            .unwrap();

        let report = &outcome.report;
        assert!(matches!(
            &report.pairs[0].outcome,
            PairOutcome::Skipped { reason } if reason.contains("homography estimation failed")
        ));
        assert_eq!((report.pairs[1].from, report.pairs[1].to), (0, 2));
        assert!(report.pairs[1].is_stitched());
        assert_eq!(outcome.panorama.dimensions(), (180, 100));
        assert_eq!(outcome.panorama.pixel(10, 50), [0, 60, 60]);
    }

    #[test]
    fn chained_steps_track_canvas_frame() {
        let stitcher = grid_stitcher(StitchConfig::default());
        // the third image shows the same view as the second
        let outcome = stitcher.stitch_rasters(&[tagged(0), tagged(80), tagged(80)]).unwrap();
        assert_eq!(outcome.report.stitched().count(), 2);
        assert_eq!(outcome.panorama.dimensions(), (180, 100));
    }

    #[test]
    fn all_pairs_failing_still_yields_first_image() {
        let stitcher = grid_stitcher(StitchConfig::default());
        let a = tagged(0);
        let outcome = stitcher.stitch_rasters(&[a.clone(), tagged(255), tagged(255)]).unwrap();
        assert_eq!(outcome.panorama, a);
        assert_eq!(outcome.report.skipped().count(), 2);
    }

    #[test]
    fn artifacts_reach_the_sink() {
        let sink = Arc::new(MemorySink::new());
        let stitcher = grid_stitcher(StitchConfig::default().with_emit_intermediate(true)).with_sink(sink.clone());
        stitcher.stitch_rasters(&[tagged(0), tagged(80)]).unwrap();

        let names = sink.names();
        for expected in ["matches_1.png", "homography_1.svg", "panorama_step_1.png", "panorama.png"] {
            assert!(names.iter().any(|n| n == expected), "missing {} in {:?}", expected, names);
        }
        let svg = String::from_utf8(sink.get("homography_1.svg").unwrap()).unwrap();
        assert!(svg.starts_with("<svg"));
    }

    #[test]
    fn plan_records_skips() {
        let stitcher = grid_stitcher(StitchConfig::default());
        let mut pipeline = Pipeline::start(2);
        let rasters = [tagged(0), tagged(255)];
        let plan = stitcher
            .plan_with(2, 1.0, |i| Ok(Cow::Borrowed(&rasters[i])), &Artifacts::new(None), &mut pipeline)
            .unwrap();
        assert_eq!(plan.pairs.len(), 1);
        assert!(plan.pairs[0].is_skipped());
        assert_eq!(pipeline.state, PipelineState::Processing(1));
    }

    #[test]
    fn rescaled_plan_composes_at_higher_resolution() {
        let stitcher = grid_stitcher(StitchConfig::default());
        let mut plan = TransformPlan::new(0.5, 2);
        plan.push(PlannedPair::stitched(0, 1, Homography::translation(-40.0, 0.0), 25, 25));

        let rasters = [tagged(0), tagged(80)];
        let mut pipeline = Pipeline::start(2);
        let outcome = stitcher
            .compose_with(&plan, 1.0, |i| Ok(Cow::Borrowed(&rasters[i])), &Artifacts::new(None), &mut pipeline)
            .unwrap();
        assert_eq!(outcome.panorama.dimensions(), (180, 100));
    }

    #[test]
    fn state_names() {
        assert_eq!(PipelineState::Processing(3).to_string(), "processing(3)");
        assert_eq!(PipelineState::Done.to_string(), "done");
    }
}
