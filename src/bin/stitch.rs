//! Command-line front end for the panorama pipeline.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cv_stitch::features::{estimate_homography, FastBriefEngine, FeatureEngine, Matcher};
use cv_stitch::io::{load_plan, save_plan, save_raster, ArtifactSink, DirectorySink, ImageHandle};
use cv_stitch::photo::{BlendMode, StitchConfig, Stitcher};
use cv_stitch::plot::{draw_matches, homography_heatmap_svg};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stitch")]
#[command(about = "Stitch an ordered sequence of overlapping images into a panorama")]
#[command(version)]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Worker threads (default: STITCH_CPU_THREADS, then one per core).
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate transforms at low resolution and compose at full resolution.
    Run(RunArgs),

    /// Estimation pass only; writes the transform plan.
    Estimate(EstimateArgs),

    /// Composition pass from a saved transform plan.
    Compose(ComposeArgs),

    /// Render every homography of a plan as an SVG heat map.
    Heatmaps {
        #[arg(long)]
        plan: PathBuf,

        #[arg(long)]
        out_dir: PathBuf,
    },

    /// Match visualization for one image pair.
    Match(MatchArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Input images, in stitching order.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Where to write the panorama (.png or .jpg).
    #[arg(long)]
    out: PathBuf,

    /// Directory for match plots, heat maps and intermediate panoramas.
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Also persist the estimated transform plan.
    #[arg(long)]
    plan: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct EstimateArgs {
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Where to write the transform plan (JSON).
    #[arg(long)]
    plan: PathBuf,

    #[arg(long)]
    artifacts: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct ComposeArgs {
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Transform plan written by `stitch estimate`.
    #[arg(long)]
    plan: PathBuf,

    #[arg(long)]
    out: PathBuf,

    #[arg(long)]
    artifacts: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct MatchArgs {
    image1: PathBuf,
    image2: PathBuf,

    /// Where to write the match plot (.png).
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// JSON configuration file; the flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cap on retained correspondences per pair.
    #[arg(long)]
    max_matches: Option<usize>,

    /// RANSAC inlier distance in pixels at estimation scale.
    #[arg(long)]
    reproj_threshold: Option<f64>,

    /// Scale of the estimation pass, in (0, 1].
    #[arg(long)]
    downscale: Option<f64>,

    /// Scale of the composition pass, in (0, 1].
    #[arg(long)]
    compose_scale: Option<f64>,

    /// Hard limit on either canvas dimension.
    #[arg(long)]
    max_canvas: Option<u32>,

    /// overlap-average or feathered-linear.
    #[arg(long)]
    blend: Option<BlendMode>,

    /// Emit the panorama after every step as an artifact.
    #[arg(long)]
    intermediate: bool,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<StitchConfig> {
        let mut config = match &self.config {
            Some(path) => StitchConfig::from_json_file(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => StitchConfig::default(),
        };
        if let Some(n) = self.max_matches {
            config.max_matches = n;
        }
        if let Some(t) = self.reproj_threshold {
            config.reproj_threshold = t;
        }
        if let Some(s) = self.downscale {
            config.downscale_factor = s;
        }
        if let Some(s) = self.compose_scale {
            config.compose_scale = s;
        }
        if let Some(m) = self.max_canvas {
            config.max_canvas_dimension = m;
        }
        if let Some(mode) = self.blend {
            config.blend_mode = mode;
        }
        if self.intermediate {
            config.emit_intermediate = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;
    cv_stitch::init_thread_pool(cli.threads)?;

    match cli.command {
        Commands::Run(args) => run_stitch(&args),
        Commands::Estimate(args) => run_estimate(&args),
        Commands::Compose(args) => run_compose(&args),
        Commands::Heatmaps { plan, out_dir } => run_heatmaps(&plan, &out_dir),
        Commands::Match(args) => run_match(&args),
    }
}

fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log filter '{}'", level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn open_sources(paths: &[PathBuf]) -> Result<Vec<ImageHandle>> {
    paths
        .iter()
        .map(|p| ImageHandle::open(p).with_context(|| format!("opening {}", p.display())))
        .collect()
}

fn build_stitcher(config: StitchConfig, artifacts: Option<&Path>) -> Result<Stitcher> {
    let mut stitcher = Stitcher::new(config)?;
    if let Some(dir) = artifacts {
        info!(dir = %dir.display(), "writing artifacts");
        stitcher = stitcher.with_sink(Arc::new(DirectorySink::new(dir)));
    }
    Ok(stitcher)
}

// ── run ────────────────────────────────────────────────────────────────

fn run_stitch(args: &RunArgs) -> Result<()> {
    let sources = open_sources(&args.images)?;
    let stitcher = build_stitcher(args.config.resolve()?, args.artifacts.as_deref())?;

    let plan = stitcher.estimate(&sources)?;
    if let Some(path) = &args.plan {
        save_plan(path, &plan).with_context(|| format!("writing plan {}", path.display()))?;
    }
    let outcome = stitcher.compose_plan(&sources, &plan)?;
    save_raster(&args.out, &outcome.panorama).with_context(|| format!("writing {}", args.out.display()))?;

    print!("{}", outcome.report.with_output(&args.out));
    Ok(())
}

// ── estimate / compose ─────────────────────────────────────────────────

fn run_estimate(args: &EstimateArgs) -> Result<()> {
    let sources = open_sources(&args.images)?;
    let stitcher = build_stitcher(args.config.resolve()?, args.artifacts.as_deref())?;

    let plan = stitcher.estimate(&sources)?;
    save_plan(&args.plan, &plan).with_context(|| format!("writing plan {}", args.plan.display()))?;

    println!(
        "{} of {} pairs estimated at scale {}",
        plan.stitched_count(),
        plan.pairs.len(),
        plan.scale
    );
    for pair in plan.pairs.iter().filter(|p| p.is_skipped()) {
        println!(
            "  {} -> {}: skipped ({})",
            pair.from,
            pair.to,
            pair.skip_reason.as_deref().unwrap_or("no homography")
        );
    }
    println!("plan: {}", args.plan.display());
    Ok(())
}

fn run_compose(args: &ComposeArgs) -> Result<()> {
    let sources = open_sources(&args.images)?;
    let plan = load_plan(&args.plan).with_context(|| format!("reading plan {}", args.plan.display()))?;
    let stitcher = build_stitcher(args.config.resolve()?, args.artifacts.as_deref())?;

    let outcome = stitcher.compose_plan(&sources, &plan)?;
    save_raster(&args.out, &outcome.panorama).with_context(|| format!("writing {}", args.out.display()))?;

    print!("{}", outcome.report.with_output(&args.out));
    Ok(())
}

// ── heatmaps ───────────────────────────────────────────────────────────

fn run_heatmaps(plan_path: &Path, out_dir: &Path) -> Result<()> {
    let plan = load_plan(plan_path).with_context(|| format!("reading plan {}", plan_path.display()))?;
    let sink = DirectorySink::new(out_dir);

    let mut written = 0;
    for pair in &plan.pairs {
        let Some(h) = &pair.homography else {
            continue;
        };
        let title = format!("H {} -> {}", pair.from, pair.to);
        sink.write(&format!("homography_{}.svg", pair.to), homography_heatmap_svg(h, &title).as_bytes())?;
        written += 1;
    }
    println!("{} heat maps written to {}", written, out_dir.display());
    Ok(())
}

// ── match ──────────────────────────────────────────────────────────────

fn run_match(args: &MatchArgs) -> Result<()> {
    let config = args.config.resolve()?;
    let scale = config.downscale_factor;
    let left = ImageHandle::open(&args.image1)?.decode(scale)?;
    let right = ImageHandle::open(&args.image2)?.decode(scale)?;

    let engine = FastBriefEngine::default();
    let (fl, fr) = rayon::join(|| engine.detect(&left), || engine.detect(&right));
    let matches = Matcher::new()
        .with_max_matches(config.max_matches)
        .match_descriptors(&fl.descriptors, &fr.descriptors);
    let estimate = estimate_homography(&fl.keypoints, &fr.keypoints, &matches, &config.ransac());

    let mask = estimate.is_success().then_some(estimate.inliers.as_slice());
    let plot = draw_matches(&left, &fl.keypoints, &right, &fr.keypoints, &matches, mask)?;
    save_raster(&args.out, &plot).with_context(|| format!("writing {}", args.out.display()))?;

    println!(
        "{} / {} keypoints, {} matches, {} inliers",
        fl.len(),
        fr.len(),
        matches.len(),
        estimate.num_inliers
    );
    match &estimate.homography {
        Some(h) => println!("homography:\n{}", h),
        None => println!("no homography"),
    }
    println!("plot: {}", args.out.display());
    Ok(())
}
