//! Panorama Composition
//!
//! Turns an ordered sequence of overlapping images into one panorama:
//!
//! - **Canvas composition**: sizes a canvas covering the warped accumulated
//!   panorama and the next image, clamped to a hard dimension limit
//! - **Blending**: overlap averaging or a feathered linear ramp
//! - **Stitching pipeline**: pairwise estimation, frame tracking across
//!   steps, skip-and-continue on per-pair failures, artifacts and a report
//!
//! # Example
//!
//! ```no_run
//! # use cv_photo::{StitchConfig, Stitcher};
//! # use cv_io::ImageHandle;
//! let sources = vec![ImageHandle::open("left.jpg")?, ImageHandle::open("right.jpg")?];
//! let stitcher = Stitcher::new(StitchConfig::default())?;
//! let outcome = stitcher.stitch(&sources)?;
//! println!("{}", outcome.report);
//! # Ok::<(), cv_photo::Error>(())
//! ```

pub use cv_core::{Error, Result};

pub mod blend;
pub mod canvas;
pub mod config;
pub mod report;
pub mod stitcher;

pub use blend::{Blender, FeatherBlend, OverlapAverage};
pub use canvas::{compose, CanvasComposer, Composition};
pub use config::{BlendMode, StitchConfig};
pub use cv_io::{ArtifactSink, DirectorySink, MemorySink, NullSink};
pub use report::{PairOutcome, PairReport, StitchOutcome, StitchReport};
pub use stitcher::{PipelineState, Stitcher};
