//! Image I/O for the stitching pipeline
//!
//! - Image sources: [`ImageHandle`] probes the header on open and decodes on
//!   demand at any scale.
//! - Transform plans: JSON persistence of per-step homographies between the
//!   estimation and composition passes.
//! - Artifact sinks: where match plots, heat maps and panoramas go.
//! - PNG/JPEG encoding of rasters.

pub mod encode;
pub mod plan;
pub mod sink;
pub mod source;

pub use encode::{encode_jpeg, encode_png, save_raster};
pub use plan::{load_plan, plan_from_json, plan_to_json, save_plan, PlannedPair, TransformPlan};
pub use sink::{ArtifactSink, DirectorySink, MemorySink, NullSink};
pub use source::{load, ImageHandle};

pub use cv_core::{Error, Result};
