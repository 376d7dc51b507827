//! Core data model for panorama stitching.
//!
//! Every other crate in the workspace speaks in these types: [`Raster`] for
//! pixels, [`KeyPoints`]/[`Descriptors`] for features, [`Correspondence`] for
//! matches and [`Homography`] for pairwise geometry. The shared [`Error`]
//! carries the failure taxonomy of a stitching run.

pub mod descriptor;
pub mod error;
pub mod homography;
pub mod keypoint;
pub mod raster;
pub mod robust;

pub use descriptor::*;
pub use error::{Error, Result};
pub use homography::Homography;
pub use keypoint::*;
pub use raster::{Raster, CHANNELS};
pub use robust::{Ransac, RobustConfig, RobustModel, RobustResult};
