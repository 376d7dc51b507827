//! Incremental panorama stitching.
//!
//! Facade over the workspace crates. Most callers only need
//! [`photo::Stitcher`] and [`io::ImageHandle`]:
//!
//! ```no_run
//! use cv_stitch::io::ImageHandle;
//! use cv_stitch::photo::{StitchConfig, Stitcher};
//!
//! let sources = vec![ImageHandle::open("a.jpg")?, ImageHandle::open("b.jpg")?];
//! let outcome = Stitcher::new(StitchConfig::default())?.stitch(&sources)?;
//! cv_stitch::io::save_raster("panorama.png", &outcome.panorama)?;
//! # Ok::<(), cv_stitch::core::Error>(())
//! ```

pub use cv_core as core;
pub use cv_features as features;
pub use cv_imgproc as imgproc;
pub use cv_io as io;
pub use cv_photo as photo;
pub use cv_plot as plot;

use cv_core::{Error, Result};
use rayon::ThreadPoolBuilder;
use std::sync::OnceLock;
use tracing::debug;

/// Environment variable read by [`init_thread_pool`] when no explicit count
/// is given.
pub const THREADS_ENV: &str = "STITCH_CPU_THREADS";

static POOL_SIZE: OnceLock<std::result::Result<usize, String>> = OnceLock::new();

/// Sizes the global rayon pool that warping, blending, matching and artifact
/// rendering run on, and returns the number of worker threads.
///
/// An explicit count wins over [`THREADS_ENV`]; with neither, rayon picks one
/// thread per core. Only the first call builds the pool; later calls return
/// its outcome unchanged.
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<usize> {
    POOL_SIZE
        .get_or_init(|| {
            let env_value = std::env::var(THREADS_ENV).ok();
            let requested = resolve_thread_count(num_threads, env_value.as_deref()).map_err(|e| e.to_string())?;

            let mut builder = ThreadPoolBuilder::new();
            if let Some(n) = requested {
                builder = builder.num_threads(n);
            }
            builder.build_global().map_err(|e| e.to_string())?;
            let size = rayon::current_num_threads();
            debug!(threads = size, "thread pool ready");
            Ok(size)
        })
        .clone()
        .map_err(Error::InvalidParameter)
}

/// `None` leaves the choice to rayon.
fn resolve_thread_count(explicit: Option<usize>, env_value: Option<&str>) -> Result<Option<usize>> {
    let requested = match (explicit, env_value) {
        (Some(n), _) => n,
        (None, None) => return Ok(None),
        (None, Some(raw)) => raw.trim().parse().map_err(|_| {
            Error::InvalidParameter(format!("{} must be a positive integer, got '{}'", THREADS_ENV, raw))
        })?,
    };
    if requested == 0 {
        return Err(Error::InvalidParameter("thread count must be at least 1".into()));
    }
    Ok(Some(requested))
}
