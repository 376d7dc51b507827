//! Artifact sinks.
//!
//! The pipeline hands named byte blobs to an [`ArtifactSink`] and never
//! builds a path itself. [`DirectorySink`] is the only place that turns
//! artifact names into files.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::debug;

pub trait ArtifactSink: Send + Sync {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ArtifactSink for NullSink {
    fn write(&self, _name: &str, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Keeps artifacts in memory, keyed by name.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // a writer that panicked cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ArtifactSink for MemorySink {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Writes each artifact as `<root>/<name>`. The root is created on the first
/// write, so a run that emits nothing leaves no directory behind.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
    created: OnceLock<()>,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            created: OnceLock::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && Path::new(name).file_name().is_some();
        if !valid {
            return Err(Error::InvalidParameter(format!("invalid artifact name {:?}", name)));
        }
        Ok(self.root.join(name))
    }

    fn ensure_root(&self) -> Result<()> {
        if self.created.get().is_none() {
            std::fs::create_dir_all(&self.root)?;
            let _ = self.created.set(());
        }
        Ok(())
    }
}

impl ArtifactSink for DirectorySink {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(name)?;
        self.ensure_root()?;
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
        Ok(())
    }
}
