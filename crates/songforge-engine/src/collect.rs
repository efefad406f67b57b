//! Artifact collection
//!
//! The external engine's end-to-end script ignores output flags and writes
//! its result to a fixed location under its own project root. The collector
//! owns that knowledge: it locates the file, validates it as a WAV
//! container, and copies it to the run's output path. A clean subprocess
//! exit with no usable output is a `CollectionError`, never success.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use songforge_runner::svs::ENGINE_OUTPUT_RELPATH;
use songforge_utils::error::CollectionError;

/// Validated audio output of one synthesis run.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisArtifact {
    /// Final location of the audio file
    pub path: PathBuf,
    /// Sample rate read from the WAV header
    pub sample_rate: u32,
    /// Audio duration in seconds
    pub duration_secs: f64,
    /// File size in bytes
    pub size_bytes: u64,
}

/// Seam between the pipeline controller and artifact collection.
pub trait CollectorProbe: Send + Sync {
    /// Locate and validate the engine's output, then move it to `dest`.
    fn collect(&self, dest: &Path) -> Result<SynthesisArtifact, CollectionError>;
}

/// Collector for the engine's fixed output location.
#[derive(Debug, Clone)]
pub struct ArtifactCollector {
    source: PathBuf,
}

impl ArtifactCollector {
    /// Collector for an engine rooted at `project_root`.
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        Self {
            source: project_root.join(ENGINE_OUTPUT_RELPATH),
        }
    }

    /// Collector reading an explicit source file. Useful when the engine
    /// output location is overridden.
    #[must_use]
    pub fn from_source(source: PathBuf) -> Self {
        Self { source }
    }
}

impl CollectorProbe for ArtifactCollector {
    fn collect(&self, dest: &Path) -> Result<SynthesisArtifact, CollectionError> {
        debug!(source = %self.source.display(), "collecting engine output");

        if !self.source.is_file() {
            return Err(CollectionError::OutputMissing {
                path: self.source.clone(),
            });
        }

        let size_bytes = std::fs::metadata(&self.source)
            .map(|m| m.len())
            .unwrap_or(0);
        if size_bytes == 0 {
            return Err(CollectionError::EmptyOutput {
                path: self.source.clone(),
            });
        }

        let reader =
            hound::WavReader::open(&self.source).map_err(|e| CollectionError::InvalidContainer {
                path: self.source.clone(),
                reason: e.to_string(),
            })?;
        let spec = reader.spec();
        let duration_secs = f64::from(reader.duration()) / f64::from(spec.sample_rate);

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CollectionError::CopyFailed {
                from: self.source.clone(),
                to: dest.to_path_buf(),
                source,
            })?;
        }
        std::fs::copy(&self.source, dest).map_err(|source| CollectionError::CopyFailed {
            from: self.source.clone(),
            to: dest.to_path_buf(),
            source,
        })?;

        info!(
            path = %dest.display(),
            sample_rate = spec.sample_rate,
            duration_secs,
            "artifact collected"
        );

        Ok(SynthesisArtifact {
            path: dest.to_path_buf(),
            sample_rate: spec.sample_rate,
            duration_secs,
            size_bytes,
        })
    }
}
