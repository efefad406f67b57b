//! Pipeline controller
//!
//! An explicit state machine over the fixed stage sequence
//! `Generating → Serializing → Synthesizing → Collecting → Done`, with
//! `Failed` reachable from every stage. The first failing stage aborts the
//! run; no partial pipeline is resumed. This is the only place retry
//! decisions live: generation is cheap and side-effect-free, so it retries
//! a small bounded number of times with backoff; synthesis never does.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{info, warn};

use songforge_config::ComposerConfig;
use songforge_llm::ScoreSource;
use songforge_runner::{ProcessRunner, SvsEngine, SvsError, SvsInvocation};
use songforge_score::{LyricRequest, Score, SvsInputFile};
use songforge_utils::error::{
    CollectionError, ConfigError, ErrorKind, GenerationError, SerializationError,
};

use crate::collect::{CollectorProbe, SynthesisArtifact};

/// Name of the serialized score file inside the run's work directory.
const SCORE_FILE_NAME: &str = "svs_input.json";

/// Backoff unit between generation retries.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Stage marker of a pipeline run. Advances monotonically; `Failed` absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Generating,
    Serializing,
    Synthesizing,
    Collecting,
    Done,
    Failed,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Generating => "generating",
            PipelineStage::Serializing => "serializing",
            PipelineStage::Synthesizing => "synthesizing",
            PipelineStage::Collecting => "collecting",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// The error a stage produced, by concern.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Synthesis(#[from] SvsError),

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error("internal failure: {0}")]
    Internal(String),
}

impl StageError {
    /// Error kind for exit-code mapping.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Config(e) => e.kind(),
            StageError::Generation(_) => ErrorKind::Generation,
            StageError::Serialization(_) => ErrorKind::Serialization,
            StageError::Synthesis(e) if e.is_timeout() => ErrorKind::Timeout,
            StageError::Synthesis(_) => ErrorKind::Synthesis,
            StageError::Collection(_) => ErrorKind::Collection,
            StageError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Terminal pipeline failure: which stage failed and why.
#[derive(Error, Debug)]
#[error("pipeline failed during {stage}: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    /// Error kind for exit-code mapping.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Seam for writing the serialized score file.
pub trait ScoreWriter: Send + Sync {
    fn write(&self, score: &Score, path: &Path) -> Result<(), SerializationError>;
}

/// Default writer producing the engine's input schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvsScoreWriter;

impl ScoreWriter for SvsScoreWriter {
    fn write(&self, score: &Score, path: &Path) -> Result<(), SerializationError> {
        SvsInputFile::from_score(score)?.write_to(path)
    }
}

/// Seam for the cross-runtime synthesis call.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, invocation: &SvsInvocation) -> Result<(), SvsError>;
}

impl<R: ProcessRunner> Synthesizer for SvsEngine<R> {
    fn synthesize(&self, invocation: &SvsInvocation) -> Result<(), SvsError> {
        // inherent method takes precedence; captured output is logged there
        SvsEngine::synthesize(self, invocation).map(|_| ())
    }
}

/// One request's journey through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub request: LyricRequest,
    pub stage: PipelineStage,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub score: Option<Score>,
    #[serde(skip)]
    pub score_file: Option<PathBuf>,
    pub artifact: Option<SynthesisArtifact>,
}

impl PipelineRun {
    fn new(request: LyricRequest) -> Self {
        Self {
            request,
            stage: PipelineStage::Generating,
            started_at: Utc::now(),
            finished_at: None,
            score: None,
            score_file: None,
            artifact: None,
        }
    }
}

/// Sequences the pipeline stages and owns all retry/abort decisions.
pub struct PipelineController {
    config: ComposerConfig,
    generator: Arc<dyn ScoreSource>,
    writer: Arc<dyn ScoreWriter>,
    synthesizer: Arc<dyn Synthesizer>,
    collector: Arc<dyn CollectorProbe>,
    check_assets: bool,
}

impl PipelineController {
    #[must_use]
    pub fn new(
        config: ComposerConfig,
        generator: Arc<dyn ScoreSource>,
        writer: Arc<dyn ScoreWriter>,
        synthesizer: Arc<dyn Synthesizer>,
        collector: Arc<dyn CollectorProbe>,
    ) -> Self {
        Self {
            config,
            generator,
            writer,
            synthesizer,
            collector,
            check_assets: true,
        }
    }

    /// Enable or disable the pretrained-asset preflight check.
    #[must_use]
    pub fn with_asset_check(mut self, check_assets: bool) -> Self {
        self.check_assets = check_assets;
        self
    }

    /// Run one request end-to-end.
    ///
    /// Configuration is validated before any network or subprocess
    /// activity. The work directory is removed on both success and failure,
    /// unless keep-diagnostics is set and the run failed.
    pub async fn run(&self, request: LyricRequest) -> Result<PipelineRun, PipelineError> {
        let mut run = PipelineRun::new(request);
        info!(title = %run.request.title, stage = %run.stage, "pipeline started");

        // Preflight: fail before touching the network or spawning anything.
        if let Err(e) = self.config.validate() {
            return Self::fail(run, None, false, PipelineStage::Generating, e.into());
        }
        if self.check_assets
            && let Err(e) = self.config.verify_assets()
        {
            return Self::fail(run, None, false, PipelineStage::Generating, e.into());
        }
        if let Err(e) = self.config.ensure_output_dir() {
            return Self::fail(run, None, false, PipelineStage::Generating, e.into());
        }

        let workdir = match tempfile::Builder::new().prefix("songforge-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return Self::fail(
                    run,
                    None,
                    false,
                    PipelineStage::Generating,
                    StageError::Internal(format!("failed to create work directory: {e}")),
                );
            }
        };
        let keep_diagnostics = self.config.keep_diagnostics;

        // Generating: cheap and side-effect-free, so bounded retries.
        let score = {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match self.generator.generate(&run.request).await {
                    Ok(score) => break score,
                    Err(e) if attempt <= self.config.generation_retries => {
                        warn!(attempt, error = %e, "generation failed, retrying");
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                    Err(e) => {
                        return Self::fail(
                            run,
                            Some(workdir),
                            keep_diagnostics,
                            PipelineStage::Generating,
                            e.into(),
                        );
                    }
                }
            }
        };
        info!(
            token_count = score.token_count(),
            total_duration_secs = score.total_duration(),
            "score generated"
        );
        run.stage = PipelineStage::Serializing;

        // Serializing
        let score_path = workdir.path().join(SCORE_FILE_NAME);
        if let Err(e) = self.writer.write(&score, &score_path) {
            run.score = Some(score);
            return Self::fail(
                run,
                Some(workdir),
                keep_diagnostics,
                PipelineStage::Serializing,
                e.into(),
            );
        }
        run.score = Some(score);
        run.score_file = Some(score_path.clone());
        run.stage = PipelineStage::Synthesizing;

        // Synthesizing: the one long-blocking, cancellable operation.
        let invocation = match self.build_invocation(&score_path) {
            Ok(inv) => inv,
            Err(e) => {
                return Self::fail(
                    run,
                    Some(workdir),
                    keep_diagnostics,
                    PipelineStage::Synthesizing,
                    e.into(),
                );
            }
        };
        let synthesizer = Arc::clone(&self.synthesizer);
        let synthesis = tokio::task::spawn_blocking(move || synthesizer.synthesize(&invocation))
            .await
            .map_err(|e| StageError::Internal(format!("synthesis task panicked: {e}")));
        match synthesis {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Self::fail(
                    run,
                    Some(workdir),
                    keep_diagnostics,
                    PipelineStage::Synthesizing,
                    e.into(),
                );
            }
            Err(e) => {
                return Self::fail(
                    run,
                    Some(workdir),
                    keep_diagnostics,
                    PipelineStage::Synthesizing,
                    e,
                );
            }
        }
        run.stage = PipelineStage::Collecting;

        // Collecting
        let base_name = output_base_name(&run.request.title, run.started_at);
        let dest = self.config.output_dir.join(format!("{base_name}.wav"));
        let artifact = match self.collector.collect(&dest) {
            Ok(artifact) => artifact,
            Err(e) => {
                return Self::fail(
                    run,
                    Some(workdir),
                    keep_diagnostics,
                    PipelineStage::Collecting,
                    e.into(),
                );
            }
        };
        info!(artifact = %artifact.path.display(), "pipeline complete");
        run.artifact = Some(artifact);
        run.stage = PipelineStage::Done;
        run.finished_at = Some(Utc::now());

        // Run metadata is ancillary output; a write failure downgrades to a
        // warning rather than failing a completed synthesis.
        let metadata_path = self.config.output_dir.join(format!("{base_name}_metadata.json"));
        if let Err(e) = write_metadata(&run, &metadata_path) {
            warn!(path = %metadata_path.display(), error = %e, "failed to write run metadata");
        }

        // workdir dropped here: temporary files removed on the success path
        Ok(run)
    }

    /// Move the run to `Failed`, handle diagnostics retention, and return
    /// the terminal error.
    fn fail(
        mut run: PipelineRun,
        workdir: Option<TempDir>,
        keep_diagnostics: bool,
        stage: PipelineStage,
        source: StageError,
    ) -> Result<PipelineRun, PipelineError> {
        run.stage = PipelineStage::Failed;
        run.finished_at = Some(Utc::now());

        if let Some(workdir) = workdir {
            if keep_diagnostics {
                let kept = workdir.keep();
                warn!(path = %kept.display(), "run failed; keeping work directory for diagnostics");
            }
            // otherwise dropped: temporary files removed on the failure path
        }

        Err(PipelineError { stage, source })
    }

    /// Build the per-run subprocess description from validated config.
    fn build_invocation(&self, input_file: &Path) -> Result<SvsInvocation, ConfigError> {
        let interpreter = self.config.svs.resolve_interpreter()?;
        let project_root = self.config.svs.require_project_root()?.to_path_buf();

        Ok(SvsInvocation {
            interpreter,
            project_root,
            script: self.config.svs.script_path.clone(),
            config_path: self.config.svs.config_path.clone(),
            exp_name: self.config.svs.exp_name.clone(),
            input_file: input_file.to_path_buf(),
            timeout: self.config.svs.timeout,
            extra_env: Vec::new(),
        })
    }
}

/// `<sanitized title>_<timestamp>`, matching the artifact naming scheme.
fn output_base_name(title: &str, started_at: DateTime<Utc>) -> String {
    let safe_title: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(20)
        .collect();
    format!("{}_{}", safe_title, started_at.format("%Y%m%d_%H%M%S"))
}

/// Serialize the completed run next to its artifact.
fn write_metadata(run: &PipelineRun, path: &Path) -> Result<(), std::io::Error> {
    let json = serde_json::to_string_pretty(run).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}
