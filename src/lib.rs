//! songforge - lyrics to synthesized singing voice
//!
//! songforge chains an LLM-based lyric/melody elaboration step with a
//! pretrained singing-voice-synthesis engine that runs under its own,
//! incompatible interpreter and dependency environment. The hard part is
//! the cross-runtime pipeline: generating structured musical input,
//! handing it to the external engine through the filesystem, invoking the
//! engine as a child process with a hard timeout, and collecting and
//! validating the audio it produces.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! export CEREBRAS_API_KEY=sk-...
//! export DS_PROJECT_ROOT=/opt/DiffSinger
//! export DS_PYTHON_PATH=/opt/DiffSinger/.venv/bin/python
//!
//! # Check the environment without running anything
//! songforge doctor
//!
//! # Compose a song end-to-end
//! songforge compose "小酒窝长睫毛是你最美的记号" --title Dimples
//!
//! # Inspect the engine input without synthesizing
//! songforge input "小酒窝长睫毛是你最美的记号"
//! ```
//!
//! # Library use
//!
//! The pipeline is assembled from explicit seams: a [`ScoreSource`]
//! produces validated scores, a [`ScoreWriter`] serializes them, a
//! [`Synthesizer`] runs the external engine, and a `CollectorProbe`
//! validates its output. [`PipelineController`] sequences them with
//! fail-fast semantics and owns all retry decisions.

// ============================================================================
// Stable public API
// ============================================================================

pub use songforge_config::{CerebrasConfig, ComposerConfig, SvsConfig};
pub use songforge_engine::{
    ArtifactCollector, CollectorProbe, PipelineController, PipelineError, PipelineRun,
    PipelineStage, ScoreWriter, SvsScoreWriter, SynthesisArtifact, Synthesizer,
};
pub use songforge_llm::{CerebrasBackend, ScoreGenerator, ScoreSource};
pub use songforge_runner::{NativeRunner, SvsEngine, SvsError, SvsInvocation};
pub use songforge_score::{LanguageHint, LyricRequest, Score, SvsInputFile};
pub use songforge_utils::error::ErrorKind;
pub use songforge_utils::exit_codes::ExitCode;

// Module-path access to the member crates for integrations that need more
// than the re-exported surface.
pub use songforge_config as config;
pub use songforge_engine as engine;
pub use songforge_llm as llm;
pub use songforge_runner as runner;
pub use songforge_score as score;
pub use songforge_utils as utils;

pub mod cli;
