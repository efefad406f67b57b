//! Pipeline engine for songforge
//!
//! The explicit state machine that sequences generation, serialization,
//! cross-runtime synthesis and artifact collection, plus the collector that
//! validates what the external engine produced.

pub mod collect;
pub mod pipeline;

pub use collect::{ArtifactCollector, CollectorProbe, SynthesisArtifact};
pub use pipeline::{
    PipelineController, PipelineError, PipelineRun, PipelineStage, ScoreWriter, StageError,
    SvsScoreWriter, Synthesizer,
};
