//! Error taxonomy for the songforge pipeline
//!
//! Each pipeline concern has its own error enum. The engine pairs these with
//! the stage that produced them; components never swallow an error or
//! substitute default output.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Stable error kind identifiers used for exit-code mapping and reporting.
///
/// Serialized in run metadata, so variant names are part of the output
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing credentials or invalid paths; fix configuration and rerun
    Config,
    /// Required pretrained model assets are absent
    MissingAssets,
    /// LLM call or score validation failed
    Generation,
    /// Score could not be written in the engine's input schema
    Serialization,
    /// External SVS subprocess failed
    Synthesis,
    /// Subprocess exceeded its timeout and was terminated
    Timeout,
    /// Engine reported success but produced no usable output
    Collection,
    /// Unexpected internal failure
    Internal,
}

impl ErrorKind {
    /// Stable string form used in user-facing failure reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::MissingAssets => "missing_assets",
            ErrorKind::Generation => "generation",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Synthesis => "synthesis",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Collection => "collection",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration errors: missing credentials, paths or pretrained assets.
///
/// All of these are fatal and never retried; the user fixes the environment
/// and reruns.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("credential not found in environment variable '{var}'")]
    MissingCredential { var: String },

    #[error("{what} not configured: set the '{var}' environment variable")]
    MissingPath { what: String, var: String },

    #[error("{what} not found at {path}")]
    PathNotFound { what: String, path: PathBuf },

    #[error("{what} at {path} is not a directory")]
    NotADirectory { what: String, path: PathBuf },

    #[error("interpreter '{name}' could not be resolved: {reason}")]
    InterpreterNotFound { name: String, reason: String },

    #[error("pretrained asset missing: {what} expected at {path}")]
    MissingAssets { what: String, path: PathBuf },

    #[error("invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("failed to create output directory {path}: {source}")]
    OutputDirUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Kind used for exit-code mapping: missing assets are reported
    /// separately from other configuration problems.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::MissingAssets { .. } => ErrorKind::MissingAssets,
            _ => ErrorKind::Config,
        }
    }
}

/// Structural violations of the Score invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("score contains no note events")]
    Empty,

    #[error("note {index} has non-positive duration {value}")]
    NonPositiveDuration { index: usize, value: f64 },

    #[error("note {index} has a non-finite duration")]
    NonFiniteDuration { index: usize },

    #[error("note {index} starts before the previous note ends")]
    OverlappingOnsets { index: usize },

    #[error("note {index} has token index {token} but expected at most {expected}")]
    NonContiguousTokens {
        index: usize,
        token: usize,
        expected: usize,
    },

    #[error("score has zero total duration")]
    ZeroTotalDuration,
}

/// Failures from the lyric/score generator: the upstream LLM call or the
/// validation of its response.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("LLM transport failure: {0}")]
    Transport(String),

    #[error("LLM provider rejected credentials: {0}")]
    Auth(String),

    #[error("LLM provider quota exhausted: {0}")]
    Quota(String),

    #[error("LLM provider unavailable: {0}")]
    ProviderOutage(String),

    #[error("LLM request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("lyrics contain no singable tokens")]
    EmptyLyrics,

    #[error("LLM response could not be parsed: {reason}")]
    MalformedResponse { reason: String },

    #[error("generated score is structurally invalid: {0}")]
    InvalidScore(#[from] ScoreError),
}

/// Failures writing the serialized score file for the external engine.
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("cannot write score file to {path}: {source}")]
    TargetUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read score file from {path}: {source}")]
    TargetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("score file at {path} is not valid JSON: {reason}")]
    InvalidJson { path: PathBuf, reason: String },

    #[error("note {index} pitch (midi {midi}) is outside the representable octave range")]
    UnrepresentablePitch { index: usize, midi: u8 },

    #[error("note {index} duration cannot be represented")]
    UnrepresentableDuration { index: usize },

    #[error("score file field mismatch: {reason}")]
    SchemaMismatch { reason: String },
}

/// Failures locating or validating the engine's output artifact after a
/// successful subprocess exit.
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("engine reported success but no output exists at {path}")]
    OutputMissing { path: PathBuf },

    #[error("engine output at {path} is empty")]
    EmptyOutput { path: PathBuf },

    #[error("engine output at {path} is not a recognized audio container: {reason}")]
    InvalidContainer { path: PathBuf, reason: String },

    #[error("failed to copy artifact from {from} to {to}: {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_strings_are_stable() {
        assert_eq!(ErrorKind::Config.as_str(), "config");
        assert_eq!(ErrorKind::MissingAssets.as_str(), "missing_assets");
        assert_eq!(ErrorKind::Timeout.as_str(), "timeout");
        assert_eq!(ErrorKind::Synthesis.as_str(), "synthesis");
    }

    #[test]
    fn config_error_kind_distinguishes_missing_assets() {
        let missing = ConfigError::MissingAssets {
            what: "checkpoint directory".to_string(),
            path: PathBuf::from("/tmp/checkpoints/exp"),
        };
        assert_eq!(missing.kind(), ErrorKind::MissingAssets);

        let credential = ConfigError::MissingCredential {
            var: "CEREBRAS_API_KEY".to_string(),
        };
        assert_eq!(credential.kind(), ErrorKind::Config);
    }

    #[test]
    fn generation_error_wraps_score_error() {
        let err: GenerationError = ScoreError::Empty.into();
        assert!(matches!(err, GenerationError::InvalidScore(ScoreError::Empty)));
        assert!(err.to_string().contains("structurally invalid"));
    }

    #[test]
    fn score_error_messages_name_the_offending_note() {
        let err = ScoreError::NonPositiveDuration {
            index: 3,
            value: -0.5,
        };
        assert!(err.to_string().contains("note 3"));
    }
}
