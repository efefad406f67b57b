//! Error types for process execution and SVS invocation

use std::path::PathBuf;
use thiserror::Error;

/// Low-level process execution errors.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to spawn process: {reason}")]
    SpawnFailed { reason: String },

    #[error("failed to wait for process: {reason}")]
    WaitFailed { reason: String },

    #[error("execution timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },
}

/// Failures of one SVS engine invocation. Carries enough captured output to
/// diagnose environment mismatches without rerunning the engine.
#[derive(Error, Debug)]
pub enum SvsError {
    #[error("SVS project root not found at {path}")]
    MissingProjectRoot { path: PathBuf },

    #[error("SVS entry point not found at {path}")]
    MissingScript { path: PathBuf },

    #[error("failed to launch the SVS interpreter: {reason}")]
    Spawn { reason: String },

    #[error("SVS synthesis timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error(
        "SVS synthesis failed in the GPU/driver environment (exit code {exit_code:?}); stderr tail:\n{stderr_tail}"
    )]
    GpuEnvironment {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("SVS synthesis failed with exit code {exit_code:?}; stderr tail:\n{stderr_tail}")]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr_tail: String,
    },
}

impl SvsError {
    /// Whether this failure is a timeout (mapped to its own exit code).
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, SvsError::Timeout { .. })
    }
}
