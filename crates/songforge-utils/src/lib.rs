//! Shared infrastructure for songforge
//!
//! Error taxonomy, exit codes and logging setup used across the workspace.

pub mod error;
pub mod exit_codes;
pub mod logging;

pub use error::{
    CollectionError, ConfigError, ErrorKind, GenerationError, ScoreError, SerializationError,
};
pub use exit_codes::ExitCode;
