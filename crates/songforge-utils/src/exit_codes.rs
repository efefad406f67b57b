//! Exit code constants and error kind mapping for the songforge CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Pipeline completed, artifact written |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CONFIG` | Invalid CLI arguments or configuration |
//! | 3 | `MISSING_ASSETS` | Pretrained model assets absent |
//! | 4 | `GENERATION` | LLM generation/validation failed |
//! | 5 | `SERIALIZATION` | Score file could not be written |
//! | 6 | `COLLECTION` | Engine produced no usable output |
//! | 10 | `SYNTHESIS_TIMEOUT` | SVS subprocess timed out |
//! | 70 | `SYNTHESIS` | SVS subprocess invocation failed |

use crate::error::ErrorKind;

/// Type-safe exit codes for songforge operations.
///
/// The numeric values are part of the CLI contract; scripts may depend on
/// them to distinguish environment problems from pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Pipeline completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// General/internal failure
    pub const INTERNAL: ExitCode = ExitCode(1);
    /// Invalid CLI arguments or configuration
    pub const CONFIG: ExitCode = ExitCode(2);
    /// Pretrained model assets absent
    pub const MISSING_ASSETS: ExitCode = ExitCode(3);
    /// LLM generation/validation failed
    pub const GENERATION: ExitCode = ExitCode(4);
    /// Score file could not be written
    pub const SERIALIZATION: ExitCode = ExitCode(5);
    /// Engine produced no usable output after a clean exit
    pub const COLLECTION: ExitCode = ExitCode(6);
    /// SVS subprocess timed out
    pub const SYNTHESIS_TIMEOUT: ExitCode = ExitCode(10);
    /// SVS subprocess invocation failed
    pub const SYNTHESIS: ExitCode = ExitCode(70);

    /// Numeric value for `std::process::exit()`.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        self.0
    }

    /// Map an error kind to its exit code.
    #[must_use]
    pub fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Config => Self::CONFIG,
            ErrorKind::MissingAssets => Self::MISSING_ASSETS,
            ErrorKind::Generation => Self::GENERATION,
            ErrorKind::Serialization => Self::SERIALIZATION,
            ErrorKind::Synthesis => Self::SYNTHESIS,
            ErrorKind::Timeout => Self::SYNTHESIS_TIMEOUT,
            ErrorKind::Collection => Self::COLLECTION,
            ErrorKind::Internal => Self::INTERNAL,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_documented_table() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CONFIG.as_i32(), 2);
        assert_eq!(ExitCode::MISSING_ASSETS.as_i32(), 3);
        assert_eq!(ExitCode::GENERATION.as_i32(), 4);
        assert_eq!(ExitCode::SERIALIZATION.as_i32(), 5);
        assert_eq!(ExitCode::COLLECTION.as_i32(), 6);
        assert_eq!(ExitCode::SYNTHESIS_TIMEOUT.as_i32(), 10);
        assert_eq!(ExitCode::SYNTHESIS.as_i32(), 70);
    }

    #[test]
    fn every_error_kind_maps_to_a_code() {
        assert_eq!(ExitCode::from_kind(ErrorKind::Config), ExitCode::CONFIG);
        assert_eq!(
            ExitCode::from_kind(ErrorKind::MissingAssets),
            ExitCode::MISSING_ASSETS
        );
        assert_eq!(
            ExitCode::from_kind(ErrorKind::Timeout),
            ExitCode::SYNTHESIS_TIMEOUT
        );
        assert_eq!(ExitCode::from_kind(ErrorKind::Synthesis), ExitCode::SYNTHESIS);
        assert_eq!(ExitCode::from_kind(ErrorKind::Internal), ExitCode::INTERNAL);
    }
}
