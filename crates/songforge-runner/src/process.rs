//! Process execution interface

use std::time::Duration;

use crate::command_spec::CommandSpec;
use crate::error::RunnerError;

/// Output from a completed process execution.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
    /// Exit code (`None` if terminated by signal)
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    #[must_use]
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>, exit_code: Option<i32>) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
        }
    }

    /// Stdout as a lossy UTF-8 string.
    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Stderr as a lossy UTF-8 string.
    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Whether the process exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for process execution with a hard timeout.
///
/// Implementations MUST use argv-style APIs only (no shell string
/// evaluation) and MUST terminate the child when the timeout elapses.
/// The interface is synchronous; callers in async contexts bridge with
/// `spawn_blocking`.
pub trait ProcessRunner: Send + Sync {
    /// Execute a command, waiting at most `timeout`.
    ///
    /// # Errors
    /// - `RunnerError::Timeout` if the child was terminated at the deadline
    /// - `RunnerError::SpawnFailed` / `WaitFailed` for execution errors
    ///
    /// A non-zero exit is NOT an error at this layer; it is reported through
    /// [`ProcessOutput::exit_code`] so callers can attach domain context.
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticRunner {
        output: ProcessOutput,
    }

    impl ProcessRunner for StaticRunner {
        fn run(&self, _cmd: &CommandSpec, _timeout: Duration) -> Result<ProcessOutput, RunnerError> {
            Ok(self.output.clone())
        }
    }

    #[test]
    fn success_requires_zero_exit() {
        let ok = ProcessOutput::new(Vec::new(), Vec::new(), Some(0));
        assert!(ok.success());

        let failed = ProcessOutput::new(Vec::new(), Vec::new(), Some(1));
        assert!(!failed.success());

        let killed = ProcessOutput::new(Vec::new(), Vec::new(), None);
        assert!(!killed.success());
    }

    #[test]
    fn lossy_strings_never_panic() {
        let output = ProcessOutput::new(vec![0xff, 0xfe], vec![0xff], Some(0));
        assert!(!output.stdout_string().is_empty());
        assert!(!output.stderr_string().is_empty());
    }

    #[test]
    fn trait_is_object_safe() {
        let runner: Box<dyn ProcessRunner> = Box::new(StaticRunner {
            output: ProcessOutput::new(b"out".to_vec(), b"err".to_vec(), Some(0)),
        });
        let result = runner
            .run(&CommandSpec::new("noop"), Duration::from_secs(1))
            .unwrap();
        assert_eq!(result.stdout_string(), "out");
    }
}
