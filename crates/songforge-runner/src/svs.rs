//! SVS engine invocation
//!
//! The external singing-voice engine lives in its own project tree and runs
//! under its own pinned interpreter, with its own dependency environment.
//! [`SvsInvocation`] describes one launch; [`SvsEngine`] performs it through
//! a [`ProcessRunner`] and classifies failures, separating GPU/driver
//! environment problems (the recurring failure mode) from everything else.

use once_cell::sync::Lazy;
use regex::RegexSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::command_spec::CommandSpec;
use crate::error::{RunnerError, SvsError};
use crate::process::{ProcessOutput, ProcessRunner};

/// Maximum number of stderr characters preserved in failure reports.
const STDERR_TAIL_CHARS: usize = 2000;

/// Known GPU/driver failure signatures in engine stderr. Best effort: a
/// match means the failure is almost certainly environmental; no match
/// means nothing.
static GPU_SIGNATURES: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)CUDA out of memory",
        r"(?i)CUDA error",
        r"(?i)CUDA driver version is insufficient",
        r"(?i)no kernel image is available",
        r"(?i)found no NVIDIA driver",
        r"(?i)NVIDIA-SMI has failed",
        r"(?i)libcudart",
        r"(?i)libcublas",
        r"(?i)cuDNN error",
        r"(?i)torch\.cuda",
    ])
    .expect("gpu signature set")
});

/// Description of one SVS engine launch.
///
/// Both `interpreter` and `project_root` are per-machine configuration
/// supplied by the caller; the engine never discovers them. Invocations are
/// built per run and not reused (the input file lives in a per-run temp
/// directory).
#[derive(Debug, Clone)]
pub struct SvsInvocation {
    /// Interpreter of the engine's pinned runtime
    pub interpreter: PathBuf,
    /// Root of the external SVS project; also the working directory
    pub project_root: PathBuf,
    /// Inference entry point, relative to the project root
    pub script: PathBuf,
    /// Engine model config, relative to the project root
    pub config_path: PathBuf,
    /// Experiment (checkpoint) name
    pub exp_name: String,
    /// Serialized score file to synthesize
    pub input_file: PathBuf,
    /// Hard deadline for the subprocess
    pub timeout: Duration,
    /// Additional environment overrides for the child
    pub extra_env: Vec<(OsString, OsString)>,
}

impl SvsInvocation {
    /// Expand into an argv-style command.
    ///
    /// The engine resolves its own imports from the working directory, so
    /// cwd and `PYTHONPATH` are both pinned to the project root. The first
    /// visible GPU is selected unless the caller overrides
    /// `CUDA_VISIBLE_DEVICES`.
    #[must_use]
    pub fn to_command_spec(&self) -> CommandSpec {
        let script = self.project_root.join(&self.script);

        let mut spec = CommandSpec::new(&self.interpreter)
            .arg(script)
            .arg("--config")
            .arg(&self.config_path)
            .arg("--exp_name")
            .arg(&self.exp_name)
            .arg("--input_file")
            .arg(&self.input_file)
            .cwd(&self.project_root)
            .env("PYTHONPATH", &self.project_root);

        for (key, value) in &self.extra_env {
            spec = spec.env(key, value);
        }

        if !spec.has_env("CUDA_VISIBLE_DEVICES") {
            spec = spec.env("CUDA_VISIBLE_DEVICES", "0");
        }

        spec
    }
}

/// Invoker for the external SVS engine.
///
/// Generic over the process runner so tests can substitute fakes and
/// alternative spawn strategies stay possible without touching the pipeline.
#[derive(Debug, Clone)]
pub struct SvsEngine<R> {
    runner: R,
}

impl<R: ProcessRunner> SvsEngine<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Run one synthesis to completion.
    ///
    /// No automatic retry: a synthesis run is GPU-bound and leaves partial
    /// files behind on failure, so retry policy belongs to the pipeline
    /// controller.
    ///
    /// # Errors
    /// - `MissingProjectRoot` / `MissingScript` when the configured paths
    ///   do not exist
    /// - `Timeout` when the child was terminated at the deadline
    /// - `GpuEnvironment` / `ProcessFailed` on non-zero exit, carrying the
    ///   stderr tail
    pub fn synthesize(&self, invocation: &SvsInvocation) -> Result<ProcessOutput, SvsError> {
        if !invocation.project_root.is_dir() {
            return Err(SvsError::MissingProjectRoot {
                path: invocation.project_root.clone(),
            });
        }
        let script = invocation.project_root.join(&invocation.script);
        if !script.is_file() {
            return Err(SvsError::MissingScript { path: script });
        }

        let spec = invocation.to_command_spec();
        info!(
            interpreter = %invocation.interpreter.display(),
            project_root = %invocation.project_root.display(),
            exp_name = %invocation.exp_name,
            timeout_secs = invocation.timeout.as_secs(),
            "invoking SVS engine"
        );

        let output = self
            .runner
            .run(&spec, invocation.timeout)
            .map_err(|e| match e {
                RunnerError::Timeout { timeout_seconds } => SvsError::Timeout { timeout_seconds },
                RunnerError::SpawnFailed { reason } | RunnerError::WaitFailed { reason } => {
                    SvsError::Spawn { reason }
                }
            })?;

        let stdout_tail = tail(&output.stdout_string(), 500);
        if !stdout_tail.is_empty() {
            debug!(stdout_tail = %stdout_tail, "SVS engine stdout");
        }

        if output.success() {
            return Ok(output);
        }

        let stderr_tail = tail(&output.stderr_string(), STDERR_TAIL_CHARS);
        warn!(exit_code = ?output.exit_code, "SVS engine exited with failure");

        if is_gpu_failure(&stderr_tail) {
            Err(SvsError::GpuEnvironment {
                exit_code: output.exit_code,
                stderr_tail,
            })
        } else {
            Err(SvsError::ProcessFailed {
                exit_code: output.exit_code,
                stderr_tail,
            })
        }
    }
}

/// Does the stderr text match a known GPU/driver failure signature?
#[must_use]
pub fn is_gpu_failure(stderr: &str) -> bool {
    GPU_SIGNATURES.is_match(stderr)
}

/// Last `max_chars` characters of `text`, respecting char boundaries.
#[must_use]
pub fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        text.to_string()
    } else {
        text.chars().skip(count - max_chars).collect()
    }
}

/// Where the engine's end-to-end script writes its output, relative to the
/// project root. The script ignores output flags; collectors use this
/// constant to locate the artifact.
pub const ENGINE_OUTPUT_RELPATH: &str = "infer_out/example_out.wav";

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    struct CannedRunner {
        result: Mutex<Option<Result<ProcessOutput, RunnerError>>>,
    }

    impl CannedRunner {
        fn returning(result: Result<ProcessOutput, RunnerError>) -> Self {
            Self {
                result: Mutex::new(Some(result)),
            }
        }
    }

    impl ProcessRunner for CannedRunner {
        fn run(&self, _cmd: &CommandSpec, _timeout: Duration) -> Result<ProcessOutput, RunnerError> {
            self.result.lock().unwrap().take().expect("single use")
        }
    }

    fn invocation(project_root: &Path) -> SvsInvocation {
        SvsInvocation {
            interpreter: PathBuf::from("/opt/svs/.venv/bin/python"),
            project_root: project_root.to_path_buf(),
            script: PathBuf::from("inference/svs/ds_e2e.py"),
            config_path: PathBuf::from("usr/configs/midi/e2e/opencpop/ds100_adj_rel.yaml"),
            exp_name: "0228_opencpop_ds100_rel".to_string(),
            input_file: PathBuf::from("/tmp/run/svs_input.json"),
            timeout: Duration::from_secs(600),
            extra_env: Vec::new(),
        }
    }

    fn project_fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let script_dir = dir.path().join("inference/svs");
        std::fs::create_dir_all(&script_dir).unwrap();
        std::fs::write(script_dir.join("ds_e2e.py"), "# entry point\n").unwrap();
        dir
    }

    #[test]
    fn command_spec_pins_cwd_and_pythonpath() {
        let inv = invocation(Path::new("/opt/DiffSinger"));
        let spec = inv.to_command_spec();

        assert_eq!(spec.cwd, Some(PathBuf::from("/opt/DiffSinger")));
        assert!(spec.has_env("PYTHONPATH"));
        assert!(spec.has_env("CUDA_VISIBLE_DEVICES"));

        let args: Vec<String> = spec
            .args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert!(args[0].ends_with("ds_e2e.py"));
        assert!(args.contains(&"--exp_name".to_string()));
        assert!(args.contains(&"0228_opencpop_ds100_rel".to_string()));
    }

    #[test]
    fn caller_env_overrides_gpu_selection() {
        let mut inv = invocation(Path::new("/opt/DiffSinger"));
        inv.extra_env
            .push((OsString::from("CUDA_VISIBLE_DEVICES"), OsString::from("2")));
        let spec = inv.to_command_spec();

        let env = spec.env.as_ref().unwrap();
        assert_eq!(
            env.get(&OsString::from("CUDA_VISIBLE_DEVICES")),
            Some(&OsString::from("2"))
        );
    }

    #[test]
    fn missing_project_root_fails_before_spawn() {
        let engine = SvsEngine::new(CannedRunner::returning(Ok(ProcessOutput::new(
            Vec::new(),
            Vec::new(),
            Some(0),
        ))));
        let inv = invocation(Path::new("/definitely/not/here"));

        let err = engine.synthesize(&inv).unwrap_err();
        assert!(matches!(err, SvsError::MissingProjectRoot { .. }));
    }

    #[test]
    fn timeout_maps_to_svs_timeout() {
        let project = project_fixture();
        let engine = SvsEngine::new(CannedRunner::returning(Err(RunnerError::Timeout {
            timeout_seconds: 600,
        })));

        let err = engine.synthesize(&invocation(project.path())).unwrap_err();
        assert!(matches!(err, SvsError::Timeout { timeout_seconds: 600 }));
    }

    #[test]
    fn nonzero_exit_carries_stderr_tail() {
        let project = project_fixture();
        let engine = SvsEngine::new(CannedRunner::returning(Ok(ProcessOutput::new(
            Vec::new(),
            b"Traceback: something unrelated broke".to_vec(),
            Some(1),
        ))));

        let err = engine.synthesize(&invocation(project.path())).unwrap_err();
        match err {
            SvsError::ProcessFailed {
                exit_code,
                stderr_tail,
            } => {
                assert_eq!(exit_code, Some(1));
                assert!(stderr_tail.contains("something unrelated"));
            }
            other => panic!("expected ProcessFailed, got {other:?}"),
        }
    }

    #[test]
    fn cuda_stderr_classified_as_gpu_environment() {
        let project = project_fixture();
        let stderr = b"RuntimeError: CUDA error: no kernel image is available for execution";
        let engine = SvsEngine::new(CannedRunner::returning(Ok(ProcessOutput::new(
            Vec::new(),
            stderr.to_vec(),
            Some(1),
        ))));

        let err = engine.synthesize(&invocation(project.path())).unwrap_err();
        assert!(matches!(err, SvsError::GpuEnvironment { .. }));
    }

    #[test]
    fn gpu_signature_matching() {
        assert!(is_gpu_failure("torch.cuda.OutOfMemoryError: CUDA out of memory"));
        assert!(is_gpu_failure("Found no NVIDIA driver on your system"));
        assert!(is_gpu_failure("could not load libcudart.so.10.1"));
        assert!(!is_gpu_failure("FileNotFoundError: missing config"));
        assert!(!is_gpu_failure(""));
    }

    #[test]
    fn tail_respects_char_boundaries() {
        assert_eq!(tail("hello", 10), "hello");
        assert_eq!(tail("hello", 3), "llo");
        assert_eq!(tail("小酒窝长", 2), "窝长");
    }
}
