//! Startup configuration for songforge
//!
//! Environment state is read exactly once, at startup, into an explicit
//! [`ComposerConfig`] passed by parameter into the components that need it.
//! Components never read ambient environment variables themselves; tests
//! inject values through [`ComposerConfig::from_lookup`].

use songforge_score::LanguageHint;
use songforge_utils::error::ConfigError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable carrying the LLM credential.
pub const API_KEY_VAR: &str = "CEREBRAS_API_KEY";
/// Environment variable pointing at the SVS project's pinned interpreter.
pub const SVS_PYTHON_VAR: &str = "DS_PYTHON_PATH";
/// Environment variable pointing at the SVS project root.
pub const SVS_ROOT_VAR: &str = "DS_PROJECT_ROOT";

/// LLM provider configuration.
#[derive(Clone)]
pub struct CerebrasConfig {
    /// Bearer credential; absent until supplied by the environment
    pub api_key: Option<String>,
    /// Chat-completions endpoint
    pub api_url: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature for melody generation
    pub temperature: f32,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for CerebrasConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://api.cerebras.ai/v1/chat/completions".to_string(),
            model: "zai-glm-4.6".to_string(),
            temperature: 1.0,
            request_timeout: Duration::from_secs(60),
        }
    }
}

// The credential never appears in logs or debug dumps.
impl std::fmt::Debug for CerebrasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CerebrasConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// External SVS engine configuration. The interpreter and project root are
/// per-machine values and MUST be supplied by the caller, never discovered.
#[derive(Debug, Clone)]
pub struct SvsConfig {
    /// Interpreter of the engine's pinned runtime; a bare name is resolved
    /// on PATH during validation
    pub python_path: PathBuf,
    /// Root directory of the external SVS project
    pub project_root: Option<PathBuf>,
    /// Inference entry point, relative to the project root
    pub script_path: PathBuf,
    /// Engine model config, relative to the project root
    pub config_path: PathBuf,
    /// Experiment (checkpoint) name under `checkpoints/`
    pub exp_name: String,
    /// Hard deadline for one synthesis subprocess
    pub timeout: Duration,
}

impl SvsConfig {
    /// Default synthesis timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
    /// Minimum accepted synthesis timeout in seconds.
    pub const MIN_TIMEOUT_SECS: u64 = 5;

    /// Clamp a caller-supplied timeout to the accepted minimum.
    #[must_use]
    pub fn timeout_from_secs(secs: u64) -> Duration {
        Duration::from_secs(secs.max(Self::MIN_TIMEOUT_SECS))
    }

    /// The configured project root, or a configuration error naming the
    /// variable to set.
    pub fn require_project_root(&self) -> Result<&Path, ConfigError> {
        self.project_root
            .as_deref()
            .ok_or_else(|| ConfigError::MissingPath {
                what: "SVS project root".to_string(),
                var: SVS_ROOT_VAR.to_string(),
            })
    }

    /// Resolve the interpreter to an absolute path. Bare names (no path
    /// separator) are looked up on PATH; explicit paths must exist.
    pub fn resolve_interpreter(&self) -> Result<PathBuf, ConfigError> {
        let has_separator = self
            .python_path
            .to_string_lossy()
            .contains(std::path::MAIN_SEPARATOR);

        if has_separator {
            if self.python_path.is_file() {
                Ok(self.python_path.clone())
            } else {
                Err(ConfigError::PathNotFound {
                    what: "SVS interpreter".to_string(),
                    path: self.python_path.clone(),
                })
            }
        } else {
            which::which(&self.python_path).map_err(|e| ConfigError::InterpreterNotFound {
                name: self.python_path.to_string_lossy().to_string(),
                reason: e.to_string(),
            })
        }
    }
}

impl Default for SvsConfig {
    fn default() -> Self {
        Self {
            python_path: PathBuf::from("python"),
            project_root: None,
            script_path: PathBuf::from("inference/svs/ds_e2e.py"),
            config_path: PathBuf::from("usr/configs/midi/e2e/opencpop/ds100_adj_rel.yaml"),
            exp_name: "0228_opencpop_ds100_rel".to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Top-level configuration, constructed once at startup.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    pub cerebras: CerebrasConfig,
    pub svs: SvsConfig,
    /// Directory receiving final artifacts and run metadata
    pub output_dir: PathBuf,
    /// Retain the work directory of failed runs for inspection
    pub keep_diagnostics: bool,
    /// Bounded retries for the (cheap, side-effect-free) generation stage
    pub generation_retries: u32,
    /// Language hint applied to requests that do not set one
    pub language: LanguageHint,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            cerebras: CerebrasConfig::default(),
            svs: SvsConfig::default(),
            output_dir: PathBuf::from("./output"),
            keep_diagnostics: false,
            generation_retries: 2,
            language: LanguageHint::Auto,
        }
    }
}

impl ComposerConfig {
    /// Build from the process environment. The only place in the program
    /// that reads environment variables for configuration.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; the test seam for
    /// environment-dependent behavior.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup(API_KEY_VAR).filter(|v| !v.is_empty()) {
            config.cerebras.api_key = Some(key);
        }
        if let Some(python) = lookup(SVS_PYTHON_VAR).filter(|v| !v.is_empty()) {
            config.svs.python_path = PathBuf::from(python);
        }
        if let Some(root) = lookup(SVS_ROOT_VAR).filter(|v| !v.is_empty()) {
            config.svs.project_root = Some(PathBuf::from(root));
        }

        tracing::debug!(
            credential = config.cerebras.api_key.is_some(),
            project_root = ?config.svs.project_root,
            interpreter = %config.svs.python_path.display(),
            "configuration snapshot built"
        );
        config
    }

    /// Validate the parts needed for score generation only (the `input`
    /// command path): the LLM credential.
    pub fn validate_generation(&self) -> Result<(), ConfigError> {
        if self.cerebras.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::MissingCredential {
                var: API_KEY_VAR.to_string(),
            });
        }
        Ok(())
    }

    /// Validate everything a full pipeline run needs, before any network or
    /// subprocess activity: credential, project root, entry point and
    /// interpreter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_generation()?;

        let root = self.svs.require_project_root()?;
        if !root.is_dir() {
            return Err(ConfigError::NotADirectory {
                what: "SVS project root".to_string(),
                path: root.to_path_buf(),
            });
        }

        let script = root.join(&self.svs.script_path);
        if !script.is_file() {
            return Err(ConfigError::PathNotFound {
                what: "SVS entry point".to_string(),
                path: script,
            });
        }

        self.svs.resolve_interpreter()?;
        Ok(())
    }

    /// Verify the pretrained assets the engine needs: the model config YAML
    /// and the checkpoint directory for the configured experiment. The
    /// orchestrator does not manage their download; it only fails fast.
    pub fn verify_assets(&self) -> Result<(), ConfigError> {
        let root = self.svs.require_project_root()?;

        let model_config = root.join(&self.svs.config_path);
        if !model_config.is_file() {
            return Err(ConfigError::MissingAssets {
                what: "engine model config".to_string(),
                path: model_config,
            });
        }

        let checkpoints = root.join("checkpoints").join(&self.svs.exp_name);
        if !checkpoints.is_dir() {
            return Err(ConfigError::MissingAssets {
                what: format!("checkpoint directory for experiment '{}'", self.svs.exp_name),
                path: checkpoints,
            });
        }

        Ok(())
    }

    /// Ensure the output directory exists.
    pub fn ensure_output_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| {
            ConfigError::OutputDirUnwritable {
                path: self.output_dir.clone(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songforge_utils::error::ErrorKind;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    /// A fake SVS project tree with entry point, model config and
    /// checkpoints in place.
    fn svs_project_fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("inference/svs")).unwrap();
        std::fs::write(root.join("inference/svs/ds_e2e.py"), "# entry\n").unwrap();
        std::fs::create_dir_all(root.join("usr/configs/midi/e2e/opencpop")).unwrap();
        std::fs::write(
            root.join("usr/configs/midi/e2e/opencpop/ds100_adj_rel.yaml"),
            "work_dir: checkpoints\n",
        )
        .unwrap();
        std::fs::create_dir_all(root.join("checkpoints/0228_opencpop_ds100_rel")).unwrap();
        dir
    }

    #[test]
    fn defaults_match_engine_layout() {
        let config = ComposerConfig::default();
        assert_eq!(
            config.svs.script_path,
            PathBuf::from("inference/svs/ds_e2e.py")
        );
        assert_eq!(config.svs.exp_name, "0228_opencpop_ds100_rel");
        assert!(config.cerebras.api_url.contains("cerebras.ai"));
    }

    #[test]
    fn lookup_populates_required_values() {
        let config = ComposerConfig::from_lookup(lookup_from(&[
            (API_KEY_VAR, "sk-test"),
            (SVS_PYTHON_VAR, "/opt/svs/.venv/bin/python"),
            (SVS_ROOT_VAR, "/opt/svs"),
        ]));

        assert_eq!(config.cerebras.api_key.as_deref(), Some("sk-test"));
        assert_eq!(
            config.svs.python_path,
            PathBuf::from("/opt/svs/.venv/bin/python")
        );
        assert_eq!(config.svs.project_root, Some(PathBuf::from("/opt/svs")));
    }

    #[test]
    fn empty_values_treated_as_unset() {
        let config = ComposerConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "")]));
        assert!(config.cerebras.api_key.is_none());
    }

    #[test]
    fn missing_credential_fails_generation_validation() {
        let config = ComposerConfig::from_lookup(lookup_from(&[]));
        let err = config.validate_generation().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn missing_project_root_reported_with_variable_name() {
        let config = ComposerConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "sk-test")]));
        let err = config.validate().unwrap_err();
        match err {
            ConfigError::MissingPath { var, .. } => assert_eq!(var, SVS_ROOT_VAR),
            other => panic!("expected MissingPath, got {other:?}"),
        }
    }

    #[test]
    fn full_validation_accepts_complete_fixture() {
        let project = svs_project_fixture();
        let mut config = ComposerConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "sk-test")]));
        config.svs.project_root = Some(project.path().to_path_buf());
        // point at something that certainly exists as a file
        config.svs.python_path = project.path().join("inference/svs/ds_e2e.py");

        assert!(config.validate().is_ok());
        assert!(config.verify_assets().is_ok());
    }

    #[test]
    fn missing_checkpoints_is_a_missing_asset() {
        let project = svs_project_fixture();
        std::fs::remove_dir_all(project.path().join("checkpoints")).unwrap();

        let mut config = ComposerConfig::default();
        config.svs.project_root = Some(project.path().to_path_buf());

        let err = config.verify_assets().unwrap_err();
        assert!(matches!(err, ConfigError::MissingAssets { .. }));
        assert_eq!(err.kind(), ErrorKind::MissingAssets);
    }

    #[test]
    fn timeout_clamped_to_minimum() {
        assert_eq!(SvsConfig::timeout_from_secs(1), Duration::from_secs(5));
        assert_eq!(SvsConfig::timeout_from_secs(120), Duration::from_secs(120));
    }

    #[test]
    fn debug_output_redacts_credential() {
        let mut config = CerebrasConfig::default();
        config.api_key = Some("sk-very-secret".to_string());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[redacted]"));
    }
}
