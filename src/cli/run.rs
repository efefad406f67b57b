//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, builds the configuration snapshot, creates the
//! tokio runtime and dispatches to command handlers. It handles ALL output
//! including errors; main.rs only maps the returned `ExitCode`.

use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use songforge_config::ComposerConfig;
use songforge_engine::{
    ArtifactCollector, PipelineController, PipelineError, SvsScoreWriter,
};
use songforge_llm::{CerebrasBackend, ScoreGenerator, ScoreSource};
use songforge_runner::{NativeRunner, SvsEngine};
use songforge_score::{LyricRequest, SvsInputFile};
use songforge_utils::error::ErrorKind;
use songforge_utils::exit_codes::ExitCode;
use songforge_utils::logging;

use super::args::{Cli, Commands};

/// Demo lyrics used when none are supplied, matching the engine's reference
/// example.
const DEMO_LYRICS: &str = "小酒窝长睫毛是你最美的记号";

/// Main CLI execution function.
///
/// On success: returns `Ok(())` after printing any output.
/// On error: prints the failure (stage, error kind, diagnostics) and
/// returns the matching `ExitCode`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing(cli.verbose) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    // The single place ambient environment state becomes configuration.
    let mut config = ComposerConfig::from_env();

    match cli.command {
        Commands::Compose {
            lyrics,
            title,
            output_dir,
            language,
            style,
            keep_diagnostics,
            skip_asset_check,
            synthesis_timeout,
        } => {
            config.output_dir = output_dir;
            config.keep_diagnostics = keep_diagnostics;
            if let Some(language) = language {
                config.language = language;
            }
            if let Some(secs) = synthesis_timeout {
                config.svs.timeout = songforge_config::SvsConfig::timeout_from_secs(secs);
            }

            let lyrics = resolve_lyrics(lyrics.as_deref());
            let mut request = LyricRequest::new(lyrics, title).with_language(config.language);
            if let Some(style) = style {
                request = request.with_style(style);
            }

            compose(&config, request, skip_asset_check)
        }
        Commands::Input { lyrics, language } => {
            if let Some(language) = language {
                config.language = language;
            }
            let lyrics = resolve_lyrics(lyrics.as_deref());
            let request = LyricRequest::new(lyrics, "input").with_language(config.language);
            print_engine_input(&config, request)
        }
        Commands::Doctor => doctor(&config),
    }
}

/// Lyrics argument resolution: a readable path means a lyrics file, any
/// other text is the lyrics themselves, nothing falls back to the demo.
fn resolve_lyrics(arg: Option<&str>) -> String {
    match arg {
        Some(value) => {
            let path = Path::new(value);
            if path.is_file() {
                match std::fs::read_to_string(path) {
                    Ok(content) => return content,
                    Err(e) => {
                        eprintln!("warning: could not read lyrics file {value}: {e}; treating as text");
                    }
                }
            }
            value.to_string()
        }
        None => DEMO_LYRICS.to_string(),
    }
}

/// Full pipeline: generate, serialize, synthesize, collect.
fn compose(
    config: &ComposerConfig,
    request: LyricRequest,
    skip_asset_check: bool,
) -> Result<(), ExitCode> {
    let backend = CerebrasBackend::new(&config.cerebras).map_err(|e| {
        eprintln!("error ({}): {e}", e.kind());
        ExitCode::from_kind(e.kind())
    })?;
    let generator: Arc<dyn ScoreSource> =
        Arc::new(ScoreGenerator::new(backend, &config.cerebras));

    let project_root = config
        .svs
        .project_root
        .clone()
        .unwrap_or_else(|| Path::new(".").to_path_buf());
    let controller = PipelineController::new(
        config.clone(),
        generator,
        Arc::new(SvsScoreWriter),
        Arc::new(SvsEngine::new(NativeRunner::new())),
        Arc::new(ArtifactCollector::new(&project_root)),
    )
    .with_asset_check(!skip_asset_check);

    let runtime = tokio::runtime::Runtime::new().map_err(|e| {
        eprintln!("error: failed to create async runtime: {e}");
        ExitCode::INTERNAL
    })?;

    match runtime.block_on(controller.run(request)) {
        Ok(run) => {
            println!("Composition complete.");
            if let Some(artifact) = &run.artifact {
                println!("Audio: {}", artifact.path.display());
                println!(
                    "  {} Hz, {:.2}s, {} bytes",
                    artifact.sample_rate, artifact.duration_secs, artifact.size_bytes
                );
            }
            Ok(())
        }
        Err(err) => Err(report_pipeline_error(&err)),
    }
}

/// Generation + serialization only; prints the engine input JSON.
fn print_engine_input(config: &ComposerConfig, request: LyricRequest) -> Result<(), ExitCode> {
    if let Err(e) = config.validate_generation() {
        eprintln!("error ({}): {e}", e.kind());
        return Err(ExitCode::from_kind(e.kind()));
    }

    let backend = CerebrasBackend::new(&config.cerebras).map_err(|e| {
        eprintln!("error ({}): {e}", e.kind());
        ExitCode::from_kind(e.kind())
    })?;
    let generator = ScoreGenerator::new(backend, &config.cerebras);

    let runtime = tokio::runtime::Runtime::new().map_err(|e| {
        eprintln!("error: failed to create async runtime: {e}");
        ExitCode::INTERNAL
    })?;

    let score = runtime.block_on(generator.generate(&request)).map_err(|e| {
        eprintln!("error ({}): {e}", ErrorKind::Generation);
        ExitCode::GENERATION
    })?;

    let input = SvsInputFile::from_score(&score).map_err(|e| {
        eprintln!("error ({}): {e}", ErrorKind::Serialization);
        ExitCode::SERIALIZATION
    })?;

    match serde_json::to_string_pretty(&input) {
        Ok(json) => {
            println!("{json}");
            Ok(())
        }
        Err(e) => {
            eprintln!("error: failed to render input JSON: {e}");
            Err(ExitCode::INTERNAL)
        }
    }
}

/// Environment health report, without running anything.
fn doctor(config: &ComposerConfig) -> Result<(), ExitCode> {
    let mut worst: Option<ErrorKind> = None;
    let mut check = |name: &str, result: Result<String, (ErrorKind, String)>| match result {
        Ok(detail) => println!("  ok    {name}: {detail}"),
        Err((kind, reason)) => {
            println!("  FAIL  {name}: {reason}");
            // config problems outrank missing assets for the exit code
            if worst != Some(ErrorKind::Config) {
                worst = Some(kind);
            }
        }
    };

    println!("songforge doctor");

    check(
        "llm credential",
        config
            .validate_generation()
            .map(|()| "present".to_string())
            .map_err(|e| (e.kind(), e.to_string())),
    );

    check(
        "svs project",
        (|| {
            let root = config
                .svs
                .require_project_root()
                .map_err(|e| (e.kind(), e.to_string()))?;
            if !root.is_dir() {
                return Err((ErrorKind::Config, format!("{} is not a directory", root.display())));
            }
            let script = root.join(&config.svs.script_path);
            if !script.is_file() {
                return Err((ErrorKind::Config, format!("entry point missing at {}", script.display())));
            }
            Ok(format!("root {}", root.display()))
        })(),
    );

    check(
        "svs interpreter",
        config
            .svs
            .resolve_interpreter()
            .map(|p| p.display().to_string())
            .map_err(|e| (e.kind(), e.to_string())),
    );

    check(
        "pretrained assets",
        config
            .verify_assets()
            .map(|()| format!("experiment {}", config.svs.exp_name))
            .map_err(|e| (e.kind(), e.to_string())),
    );

    match worst {
        None => {
            println!("environment looks ready");
            Ok(())
        }
        Some(kind) => Err(ExitCode::from_kind(kind)),
    }
}

/// Print the terminal failure: stage, kind and diagnostic detail. Subprocess
/// failures already carry the captured stderr tail in their display form.
fn report_pipeline_error(err: &PipelineError) -> ExitCode {
    debug!(stage = %err.stage, kind = %err.kind(), "pipeline failed");
    eprintln!("error ({}): {err}", err.kind());
    ExitCode::from_kind(err.kind())
}
