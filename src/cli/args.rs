//! CLI argument definitions

use clap::{Parser, Subcommand};
use songforge_score::LanguageHint;
use std::path::PathBuf;

/// songforge - turn lyrics into synthesized singing
#[derive(Parser)]
#[command(name = "songforge")]
#[command(about = "Compose songs from lyrics using an LLM and an external SVS engine")]
#[command(long_about = r#"
songforge turns a string of lyrics into a rendered singing-voice audio file.
An LLM elaborates the lyrics into a musical score; a pretrained
singing-voice-synthesis engine, running under its own pinned interpreter
and dependency environment, renders the audio.

EXAMPLES:
  # Compose a song end-to-end
  songforge compose "小酒窝长睫毛是你最美的记号" --title Dimples

  # Lyrics from a file, keeping failure diagnostics
  songforge compose lyrics.txt --title Demo --keep-diagnostics

  # Print the engine input without synthesizing
  songforge input "小酒窝长睫毛是你最美的记号"

  # Check credentials, paths and pretrained assets
  songforge doctor

CONFIGURATION (environment variables, read once at startup):
  CEREBRAS_API_KEY   credential for the lyric/melody LLM
  DS_PROJECT_ROOT    root directory of the external SVS project
  DS_PYTHON_PATH     interpreter of the SVS project's pinned runtime

The SVS engine is GPU-bound; runs execute one at a time. GPU/driver
problems are a recurring failure mode and are reported with the captured
stderr tail of the engine process.
"#)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose a song: generate a score and synthesize singing audio
    Compose {
        /// Lyrics text, or a path to a lyrics file (demo lyrics if omitted)
        lyrics: Option<String>,

        /// Song title, used for output file naming
        #[arg(long, default_value = "MySong")]
        title: String,

        /// Directory receiving the final audio and run metadata
        #[arg(long, default_value = "./output")]
        output_dir: PathBuf,

        /// Lyric language (auto, chinese, english)
        #[arg(long, value_parser = parse_language)]
        language: Option<LanguageHint>,

        /// Musical style hint passed to the melody prompt
        #[arg(long)]
        style: Option<String>,

        /// Retain the work directory of a failed run for inspection
        #[arg(long)]
        keep_diagnostics: bool,

        /// Skip the pretrained-asset preflight check
        #[arg(long)]
        skip_asset_check: bool,

        /// Synthesis subprocess timeout in seconds
        #[arg(long)]
        synthesis_timeout: Option<u64>,
    },

    /// Generate the score and print the engine input JSON without synthesis
    Input {
        /// Lyrics text, or a path to a lyrics file (demo lyrics if omitted)
        lyrics: Option<String>,

        /// Lyric language (auto, chinese, english)
        #[arg(long, value_parser = parse_language)]
        language: Option<LanguageHint>,
    },

    /// Report configuration, interpreter, project root and asset status
    Doctor,
}

fn parse_language(s: &str) -> Result<LanguageHint, String> {
    s.parse()
}
