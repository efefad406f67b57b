//! LLM integration for songforge
//!
//! A trait-based backend abstraction over the chat-completions call, the
//! shared HTTP client with retry policy, and the lyric/score generator that
//! turns raw lyrics into a validated [`songforge_score::Score`].

mod cerebras;
mod generator;
pub(crate) mod http_client;
mod types;

pub use cerebras::CerebrasBackend;
pub use generator::{LyricAnalysis, ScoreGenerator, ScoreSource};
pub use songforge_utils::error::GenerationError;
pub use types::{ChatRequest, LlmBackend, Message, Role};
