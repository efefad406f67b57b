//! Score data model for songforge
//!
//! Turns lyric text into the structured musical representation consumed by
//! the external SVS engine: tokenization, pitch handling, the `Score`
//! invariants, and the on-disk score-file serializer.

pub mod model;
pub mod pitch;
pub mod serialize;
pub mod text;

pub use model::{LyricRequest, NoteEvent, Score};
pub use pitch::{Pitch, PitchError};
pub use serialize::SvsInputFile;
pub use text::{Language, LanguageHint};
