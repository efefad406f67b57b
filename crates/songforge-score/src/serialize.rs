//! Score-file serialization for the external SVS engine
//!
//! The engine's end-to-end inference script takes a single JSON object with
//! `text`, `notes`, `notes_duration` and `input_type` fields. Notes and
//! durations are ` | `-separated per-token groups of space-separated values;
//! notes use the enharmonic spelling, durations are printed with six decimal
//! places. Serialization is deterministic: the same score written to the
//! same path twice produces byte-identical files.

use serde::{Deserialize, Serialize};
use songforge_utils::error::SerializationError;
use std::path::Path;

use crate::model::Score;

/// Group separator in the engine's notes/durations fields.
const GROUP_SEPARATOR: &str = " | ";

/// The engine's word-level input type.
pub const SVS_INPUT_TYPE: &str = "word";

/// MIDI bounds of pitches representable in the engine's octave notation.
const MIN_REPRESENTABLE_MIDI: u8 = 12; // C0
const MAX_REPRESENTABLE_MIDI: u8 = 119; // B8

/// On-disk input record for the SVS engine. Field order is part of the
/// byte-level output contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvsInputFile {
    pub text: String,
    pub notes: String,
    pub notes_duration: String,
    pub input_type: String,
}

impl SvsInputFile {
    /// Render a validated score into the engine's schema.
    ///
    /// # Errors
    /// - `UnrepresentablePitch` for pitches outside the engine's octave range
    /// - `UnrepresentableDuration` for non-finite or non-positive durations
    /// - `SchemaMismatch` when the lyric text cannot satisfy the word input
    ///   type (the engine requires exactly one character per token group)
    pub fn from_score(score: &Score) -> Result<Self, SerializationError> {
        let mut notes_parts = Vec::new();
        let mut duration_parts = Vec::new();
        let mut event_index = 0usize;

        for (_, events) in score.token_groups() {
            let mut note_strs = Vec::with_capacity(events.len());
            let mut duration_strs = Vec::with_capacity(events.len());

            for event in events {
                if let Some(pitch) = event.pitch {
                    let midi = pitch.midi();
                    if !(MIN_REPRESENTABLE_MIDI..=MAX_REPRESENTABLE_MIDI).contains(&midi) {
                        return Err(SerializationError::UnrepresentablePitch {
                            index: event_index,
                            midi,
                        });
                    }
                    note_strs.push(pitch.to_svs());
                } else {
                    note_strs.push("rest".to_string());
                }

                if !event.duration_secs.is_finite() || event.duration_secs <= 0.0 {
                    return Err(SerializationError::UnrepresentableDuration {
                        index: event_index,
                    });
                }
                duration_strs.push(format!("{:.6}", event.duration_secs));
                event_index += 1;
            }

            notes_parts.push(note_strs.join(" "));
            duration_parts.push(duration_strs.join(" "));
        }

        let file = Self {
            text: score.text(),
            notes: notes_parts.join(GROUP_SEPARATOR),
            notes_duration: duration_parts.join(GROUP_SEPARATOR),
            input_type: SVS_INPUT_TYPE.to_string(),
        };
        file.validate()?;
        Ok(file)
    }

    /// Check the engine's word-type contract: one character of `text` per
    /// note group, and matching note/duration counts inside each group.
    pub fn validate(&self) -> Result<(), SerializationError> {
        let char_count = self.text.chars().count();
        let note_groups: Vec<&str> = self.notes.split('|').map(str::trim).collect();
        let duration_groups: Vec<&str> = self.notes_duration.split('|').map(str::trim).collect();

        if note_groups.len() != char_count {
            return Err(SerializationError::SchemaMismatch {
                reason: format!(
                    "{} note groups for {} characters of text",
                    note_groups.len(),
                    char_count
                ),
            });
        }
        if duration_groups.len() != char_count {
            return Err(SerializationError::SchemaMismatch {
                reason: format!(
                    "{} duration groups for {} characters of text",
                    duration_groups.len(),
                    char_count
                ),
            });
        }

        for (i, (notes, durations)) in note_groups.iter().zip(&duration_groups).enumerate() {
            let note_count = notes.split_whitespace().count();
            let duration_count = durations.split_whitespace().count();
            if note_count != duration_count {
                return Err(SerializationError::SchemaMismatch {
                    reason: format!(
                        "group {i}: {note_count} notes but {duration_count} durations"
                    ),
                });
            }
        }

        Ok(())
    }

    /// Write the record as compact JSON. Deterministic for a given value.
    pub fn write_to(&self, path: &Path) -> Result<(), SerializationError> {
        let json = serde_json::to_string(self).map_err(|e| SerializationError::SchemaMismatch {
            reason: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|source| SerializationError::TargetUnwritable {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a previously written record back.
    pub fn load(path: &Path) -> Result<Self, SerializationError> {
        let raw =
            std::fs::read_to_string(path).map_err(|source| SerializationError::TargetUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&raw).map_err(|e| SerializationError::InvalidJson {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Recover the per-token (note, duration) sequences. Used to verify that
    /// serialization round-trips.
    pub fn note_groups(&self) -> Result<Vec<Vec<(String, f64)>>, SerializationError> {
        let note_groups = self.notes.split('|').map(str::trim);
        let duration_groups: Vec<&str> = self.notes_duration.split('|').map(str::trim).collect();

        let mut out = Vec::new();
        for (i, notes) in note_groups.enumerate() {
            let durations = duration_groups.get(i).ok_or_else(|| {
                SerializationError::SchemaMismatch {
                    reason: format!("no duration group for note group {i}"),
                }
            })?;

            let mut group = Vec::new();
            for (note, duration) in notes.split_whitespace().zip(durations.split_whitespace()) {
                let parsed: f64 =
                    duration
                        .parse()
                        .map_err(|_| SerializationError::SchemaMismatch {
                            reason: format!("group {i}: '{duration}' is not a duration"),
                        })?;
                group.push((note.to_string(), parsed));
            }
            out.push(group);
        }
        Ok(out)
    }
}
