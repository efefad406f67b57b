//! Core score data model
//!
//! `LyricRequest` is the immutable pipeline input; `Score` is the ordered
//! note-event timeline handed from the generator to the serializer.

use serde::{Deserialize, Serialize};
use songforge_utils::error::ScoreError;

use crate::pitch::Pitch;
use crate::text::{self, LanguageHint};

/// Tolerance for onset/duration bookkeeping, in seconds.
const TIMELINE_EPSILON: f64 = 1e-3;

/// One lyric-to-song request. Immutable once created; lyrics are cleaned on
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricRequest {
    pub lyrics: String,
    pub title: String,
    pub language: LanguageHint,
    pub style: Option<String>,
}

impl LyricRequest {
    /// Create a request with cleaned lyrics and default parameters.
    #[must_use]
    pub fn new(lyrics: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            lyrics: text::clean_lyrics(&lyrics.into()),
            title: title.into(),
            language: LanguageHint::Auto,
            style: None,
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: LanguageHint) -> Self {
        self.language = language;
        self
    }

    #[must_use]
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }
}

/// A single note event: one pitch (or rest) voicing one lyric token for a
/// span of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// The lyric token (character or syllable) this event voices
    pub word: String,
    /// Index of the token within the lyrics, 0-based
    pub token_index: usize,
    /// Pitch of the event; `None` is a rest
    pub pitch: Option<Pitch>,
    /// Duration in seconds
    pub duration_secs: f64,
    /// Onset relative to the start of the score, in seconds
    pub onset_secs: f64,
    /// Whether the event continues the previous token's syllable
    pub is_slur: bool,
}

/// Structured musical score: an ordered, non-overlapping note-event timeline
/// plus global musical parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub events: Vec<NoteEvent>,
    pub tempo_bpm: u32,
    pub key_signature: String,
    pub time_signature: String,
}

impl Score {
    /// Validate the score invariants: non-empty, finite positive durations,
    /// a monotonic non-overlapping timeline, contiguous token indices and a
    /// positive total duration.
    pub fn validate(&self) -> Result<(), ScoreError> {
        if self.events.is_empty() {
            return Err(ScoreError::Empty);
        }

        let mut prev_end = f64::NEG_INFINITY;
        let mut next_token = 0usize;

        for (index, event) in self.events.iter().enumerate() {
            if !event.duration_secs.is_finite() || !event.onset_secs.is_finite() {
                return Err(ScoreError::NonFiniteDuration { index });
            }
            if event.duration_secs <= 0.0 {
                return Err(ScoreError::NonPositiveDuration {
                    index,
                    value: event.duration_secs,
                });
            }
            if index > 0 && event.onset_secs + TIMELINE_EPSILON < prev_end {
                return Err(ScoreError::OverlappingOnsets { index });
            }
            // token indices advance by zero (slurred continuation) or one
            if event.token_index != next_token
                && (next_token == 0 || event.token_index != next_token - 1)
            {
                return Err(ScoreError::NonContiguousTokens {
                    index,
                    token: event.token_index,
                    expected: next_token,
                });
            }
            if event.token_index == next_token {
                next_token += 1;
            }

            prev_end = event.onset_secs + event.duration_secs;
        }

        if self.total_duration() <= 0.0 {
            return Err(ScoreError::ZeroTotalDuration);
        }

        Ok(())
    }

    /// Total duration in seconds.
    #[must_use]
    pub fn total_duration(&self) -> f64 {
        self.events.iter().map(|e| e.duration_secs).sum()
    }

    /// Number of distinct lyric tokens voiced by the score.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.events
            .iter()
            .map(|e| e.token_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Lyric text recovered from the events: one word per token, in order.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut last_token = None;
        for event in &self.events {
            if last_token != Some(event.token_index) {
                out.push_str(&event.word);
                last_token = Some(event.token_index);
            }
        }
        out
    }

    /// Events grouped by token, preserving order. Each group carries the
    /// token's word and its events.
    #[must_use]
    pub fn token_groups(&self) -> Vec<(String, Vec<&NoteEvent>)> {
        let mut groups: Vec<(String, Vec<&NoteEvent>)> = Vec::new();
        let mut last_token = None;
        for event in &self.events {
            if last_token == Some(event.token_index) {
                if let Some((_, events)) = groups.last_mut() {
                    events.push(event);
                }
            } else {
                groups.push((event.word.clone(), vec![event]));
                last_token = Some(event.token_index);
            }
        }
        groups
    }
}
