//! Lyric/score generation
//!
//! Two LLM calls per request: a lyric analysis (mood, tempo, key, style)
//! and a melody (one note per lyric token). The generator validates
//! everything it returns; a malformed response or an invariant-violating
//! score is a `GenerationError`, never silently coerced. Retry policy lives
//! in the pipeline controller, not here.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use songforge_config::CerebrasConfig;
use songforge_score::text::{self, Language};
use songforge_score::{LyricRequest, NoteEvent, Pitch, Score};
use songforge_utils::error::GenerationError;

use crate::types::{ChatRequest, LlmBackend};

static JSON_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("json regex"));

/// Singable range the generated melody is clamped into (C3..B6).
const MIN_SINGABLE_MIDI: u8 = 48;
const MAX_SINGABLE_MIDI: u8 = 95;

const MIN_TEMPO: u32 = 60;
const MAX_TEMPO: u32 = 180;
const DEFAULT_TEMPO: u32 = 100;

/// Analysis wants consistency more than creativity.
const ANALYSIS_TEMPERATURE: f32 = 0.5;

const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_SCALE: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];
const PENTATONIC_MAJOR: [u8; 5] = [0, 2, 4, 7, 9];

/// Source of validated scores; the seam between the pipeline controller and
/// the LLM-backed generator.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    /// Produce a score for the request, or fail with `GenerationError`.
    /// The returned score always satisfies the Score invariants.
    async fn generate(&self, request: &LyricRequest) -> Result<Score, GenerationError>;
}

/// Musical analysis of a lyric text, driving the melody prompt.
#[derive(Debug, Clone)]
pub struct LyricAnalysis {
    pub language: Language,
    pub tokens: Vec<String>,
    pub emotional_tone: String,
    pub mood_description: String,
    pub tempo_bpm: u32,
    pub key: String,
    pub style: String,
}

/// LLM-backed score generator.
pub struct ScoreGenerator<B> {
    backend: B,
    temperature: f32,
    timeout: Duration,
}

impl<B: LlmBackend> ScoreGenerator<B> {
    #[must_use]
    pub fn new(backend: B, config: &CerebrasConfig) -> Self {
        Self {
            backend,
            temperature: config.temperature,
            timeout: config.request_timeout,
        }
    }

    /// Analyze lyrics: tokenize locally, ask the model for musical
    /// suggestions.
    pub async fn analyze(&self, request: &LyricRequest) -> Result<LyricAnalysis, GenerationError> {
        let language = request.language.resolve(&request.lyrics);
        let tokens = text::tokenize(&request.lyrics, language);
        if tokens.is_empty() {
            return Err(GenerationError::EmptyLyrics);
        }

        debug!(language = %language, token_count = tokens.len(), "analyzing lyrics");

        let response = self
            .backend
            .complete(ChatRequest::new(
                "You are a music composition expert. Analyze lyrics and provide \
                 musical suggestions in JSON format.",
                analysis_prompt(&request.lyrics, language),
                ANALYSIS_TEMPERATURE,
                self.timeout,
            ))
            .await?;

        let parsed: AnalysisResponse = parse_json_block(&response)?;

        let tempo_bpm = parsed
            .suggested_tempo
            .unwrap_or(DEFAULT_TEMPO)
            .clamp(MIN_TEMPO, MAX_TEMPO);
        let style = request
            .style
            .clone()
            .or(parsed.suggested_style)
            .unwrap_or_else(|| "pop".to_string());

        Ok(LyricAnalysis {
            language,
            tokens,
            emotional_tone: parsed.emotional_tone.unwrap_or_else(|| "peaceful".to_string()),
            mood_description: parsed.mood_description.unwrap_or_default(),
            tempo_bpm,
            key: parsed.suggested_key.unwrap_or_else(|| "C".to_string()),
            style,
        })
    }

    /// Ask the model for one note and one duration per token.
    async fn generate_melody(
        &self,
        lyrics: &str,
        analysis: &LyricAnalysis,
    ) -> Result<(Vec<String>, Vec<f64>), GenerationError> {
        let count = analysis.tokens.len();
        let response = self
            .backend
            .complete(ChatRequest::new(
                "You are a music composer. Generate simple, singable melodies. \
                 Always respond with valid JSON.",
                melody_prompt(lyrics, analysis),
                self.temperature,
                self.timeout,
            ))
            .await?;

        let parsed: MelodyResponse = parse_json_block(&response)?;

        if parsed.notes.len() < count || parsed.durations.len() < count {
            return Err(GenerationError::MalformedResponse {
                reason: format!(
                    "expected {count} notes, got {} notes and {} durations",
                    parsed.notes.len(),
                    parsed.durations.len()
                ),
            });
        }

        let mut notes = parsed.notes;
        let mut durations = parsed.durations;
        notes.truncate(count);
        durations.truncate(count);
        Ok((notes, durations))
    }

    /// Assemble and validate the final score.
    fn build_score(
        analysis: &LyricAnalysis,
        notes: Vec<String>,
        durations: Vec<f64>,
    ) -> Result<Score, GenerationError> {
        let mut events = Vec::with_capacity(notes.len());
        let mut onset = 0.0f64;

        for (index, ((word, note), duration)) in analysis
            .tokens
            .iter()
            .zip(&notes)
            .zip(&durations)
            .enumerate()
        {
            let pitch = if note.eq_ignore_ascii_case("rest") {
                None
            } else {
                let parsed = Pitch::parse(note).map_err(|e| GenerationError::MalformedResponse {
                    reason: format!("note {index}: {e}"),
                })?;
                Some(parsed.clamp_to_range(MIN_SINGABLE_MIDI, MAX_SINGABLE_MIDI))
            };

            if !duration.is_finite() || *duration <= 0.0 {
                return Err(GenerationError::MalformedResponse {
                    reason: format!("note {index} has unusable duration {duration}"),
                });
            }

            events.push(NoteEvent {
                word: word.clone(),
                token_index: index,
                pitch,
                duration_secs: *duration,
                onset_secs: onset,
                is_slur: false,
            });
            onset += *duration;
        }

        let score = Score {
            events,
            tempo_bpm: analysis.tempo_bpm,
            key_signature: analysis.key.clone(),
            time_signature: "4/4".to_string(),
        };
        score.validate()?;
        Ok(score)
    }
}

#[async_trait]
impl<B: LlmBackend> ScoreSource for ScoreGenerator<B> {
    async fn generate(&self, request: &LyricRequest) -> Result<Score, GenerationError> {
        let analysis = self.analyze(request).await?;
        info!(
            mood = %analysis.emotional_tone,
            tempo_bpm = analysis.tempo_bpm,
            key = %analysis.key,
            token_count = analysis.tokens.len(),
            "lyric analysis complete"
        );

        let (notes, durations) = self.generate_melody(&request.lyrics, &analysis).await?;
        let score = Self::build_score(&analysis, notes, durations)?;

        info!(
            total_duration_secs = score.total_duration(),
            "melody generation complete"
        );
        Ok(score)
    }
}

/// Extract the first `{...}` block from a model response and deserialize it.
fn parse_json_block<T: for<'de> Deserialize<'de>>(response: &str) -> Result<T, GenerationError> {
    let block = JSON_BLOCK_RE
        .find(response)
        .ok_or_else(|| GenerationError::MalformedResponse {
            reason: "no JSON object in response".to_string(),
        })?;

    serde_json::from_str(block.as_str()).map_err(|e| GenerationError::MalformedResponse {
        reason: e.to_string(),
    })
}

fn analysis_prompt(lyrics: &str, language: Language) -> String {
    format!(
        r#"Analyze the following song lyrics and provide a detailed musical analysis.

Lyrics:
{lyrics}

Language: {language}

Please analyze and respond in the following JSON format:
{{
    "emotional_tone": "one of: joyful, melancholic, energetic, peaceful, romantic, angry, nostalgic, hopeful",
    "mood_description": "brief description of the overall mood",
    "suggested_tempo": <integer between 60-180>,
    "suggested_key": "musical key like C, G, Am, etc.",
    "suggested_style": "one of: pop, ballad, rock, folk, classical"
}}

Respond ONLY with the JSON object, no additional text."#
    )
}

fn melody_prompt(lyrics: &str, analysis: &LyricAnalysis) -> String {
    let count = analysis.tokens.len();
    let intervals = scale_for_mood(&analysis.emotional_tone);
    let root = scale_root(&analysis.key);
    let scale = scale_notes(root, intervals, 4);
    let scale_upper = scale_notes(root, intervals, 5);

    format!(
        r#"Generate a simple melody for these lyrics.

Lyrics: {lyrics}
Number of words/characters: {count}
Mood: {mood}
Tempo: {tempo} BPM
Key: {key}
Style: {style}

Available notes (scale): {scale}
Also available one octave higher: {scale_upper}

Generate EXACTLY {count} notes, one for each word/character.
Use notes from C3 to C6 range.
Format each note as: NoteName+Octave (e.g., C4, G4, E5)

Respond in JSON format:
{{
    "notes": ["C4", "E4", "G4", ...],
    "durations": [0.4, 0.3, 0.5, ...]
}}

Respond ONLY with the JSON object."#,
        mood = analysis.emotional_tone,
        tempo = analysis.tempo_bpm,
        key = analysis.key,
        style = analysis.style,
        scale = scale.join(", "),
        scale_upper = scale_upper.join(", "),
    )
}

/// Scale intervals matching a mood.
fn scale_for_mood(mood: &str) -> &'static [u8] {
    match mood.to_ascii_lowercase().as_str() {
        "sad" | "melancholic" | "nostalgic" | "angry" => &MINOR_SCALE,
        "calm" | "peaceful" => &PENTATONIC_MAJOR,
        _ => &MAJOR_SCALE,
    }
}

/// Root letter of a key signature; minor/accidental decorations are dropped
/// for scale listing.
fn scale_root(key: &str) -> char {
    key.chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| ('A'..='G').contains(c))
        .unwrap_or('C')
}

/// Names of the scale degrees starting from `root` in the given octave.
fn scale_notes(root: char, intervals: &[u8], octave: i32) -> Vec<String> {
    let base = Pitch::parse(&format!("{root}{octave}"))
        .unwrap_or_else(|_| Pitch::from_midi(60).expect("middle C"));

    intervals
        .iter()
        .filter_map(|&step| Pitch::from_midi(base.midi().saturating_add(step)))
        .map(|p| p.scientific())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend returning queued canned responses.
    struct FakeBackend {
        responses: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn with_responses(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|s| (*s).to_string()).collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for FakeBackend {
        async fn complete(&self, _request: ChatRequest) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(GenerationError::EmptyResponse)
        }
    }

    const ANALYSIS_OK: &str = r#"{"emotional_tone": "romantic", "mood_description": "sweet",
        "suggested_tempo": 90, "suggested_key": "G", "suggested_style": "ballad"}"#;

    fn generator(responses: &[&str]) -> ScoreGenerator<FakeBackend> {
        let mut config = CerebrasConfig::default();
        config.api_key = Some("sk-test".to_string());
        ScoreGenerator::new(FakeBackend::with_responses(responses), &config)
    }

    fn request() -> LyricRequest {
        LyricRequest::new("小酒窝长", "Test")
    }

    #[tokio::test]
    async fn happy_path_produces_valid_score() {
        let melody = r#"{"notes": ["A4", "B4", "C5", "D5"], "durations": [0.4, 0.4, 0.4, 0.6]}"#;
        let generator = generator(&[ANALYSIS_OK, melody]);

        let score = generator.generate(&request()).await.unwrap();
        assert!(score.validate().is_ok());
        assert_eq!(score.events.len(), 4);
        assert_eq!(score.tempo_bpm, 90);
        assert_eq!(score.key_signature, "G");
        assert_eq!(score.text(), "小酒窝长");
        // onsets accumulate from durations
        assert!((score.events[3].onset_secs - 1.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn prose_wrapped_json_still_parses() {
        let melody = r#"Here is your melody!
            {"notes": ["A4", "B4", "C5", "D5"], "durations": [0.4, 0.4, 0.4, 0.6]}"#;
        let generator = generator(&[ANALYSIS_OK, melody]);
        assert!(generator.generate(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn melody_without_json_is_malformed() {
        let generator = generator(&[ANALYSIS_OK, "sorry, I cannot help with that"]);
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn short_note_list_is_malformed() {
        let melody = r#"{"notes": ["A4"], "durations": [0.4]}"#;
        let generator = generator(&[ANALYSIS_OK, melody]);
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn invalid_note_syntax_is_malformed_not_coerced() {
        let melody = r#"{"notes": ["A4", "XX9", "C5", "D5"], "durations": [0.4, 0.4, 0.4, 0.6]}"#;
        let generator = generator(&[ANALYSIS_OK, melody]);
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn non_positive_duration_is_malformed() {
        let melody = r#"{"notes": ["A4", "B4", "C5", "D5"], "durations": [0.4, 0.0, 0.4, 0.6]}"#;
        let generator = generator(&[ANALYSIS_OK, melody]);
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn rests_are_allowed() {
        let melody = r#"{"notes": ["A4", "rest", "C5", "D5"], "durations": [0.4, 0.4, 0.4, 0.6]}"#;
        let generator = generator(&[ANALYSIS_OK, melody]);
        let score = generator.generate(&request()).await.unwrap();
        assert!(score.events[1].pitch.is_none());
    }

    #[tokio::test]
    async fn out_of_range_octaves_are_clamped() {
        let melody = r#"{"notes": ["A1", "B8", "C5", "D5"], "durations": [0.4, 0.4, 0.4, 0.6]}"#;
        let generator = generator(&[ANALYSIS_OK, melody]);
        let score = generator.generate(&request()).await.unwrap();
        for event in &score.events {
            let midi = event.pitch.unwrap().midi();
            assert!((MIN_SINGABLE_MIDI..=MAX_SINGABLE_MIDI).contains(&midi));
        }
    }

    #[tokio::test]
    async fn empty_lyrics_fail_without_any_backend_call() {
        let backend = FakeBackend::with_responses(&[]);
        let mut config = CerebrasConfig::default();
        config.api_key = Some("sk-test".to_string());
        let generator = ScoreGenerator::new(backend, &config);

        let err = generator
            .generate(&LyricRequest::new("", "Empty"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::EmptyLyrics));
        assert_eq!(generator.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn analysis_defaults_fill_missing_fields() {
        let melody = r#"{"notes": ["A4", "B4", "C5", "D5"], "durations": [0.4, 0.4, 0.4, 0.6]}"#;
        let generator = generator(&["{}", melody]);
        let score = generator.generate(&request()).await.unwrap();
        assert_eq!(score.tempo_bpm, DEFAULT_TEMPO);
        assert_eq!(score.key_signature, "C");
    }

    #[tokio::test]
    async fn tempo_clamped_into_range() {
        let analysis = r#"{"suggested_tempo": 500}"#;
        let melody = r#"{"notes": ["A4", "B4", "C5", "D5"], "durations": [0.4, 0.4, 0.4, 0.6]}"#;
        let generator = generator(&[analysis, melody]);
        let score = generator.generate(&request()).await.unwrap();
        assert_eq!(score.tempo_bpm, MAX_TEMPO);
    }

    #[test]
    fn mood_selects_scale() {
        assert_eq!(scale_for_mood("melancholic"), &MINOR_SCALE);
        assert_eq!(scale_for_mood("peaceful"), &PENTATONIC_MAJOR);
        assert_eq!(scale_for_mood("joyful"), &MAJOR_SCALE);
        assert_eq!(scale_for_mood("unheard-of"), &MAJOR_SCALE);
    }

    #[test]
    fn scale_root_handles_minor_keys() {
        assert_eq!(scale_root("Am"), 'A');
        assert_eq!(scale_root("g"), 'G');
        assert_eq!(scale_root("?"), 'C');
        assert_eq!(scale_root(""), 'C');
    }

    #[test]
    fn scale_notes_span_the_requested_octave() {
        let notes = scale_notes('C', &MAJOR_SCALE, 4);
        assert_eq!(notes, vec!["C4", "D4", "E4", "F4", "G4", "A4", "B4"]);
    }
}

/// Analysis response fields; all optional, with defaults applied by the
/// generator.
#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    #[serde(default)]
    emotional_tone: Option<String>,
    #[serde(default)]
    mood_description: Option<String>,
    #[serde(default)]
    suggested_tempo: Option<u32>,
    #[serde(default)]
    suggested_key: Option<String>,
    #[serde(default)]
    suggested_style: Option<String>,
}

/// Melody response: both fields required.
#[derive(Debug, Deserialize)]
struct MelodyResponse {
    notes: Vec<String>,
    durations: Vec<f64>,
}
