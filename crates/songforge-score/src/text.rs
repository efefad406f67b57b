//! Lyric text processing
//!
//! Cleaning, language detection and tokenization. Chinese lyrics tokenize to
//! one character per token (the engine's word input type expects exactly
//! that); English falls back to a heuristic syllable split.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

static CJK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[一-鿿]").expect("cjk regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static CHINESE_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("[，。！？、；：“”‘’（）\\s]").expect("punctuation regex"));

/// Detected language of a lyric text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Chinese,
    English,
    Unknown,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Chinese => write!(f, "chinese"),
            Language::English => write!(f, "english"),
            Language::Unknown => write!(f, "unknown"),
        }
    }
}

/// Caller-supplied language hint; `Auto` defers to detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageHint {
    #[default]
    Auto,
    Chinese,
    English,
}

impl LanguageHint {
    /// Resolve the hint against the actual text.
    #[must_use]
    pub fn resolve(&self, text: &str) -> Language {
        match self {
            LanguageHint::Chinese => Language::Chinese,
            LanguageHint::English => Language::English,
            LanguageHint::Auto => detect_language(text),
        }
    }
}

impl std::str::FromStr for LanguageHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(LanguageHint::Auto),
            "chinese" | "zh" => Ok(LanguageHint::Chinese),
            "english" | "en" => Ok(LanguageHint::English),
            other => Err(format!("unknown language '{other}' (expected auto, chinese or english)")),
        }
    }
}

/// Normalize lyrics for processing: NFKC normalization and whitespace
/// collapsing.
#[must_use]
pub fn clean_lyrics(text: &str) -> String {
    let normalized: String = text.nfkc().collect();
    WHITESPACE_RE.replace_all(&normalized, " ").trim().to_string()
}

/// Detect whether text is primarily Chinese or English by CJK codepoint
/// ratio.
#[must_use]
pub fn detect_language(text: &str) -> Language {
    let cjk_chars = CJK_RE.find_iter(text).count();
    let total_chars = text.chars().filter(|c| !c.is_whitespace()).count();

    if total_chars == 0 {
        return Language::Unknown;
    }

    if cjk_chars as f64 / total_chars as f64 > 0.3 {
        Language::Chinese
    } else {
        Language::English
    }
}

/// Split lyrics into non-empty trimmed lines.
#[must_use]
pub fn split_into_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokenize lyrics into singable units for the given language.
#[must_use]
pub fn tokenize(text: &str, language: Language) -> Vec<String> {
    match language {
        Language::Chinese => tokenize_chinese(text),
        _ => tokenize_english(text),
    }
}

/// One token per Chinese character, punctuation and whitespace stripped.
fn tokenize_chinese(text: &str) -> Vec<String> {
    let stripped = CHINESE_STRIP_RE.replace_all(text, "");
    stripped.chars().map(|c| c.to_string()).collect()
}

/// Heuristic syllable tokenization for English lyrics.
fn tokenize_english(text: &str) -> Vec<String> {
    let mut syllables = Vec::new();
    for raw in text.to_lowercase().split_whitespace() {
        let word: String = raw.chars().filter(|c| c.is_alphanumeric()).collect();
        if !word.is_empty() {
            syllables.extend(estimate_syllables(&word));
        }
    }
    syllables
}

/// Estimate the syllables of an English word by vowel-consonant boundaries.
/// Crude, but the external engine under use is the Chinese opencpop model;
/// English input is secondary.
fn estimate_syllables(word: &str) -> Vec<String> {
    const VOWELS: &str = "aeiouy";
    let chars: Vec<char> = word.chars().collect();

    if chars.len() <= 3 {
        return vec![word.to_string()];
    }

    let mut syllables: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_vowel = false;

    for (i, &ch) in chars.iter().enumerate() {
        current.push(ch);
        let is_vowel = VOWELS.contains(ch);

        // break after a vowel followed by a consonant, except at the end
        if prev_vowel && !is_vowel && i < chars.len() - 1 && current.chars().count() > 1 {
            let split_at = current.chars().count() - 1;
            let head: String = current.chars().take(split_at).collect();
            syllables.push(head);
            current = ch.to_string();
        }

        prev_vowel = is_vowel;
    }

    if !current.is_empty() {
        if let Some(last) = syllables.last_mut() {
            last.push_str(&current);
        } else {
            syllables.push(current);
        }
    }

    if syllables.is_empty() {
        vec![word.to_string()]
    } else {
        syllables
    }
}

/// Syllable count of a single token.
#[must_use]
pub fn syllable_count(word: &str, language: Language) -> usize {
    match language {
        Language::Chinese => 1,
        _ => estimate_syllables(word).len(),
    }
}
