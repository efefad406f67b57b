//! Pitch representation and notation conversion
//!
//! A `Pitch` is a MIDI semitone. It converts between scientific pitch
//! notation (`C4`, `F#5`) and the SVS engine's enharmonic text form
//! (`F#/Gb5`); both directions must round-trip.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Semitone names within an octave, sharps only.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

static PITCH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Ga-g])([#b]?)(-?\d{1,2})$").expect("pitch regex"));

/// Errors from parsing pitch notation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PitchError {
    #[error("'{input}' is not a pitch")]
    Invalid { input: String },

    #[error("'{input}' is outside the MIDI range")]
    OutOfRange { input: String },
}

/// A pitch as a MIDI note number (0..=127).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pitch {
    midi: u8,
}

impl Pitch {
    /// Construct from a MIDI note number. Returns `None` above 127.
    #[must_use]
    pub fn from_midi(midi: u8) -> Option<Self> {
        (midi <= 127).then_some(Self { midi })
    }

    /// The MIDI note number.
    #[must_use]
    pub fn midi(&self) -> u8 {
        self.midi
    }

    /// Semitone within the octave (0 = C).
    #[must_use]
    pub fn semitone(&self) -> u8 {
        self.midi % 12
    }

    /// Scientific octave number (C4 = middle C = MIDI 60).
    #[must_use]
    pub fn octave(&self) -> i32 {
        i32::from(self.midi / 12) - 1
    }

    /// Note name without octave, sharps only (`C#`, not `Db`).
    #[must_use]
    pub fn name(&self) -> &'static str {
        NOTE_NAMES[self.semitone() as usize]
    }

    /// Scientific pitch notation, e.g. `F#5`.
    #[must_use]
    pub fn scientific(&self) -> String {
        format!("{}{}", self.name(), self.octave())
    }

    /// The SVS engine's enharmonic form: accidentals carry both spellings,
    /// e.g. `F#5` becomes `F#/Gb5`.
    #[must_use]
    pub fn to_svs(&self) -> String {
        let base = match self.semitone() {
            1 => "C#/Db",
            3 => "D#/Eb",
            6 => "F#/Gb",
            8 => "G#/Ab",
            10 => "A#/Bb",
            _ => self.name(),
        };
        format!("{}{}", base, self.octave())
    }

    /// Parse scientific notation. Also accepts the enharmonic SVS form and
    /// flat spellings (`Db4` parses to the same pitch as `C#4`).
    pub fn parse(input: &str) -> Result<Self, PitchError> {
        let trimmed = input.trim();

        // Enharmonic form: take the spelling after the slash, which carries
        // the octave digit ("F#/Gb5" -> "Gb5").
        let candidate = match trimmed.split_once('/') {
            Some((_, second)) => second,
            None => trimmed,
        };

        let caps = PITCH_RE.captures(candidate).ok_or_else(|| PitchError::Invalid {
            input: input.to_string(),
        })?;

        let letter = caps[1].to_ascii_uppercase();
        let base = match letter.as_str() {
            "C" => 0i32,
            "D" => 2,
            "E" => 4,
            "F" => 5,
            "G" => 7,
            "A" => 9,
            "B" => 11,
            _ => unreachable!("regex restricts the letter"),
        };
        let accidental = match &caps[2] {
            "#" => 1i32,
            "b" => -1,
            _ => 0,
        };
        let octave: i32 = caps[3].parse().map_err(|_| PitchError::Invalid {
            input: input.to_string(),
        })?;

        let midi = (octave + 1) * 12 + base + accidental;
        u8::try_from(midi)
            .ok()
            .and_then(Self::from_midi)
            .ok_or_else(|| PitchError::OutOfRange {
                input: input.to_string(),
            })
    }

    /// Shift by whole octaves until the pitch lies within `[min, max]`
    /// (inclusive MIDI bounds). The range must span at least one octave.
    #[must_use]
    pub fn clamp_to_range(self, min: u8, max: u8) -> Self {
        debug_assert!(max >= min && max - min >= 11, "range narrower than an octave");
        let mut midi = i32::from(self.midi);
        while midi < i32::from(min) {
            midi += 12;
        }
        while midi > i32::from(max) {
            midi -= 12;
        }
        Self { midi: midi as u8 }
    }
}

impl std::fmt::Display for Pitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.scientific())
    }
}

impl Serialize for Pitch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.scientific())
    }
}

impl<'de> Deserialize<'de> for Pitch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pitch::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_natural_notes() {
        assert_eq!(Pitch::parse("C4").unwrap().midi(), 60);
        assert_eq!(Pitch::parse("A4").unwrap().midi(), 69);
        assert_eq!(Pitch::parse("B3").unwrap().midi(), 59);
    }

    #[test]
    fn parse_accidentals_and_flats() {
        let sharp = Pitch::parse("C#4").unwrap();
        let flat = Pitch::parse("Db4").unwrap();
        assert_eq!(sharp, flat);
        assert_eq!(sharp.midi(), 61);
    }

    #[test]
    fn parse_enharmonic_svs_form() {
        let p = Pitch::parse("F#/Gb5").unwrap();
        assert_eq!(p.scientific(), "F#5");
        assert_eq!(p.midi(), 78);
    }

    #[test]
    fn scientific_and_svs_round_trip() {
        for midi in 36..=96u8 {
            let p = Pitch::from_midi(midi).unwrap();
            assert_eq!(Pitch::parse(&p.scientific()).unwrap(), p);
            assert_eq!(Pitch::parse(&p.to_svs()).unwrap(), p);
        }
    }

    #[test]
    fn svs_form_adds_enharmonic_spelling() {
        assert_eq!(Pitch::parse("F#5").unwrap().to_svs(), "F#/Gb5");
        assert_eq!(Pitch::parse("A#3").unwrap().to_svs(), "A#/Bb3");
        assert_eq!(Pitch::parse("C4").unwrap().to_svs(), "C4");
    }

    #[test]
    fn rejects_garbage() {
        assert!(Pitch::parse("rest").is_err());
        assert!(Pitch::parse("H4").is_err());
        assert!(Pitch::parse("C").is_err());
        assert!(Pitch::parse("").is_err());
    }

    #[test]
    fn clamp_shifts_by_octaves_only() {
        let low = Pitch::parse("C2").unwrap();
        let clamped = low.clamp_to_range(48, 84); // C3..C6
        assert_eq!(clamped.scientific(), "C3");
        assert_eq!(clamped.semitone(), low.semitone());

        let high = Pitch::parse("G8").unwrap();
        let clamped = high.clamp_to_range(48, 84);
        assert_eq!(clamped.scientific(), "G5");
    }

    #[test]
    fn serde_uses_scientific_notation() {
        let p = Pitch::parse("D#4").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"D#4\"");
        let back: Pitch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
