//! Scale construction and harmony intervals
//!
//! A scale is the root followed by seven diatonic steps (eight note names,
//! ending on the octave), optionally doubled with every note one octave up.

use crate::pitch::{parse_note, NOTE_NAMES};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

const MAJOR_STEPS: [usize; 7] = [2, 2, 1, 2, 2, 2, 1];
const MINOR_STEPS: [usize; 7] = [2, 1, 2, 2, 1, 2, 2];

/// Diatonic scale type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum ScaleType {
    #[default]
    Major,
    Minor,
}

impl ScaleType {
    /// `"major"` selects the major pattern; every other value selects minor
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("major") {
            ScaleType::Major
        } else {
            ScaleType::Minor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleType::Major => "major",
            ScaleType::Minor => "minor",
        }
    }

    fn steps(&self) -> &'static [usize; 7] {
        match self {
            ScaleType::Major => &MAJOR_STEPS,
            ScaleType::Minor => &MINOR_STEPS,
        }
    }
}

impl From<String> for ScaleType {
    fn from(s: String) -> Self {
        ScaleType::parse(&s)
    }
}

impl From<ScaleType> for String {
    fn from(t: ScaleType) -> Self {
        t.as_str().to_string()
    }
}

/// Harmony interval above the melody note, counted in scale steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum HarmonyType {
    #[default]
    Third,
    Fifth,
    Sixth,
}

impl HarmonyType {
    /// Unknown names fall back to a third
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "fifth" => HarmonyType::Fifth,
            "sixth" => HarmonyType::Sixth,
            _ => HarmonyType::Third,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HarmonyType::Third => "third",
            HarmonyType::Fifth => "fifth",
            HarmonyType::Sixth => "sixth",
        }
    }

    /// Scale steps between the melody note and its harmony
    pub fn interval(&self) -> usize {
        match self {
            HarmonyType::Third => 2,
            HarmonyType::Fifth => 4,
            HarmonyType::Sixth => 5,
        }
    }
}

impl From<String> for HarmonyType {
    fn from(s: String) -> Self {
        HarmonyType::parse(&s)
    }
}

impl From<HarmonyType> for String {
    fn from(t: HarmonyType) -> Self {
        t.as_str().to_string()
    }
}

/// Build the note names of a scale
///
/// # Arguments
/// * `root` - Root note with octave, e.g. `"C4"` or `"F#3"`
/// * `scale_type` - Step pattern to walk
/// * `include_octave` - Append every note transposed up one octave
///
/// # Returns
/// 8 note names (root through its octave), or 16 with `include_octave`.
///
/// # Errors
/// `Error::InvalidRoot` when the pitch class or octave cannot be parsed.
pub fn build_scale(root: &str, scale_type: ScaleType, include_octave: bool) -> Result<Vec<String>> {
    let (start_idx, octave) =
        parse_note(root).ok_or_else(|| Error::InvalidRoot(root.to_string()))?;

    // Semitones above C of the root's octave; crossing B -> C bumps the octave
    let mut positions = Vec::with_capacity(8);
    positions.push(start_idx);
    let mut position = start_idx;
    for step in scale_type.steps() {
        position += step;
        positions.push(position);
    }

    let name = |position: usize, shift: i32| {
        format!("{}{}", NOTE_NAMES[position % 12], octave + (position / 12) as i32 + shift)
    };

    let mut scale: Vec<String> = positions.iter().map(|&p| name(p, 0)).collect();
    if include_octave {
        scale.extend(positions.iter().map(|&p| name(p, 1)));
    }

    Ok(scale)
}

/// Transpose a note name up one octave
///
/// `None` for names [`parse_note`] rejects.
pub fn increase_octave(note: &str) -> Option<String> {
    parse_note(note).map(|(pitch_class, octave)| format!("{}{}", NOTE_NAMES[pitch_class], octave + 1))
}

/// Pick the harmony note for a melody note within a scale
///
/// Moves `harmony_type.interval()` steps up the scale, wrapping at the end.
/// A melody note outside the scale harmonizes to the scale root.
pub fn harmonized_note<'a>(melody: &str, scale: &'a [String], harmony_type: HarmonyType) -> Option<&'a str> {
    let first = scale.first()?;
    match scale.iter().position(|n| n == melody) {
        Some(idx) => {
            let harmony_idx = (idx + harmony_type.interval()) % scale.len();
            Some(scale[harmony_idx].as_str())
        }
        None => {
            warn!("{} not in scale, harmonizing to root {}", melody, first);
            Some(first.as_str())
        }
    }
}
