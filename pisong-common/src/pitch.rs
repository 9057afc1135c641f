//! Equal-tempered pitch table
//!
//! Maps the 88 piano key names (`A0` through `C8`) to their frequencies,
//! tuned to A4 = 440 Hz and rounded to two decimal places.
//!
//! **Architecture:** built once on first access through the [`PITCH_TABLE`]
//! singleton and read-only afterwards.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Chromatic note names, sharps only, starting at C
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI number of the lowest piano key (A0)
pub const LOWEST_KEY_MIDI: u8 = 21;

/// Number of keys on a standard piano
pub const PIANO_KEY_COUNT: usize = 88;

/// Process-wide pitch table
pub static PITCH_TABLE: Lazy<PitchTable> = Lazy::new(PitchTable::build);

/// Immutable note-name to frequency mapping
#[derive(Debug, Clone)]
pub struct PitchTable {
    /// Keys in ascending pitch order
    keys: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl PitchTable {
    /// Build the 88-key table
    pub fn build() -> Self {
        let mut keys = Vec::with_capacity(PIANO_KEY_COUNT);
        let mut index = HashMap::with_capacity(PIANO_KEY_COUNT);

        for i in 0..PIANO_KEY_COUNT {
            let midi = LOWEST_KEY_MIDI as i32 + i as i32;
            let name = note_name(midi);
            index.insert(name.clone(), keys.len());
            keys.push((name, midi_to_frequency(midi)));
        }

        Self { keys, index }
    }

    /// Frequency in Hz for a note name, if it is a piano key
    pub fn frequency(&self, note: &str) -> Option<f64> {
        self.index.get(note).map(|&i| self.keys[i].1)
    }

    pub fn contains(&self, note: &str) -> bool {
        self.index.contains_key(note)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate keys in ascending pitch order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.keys.iter().map(|(name, freq)| (name.as_str(), *freq))
    }
}

/// Equal-tempered frequency of a MIDI note, rounded to 0.01 Hz
fn midi_to_frequency(midi: i32) -> f64 {
    let frequency = 440.0 * 2f64.powf((midi - 69) as f64 / 12.0);
    (frequency * 100.0).round() / 100.0
}

/// Highest octave a note name may carry
///
/// Scales built from such a root reach two octaves further; keeping the
/// bound small keeps octave arithmetic far from overflow.
pub const MAX_OCTAVE: i32 = 10;

/// Scientific pitch name of a MIDI note (MIDI 60 = `C4`)
pub fn note_name(midi: i32) -> String {
    let pitch_class = midi.rem_euclid(12) as usize;
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[pitch_class], octave)
}

/// Split a note name into its chromatic index and octave
///
/// The octave is the trailing run of digits, so `C#4` gives `(1, 4)`.
/// Returns `None` for an unknown pitch class, a missing octave, or an octave
/// above [`MAX_OCTAVE`].
pub fn parse_note(note: &str) -> Option<(usize, i32)> {
    let split = note.find(|c: char| c.is_ascii_digit())?;
    let (name, octave) = note.split_at(split);
    let pitch_class = NOTE_NAMES.iter().position(|n| *n == name)?;
    let octave = octave.parse::<i32>().ok().filter(|o| (0..=MAX_OCTAVE).contains(o))?;
    Some((pitch_class, octave))
}

/// MIDI number for a note name
pub fn midi_number(note: &str) -> Option<i32> {
    parse_note(note).map(|(pitch_class, octave)| (octave + 1) * 12 + pitch_class as i32)
}
