//! Harmony voices layered over each melody note
//!
//! For every melody note the engine renders `harmony_speed` shorter voices
//! drawn from the key's scale (two octaves), places voice `h` at
//! `h / harmony_speed` of the way through the note, and averages the mix
//! with the melody.
//!
//! **Cursor:** the scale position advances by `harmony_speed` after each
//! melody note and persists for the whole sequence, so the harmony walks
//! through the scale as the melody proceeds.

use super::tone::ToneRenderer;
use pisong_common::params::{HarmonyMovement, SynthesisParams};
use pisong_common::scale::{build_scale, increase_octave};
use pisong_common::{Result, ScaleType, PITCH_TABLE};
use rand::Rng;
use tracing::{debug, trace};

/// Gain applied to each harmony voice
pub const HARMONY_GAIN: f32 = 0.8;

/// Gain applied to the octave-doubled copy of a harmony voice
pub const OCTAVE_GAIN: f32 = 0.6;

/// One scale degree with its resolved frequencies
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleVoice {
    pub note: String,
    /// `None` if the note is off the piano
    pub frequency: Option<f64>,
    /// Frequency one octave up, `None` if off the piano
    pub octave_frequency: Option<f64>,
}

impl ScaleVoice {
    fn resolve(note: String) -> Self {
        let frequency = PITCH_TABLE.frequency(&note);
        let octave_frequency = increase_octave(&note).and_then(|up| PITCH_TABLE.frequency(&up));
        Self {
            note,
            frequency,
            octave_frequency,
        }
    }
}

/// Stateful harmony generator for one sequence
#[derive(Debug, Clone)]
pub struct HarmonyEngine {
    voices: Vec<ScaleVoice>,
    speed: usize,
    movement: HarmonyMovement,
    octave_doubling: bool,
    cursor: usize,
    renderer: ToneRenderer,
}

impl HarmonyEngine {
    /// Build an engine over the two-octave scale of `key_root`
    ///
    /// # Errors
    /// `Error::InvalidRoot` if `key_root` is not a note name.
    pub fn new(
        key_root: &str,
        scale_type: ScaleType,
        speed: usize,
        movement: HarmonyMovement,
        octave_doubling: bool,
        renderer: ToneRenderer,
    ) -> Result<Self> {
        let voices = build_scale(key_root, scale_type, true)?
            .into_iter()
            .map(ScaleVoice::resolve)
            .collect();

        Ok(Self {
            voices,
            speed: speed.max(1),
            movement,
            octave_doubling,
            cursor: 0,
            renderer,
        })
    }

    pub fn from_params(params: &SynthesisParams, renderer: ToneRenderer) -> Result<Self> {
        Self::new(
            &params.key_root,
            params.scale_type,
            params.harmony_speed,
            params.harmony_movement,
            params.octave_doubling,
            renderer,
        )
    }

    /// Current scale position
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn voices(&self) -> &[ScaleVoice] {
        &self.voices
    }

    /// Scale index for voice `h` under the movement policy
    pub fn select_index<R: Rng>(&self, h: usize, rng: &mut R) -> usize {
        let len = self.voices.len();
        match self.movement {
            HarmonyMovement::Random => rng.gen_range(0..len),
            HarmonyMovement::Intervals => (self.cursor + h * 2) % len,
            HarmonyMovement::Chordal => (self.cursor + h * 3) % len,
        }
    }

    /// Render the harmony voices for a melody note of `len` samples
    ///
    /// Does not move the cursor; [`Self::harmonize`] does.
    pub fn render_accumulator<R: Rng>(&self, len: usize, note_duration: f32, rng: &mut R) -> Vec<f32> {
        let mut accumulator = vec![0.0f32; len];
        let voice_duration = note_duration / self.speed as f32;

        for h in 0..self.speed {
            let voice = &self.voices[self.select_index(h, rng)];
            let Some(frequency) = voice.frequency else {
                debug!("Harmony note {} is off the keyboard, skipping", voice.note);
                continue;
            };
            trace!("Harmony voice {}: {}", h + 1, voice.note);

            let mut samples = self.renderer.render(frequency, voice_duration).samples;
            scale(&mut samples, HARMONY_GAIN);

            if self.octave_doubling {
                if let Some(octave_frequency) = voice.octave_frequency {
                    let mut octave = self.renderer.render(octave_frequency, voice_duration).samples;
                    scale(&mut octave, OCTAVE_GAIN);
                    mix_into(&mut accumulator, &octave, 0);
                }
            }

            let offset = h * len / self.speed;
            mix_into(&mut accumulator, &samples, offset);
        }

        accumulator
    }

    /// Mix harmony under a melody note and advance the cursor
    ///
    /// Returns `(melody + harmony) / 2`, the same length as `melody`.
    pub fn harmonize<R: Rng>(&mut self, melody: &[f32], note_duration: f32, rng: &mut R) -> Vec<f32> {
        let accumulator = self.render_accumulator(melody.len(), note_duration, rng);
        self.advance();

        melody
            .iter()
            .zip(accumulator.iter())
            .map(|(m, h)| (m + h) / 2.0)
            .collect()
    }

    fn advance(&mut self) {
        self.cursor = (self.cursor + self.speed % self.voices.len()) % self.voices.len();
    }
}

fn scale(samples: &mut [f32], gain: f32) {
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Add `source` into `target` starting at `offset`, truncated to fit
fn mix_into(target: &mut [f32], source: &[f32], offset: usize) {
    if offset >= target.len() {
        return;
    }
    for (t, s) in target[offset..].iter_mut().zip(source) {
        *t += s;
    }
}
