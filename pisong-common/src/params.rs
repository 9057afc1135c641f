//! Synthesis and streaming parameter bundles
//!
//! Three shapes live here:
//! - [`SynthesisParams`]: the batch request for rendering π digits
//! - [`StreamParameters`]: the per-session mutable bundle read by a
//!   streaming loop
//! - [`SettingsUpdate`]: a partial update parsed from a client message and
//!   merged field by field into a [`StreamParameters`]
//!
//! # Error Handling Policy for updates
//!
//! 1. Message is not a JSON object: `Error::InvalidInput`, caller ignores it
//! 2. Field missing or null: keep previous value
//! 3. Field has wrong type or is out of range: log WARN, keep previous value
//! 4. Fields are processed independently (no fail-fast)

use crate::fade_curves::FadeCurve;
use crate::pitch::parse_note;
use crate::scale::{HarmonyType, ScaleType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Largest frame a live stream may request
pub const MAX_FRAME_SAMPLES: u64 = 10_000;

/// Highest live frame rate (frames per second)
pub const MAX_FRAME_RATE: f64 = 240.0;

/// Largest π stream chunk (samples)
pub const MAX_CHUNK_SAMPLES: u64 = 1 << 20;

/// Most harmony voices per melody note
pub const MAX_HARMONY_SPEED: u64 = 64;

/// Longest single melody note, seconds
pub const MAX_NOTE_SECONDS: f64 = 60.0;

/// Most samples one request may render (`digits × duration × sample_rate`)
///
/// 2^26 samples is about 25 minutes at 44.1 kHz, 256 MiB of f32.
pub const MAX_SEQUENCE_SAMPLES: u64 = 1 << 26;

/// Rule choosing which scale degree each harmony voice plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum HarmonyMovement {
    /// Uniformly random scale degree
    #[default]
    Random,
    /// Cursor plus two scale steps per voice
    Intervals,
    /// Cursor plus three scale steps per voice
    Chordal,
}

impl HarmonyMovement {
    /// Unknown names select chordal movement
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "random" => HarmonyMovement::Random,
            "intervals" => HarmonyMovement::Intervals,
            _ => HarmonyMovement::Chordal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HarmonyMovement::Random => "random",
            HarmonyMovement::Intervals => "intervals",
            HarmonyMovement::Chordal => "chordal",
        }
    }
}

impl From<String> for HarmonyMovement {
    fn from(s: String) -> Self {
        HarmonyMovement::parse(&s)
    }
}

impl From<HarmonyMovement> for String {
    fn from(m: HarmonyMovement) -> Self {
        m.as_str().to_string()
    }
}

/// Batch request for rendering the digits of π
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisParams {
    /// Number of digits after the decimal point
    pub digits: usize,
    /// Seconds per melody note
    pub duration: f32,
    /// Seconds of overlap between consecutive notes
    pub crossfade: f32,
    /// Root of the harmony scale
    pub key_root: String,
    pub harmony_type: HarmonyType,
    /// Harmony voices per melody note
    pub harmony_speed: usize,
    /// Add each harmony voice one octave up
    pub octave_doubling: bool,
    pub harmony_movement: HarmonyMovement,
    /// Render harmony voices at all
    pub harmony: bool,
    pub scale_type: ScaleType,
    pub crossfade_curve: FadeCurve,
    /// Seed for the random movement policy
    pub seed: Option<u64>,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            digits: 100,
            duration: 0.5,
            crossfade: 0.05,
            key_root: "C4".to_string(),
            harmony_type: HarmonyType::Third,
            harmony_speed: 2,
            octave_doubling: false,
            harmony_movement: HarmonyMovement::Random,
            harmony: true,
            scale_type: ScaleType::Major,
            crossfade_curve: FadeCurve::SineSquared,
            seed: None,
        }
    }
}

impl SynthesisParams {
    /// Check ranges before rendering
    ///
    /// # Errors
    /// - `Error::InvalidRoot` for an unparsable `key_root`
    /// - `Error::InvalidInput` for any other out-of-range field, including a
    ///   sequence longer than [`MAX_SEQUENCE_SAMPLES`] at `sample_rate`
    pub fn validate(&self, max_digits: usize, sample_rate: u32) -> Result<()> {
        if self.digits > max_digits {
            return Err(Error::InvalidInput(format!(
                "digits must be at most {}, got {}",
                max_digits, self.digits
            )));
        }
        let duration = self.duration as f64;
        if !(duration.is_finite() && duration > 0.0 && duration <= MAX_NOTE_SECONDS) {
            return Err(Error::InvalidInput(format!(
                "duration must be in (0, {}], got {}",
                MAX_NOTE_SECONDS, self.duration
            )));
        }
        let total = self.digits as f64 * duration * sample_rate as f64;
        if total > MAX_SEQUENCE_SAMPLES as f64 {
            return Err(Error::InvalidInput(format!(
                "{} digits of {}s at {} Hz exceed the {} sample limit",
                self.digits, self.duration, sample_rate, MAX_SEQUENCE_SAMPLES
            )));
        }
        if !(self.crossfade.is_finite() && self.crossfade >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "crossfade must be non-negative, got {}",
                self.crossfade
            )));
        }
        if self.harmony_speed == 0 || self.harmony_speed as u64 > MAX_HARMONY_SPEED {
            return Err(Error::InvalidInput(format!(
                "harmony_speed must be in 1..={}, got {}",
                MAX_HARMONY_SPEED, self.harmony_speed
            )));
        }
        if parse_note(&self.key_root).is_none() {
            return Err(Error::InvalidRoot(self.key_root.clone()));
        }
        Ok(())
    }
}

/// Parameters of one live sine frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    pub frequency: f64,
    pub amplitude: f64,
    /// Start time of the frame window, seconds
    pub phase: f64,
    /// Points per frame
    pub samples: usize,
    /// Seconds covered by one frame
    pub frame_size: f64,
    /// Frames per second; the phase advances by `1 / frame_rate` per frame
    pub frame_rate: f64,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            amplitude: 1.0,
            phase: 0.0,
            samples: 100,
            frame_size: 0.1,
            frame_rate: 30.0,
        }
    }
}

impl WaveParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.frequency.is_finite() && self.frequency >= 0.0) {
            return Err(Error::InvalidInput(format!("invalid frequency {}", self.frequency)));
        }
        if !self.amplitude.is_finite() || !self.phase.is_finite() {
            return Err(Error::InvalidInput("amplitude and phase must be finite".to_string()));
        }
        if self.samples == 0 || self.samples as u64 > MAX_FRAME_SAMPLES {
            return Err(Error::InvalidInput(format!(
                "samples must be in 1..={}, got {}",
                MAX_FRAME_SAMPLES, self.samples
            )));
        }
        if !(self.frame_size.is_finite() && self.frame_size > 0.0) {
            return Err(Error::InvalidInput(format!("invalid frame_size {}", self.frame_size)));
        }
        if !(self.frame_rate > 0.0 && self.frame_rate <= MAX_FRAME_RATE) {
            return Err(Error::InvalidInput(format!("invalid frame_rate {}", self.frame_rate)));
        }
        Ok(())
    }
}

/// Mutable parameter bundle owned by one streaming session
///
/// Updated in place by [`SettingsUpdate::apply`]; last write wins per
/// field, and no snapshot across fields is implied.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamParameters {
    pub wave: WaveParams,
    /// Emit live frames; `false` pauses without closing
    pub generate_wave: bool,
    /// Samples per π stream chunk
    pub chunk_samples: usize,
    pub synthesis: SynthesisParams,
}

impl Default for StreamParameters {
    fn default() -> Self {
        Self {
            wave: WaveParams::default(),
            generate_wave: true,
            chunk_samples: 4096,
            synthesis: SynthesisParams::default(),
        }
    }
}

/// Partial parameter update from a client message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    pub generate_wave: Option<bool>,
    pub frequency: Option<f64>,
    pub amplitude: Option<f64>,
    pub phase: Option<f64>,
    pub samples: Option<usize>,
    pub frame_size: Option<f64>,
    pub frame_rate: Option<f64>,
    pub chunk_samples: Option<usize>,

    pub digits: Option<usize>,
    pub duration: Option<f32>,
    pub crossfade: Option<f32>,
    pub key_root: Option<String>,
    pub harmony_type: Option<HarmonyType>,
    pub harmony_speed: Option<usize>,
    pub octave_doubling: Option<bool>,
    pub harmony_movement: Option<HarmonyMovement>,
    pub harmony: Option<bool>,
    pub scale_type: Option<ScaleType>,
    pub crossfade_curve: Option<FadeCurve>,
    pub seed: Option<u64>,

    /// Client asked to end the session
    pub stop: bool,

    /// Keys present in the message but dropped as invalid
    pub rejected: Vec<String>,
}

impl SettingsUpdate {
    /// Parse a client text message
    ///
    /// # Errors
    /// `Error::InvalidInput` if the text is not a JSON object. Invalid
    /// individual fields do not fail the parse; they land in `rejected`.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::InvalidInput(format!("settings message is not JSON: {}", e)))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidInput("settings message must be a JSON object".to_string()))?;

        let mut rejected = Vec::new();
        let r = &mut rejected;

        let update = SettingsUpdate {
            generate_wave: flag(obj, &["generate_wave"], r),
            frequency: number(obj, &["frequency"], |v| v >= 0.0, r),
            amplitude: number(obj, &["amplitude"], |_| true, r),
            phase: number(obj, &["phase"], |_| true, r),
            samples: count(obj, &["samples", "sample_count"], 1, MAX_FRAME_SAMPLES, r),
            frame_size: number(obj, &["frame_size"], |v| v > 0.0, r),
            frame_rate: number(obj, &["frame_rate"], |v| v > 0.0 && v <= MAX_FRAME_RATE, r),
            chunk_samples: count(obj, &["chunk_samples"], 1, MAX_CHUNK_SAMPLES, r),

            digits: count(obj, &["digits"], 0, u32::MAX as u64, r),
            duration: number(obj, &["duration"], |v| v > 0.0 && v <= MAX_NOTE_SECONDS, r).map(|v| v as f32),
            crossfade: number(obj, &["crossfade"], |v| v >= 0.0, r).map(|v| v as f32),
            key_root: text(obj, &["key_root"], r),
            harmony_type: text(obj, &["harmony_type"], r).map(|s| HarmonyType::parse(&s)),
            harmony_speed: count(obj, &["harmony_speed"], 1, MAX_HARMONY_SPEED, r),
            octave_doubling: flag(obj, &["octave_doubling"], r),
            harmony_movement: text(obj, &["harmony_movement"], r).map(|s| HarmonyMovement::parse(&s)),
            harmony: flag(obj, &["harmony"], r),
            scale_type: text(obj, &["scale_type"], r).map(|s| ScaleType::parse(&s)),
            crossfade_curve: curve(obj, &["crossfade_curve"], r),
            seed: count(obj, &["seed"], 0, u64::MAX, r).map(|v| v as u64),

            stop: flag(obj, &["stop"], r).unwrap_or(false),
            rejected: Vec::new(),
        };

        Ok(SettingsUpdate { rejected, ..update })
    }

    /// True if any field of the batch synthesis request is set
    pub fn touches_synthesis(&self) -> bool {
        self.digits.is_some()
            || self.duration.is_some()
            || self.crossfade.is_some()
            || self.key_root.is_some()
            || self.harmony_type.is_some()
            || self.harmony_speed.is_some()
            || self.octave_doubling.is_some()
            || self.harmony_movement.is_some()
            || self.harmony.is_some()
            || self.scale_type.is_some()
            || self.crossfade_curve.is_some()
            || self.seed.is_some()
    }

    /// Merge into a session bundle, field by field
    pub fn apply(&self, params: &mut StreamParameters) {
        if let Some(v) = self.generate_wave {
            params.generate_wave = v;
        }
        if let Some(v) = self.chunk_samples {
            params.chunk_samples = v;
        }
        self.apply_to_wave(&mut params.wave);
        self.apply_to_synthesis(&mut params.synthesis);
    }

    pub fn apply_to_wave(&self, wave: &mut WaveParams) {
        if let Some(v) = self.frequency {
            wave.frequency = v;
        }
        if let Some(v) = self.amplitude {
            wave.amplitude = v;
        }
        if let Some(v) = self.phase {
            wave.phase = v;
        }
        if let Some(v) = self.samples {
            wave.samples = v;
        }
        if let Some(v) = self.frame_size {
            wave.frame_size = v;
        }
        if let Some(v) = self.frame_rate {
            wave.frame_rate = v;
        }
    }

    pub fn apply_to_synthesis(&self, synthesis: &mut SynthesisParams) {
        if let Some(v) = self.digits {
            synthesis.digits = v;
        }
        if let Some(v) = self.duration {
            synthesis.duration = v;
        }
        if let Some(v) = self.crossfade {
            synthesis.crossfade = v;
        }
        if let Some(v) = &self.key_root {
            synthesis.key_root = v.clone();
        }
        if let Some(v) = self.harmony_type {
            synthesis.harmony_type = v;
        }
        if let Some(v) = self.harmony_speed {
            synthesis.harmony_speed = v;
        }
        if let Some(v) = self.octave_doubling {
            synthesis.octave_doubling = v;
        }
        if let Some(v) = self.harmony_movement {
            synthesis.harmony_movement = v;
        }
        if let Some(v) = self.harmony {
            synthesis.harmony = v;
        }
        if let Some(v) = self.scale_type {
            synthesis.scale_type = v;
        }
        if let Some(v) = self.crossfade_curve {
            synthesis.crossfade_curve = v;
        }
        if let Some(v) = self.seed {
            synthesis.seed = Some(v);
        }
    }
}

/// First present, non-null key among the aliases
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&'a str]) -> Option<(&'a str, &'a Value)> {
    keys.iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
}

fn reject(key: &str, value: &Value, rejected: &mut Vec<String>) {
    warn!("Ignoring invalid setting {}: {}", key, value);
    rejected.push(key.to_string());
}

/// Numbers may arrive as JSON numbers or numeric strings (form inputs)
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number(
    obj: &Map<String, Value>,
    keys: &[&str],
    valid: impl Fn(f64) -> bool,
    rejected: &mut Vec<String>,
) -> Option<f64> {
    let (key, value) = field(obj, keys)?;
    match as_f64(value) {
        Some(v) if v.is_finite() && valid(v) => Some(v),
        _ => {
            reject(key, value, rejected);
            None
        }
    }
}

fn count(
    obj: &Map<String, Value>,
    keys: &[&str],
    min: u64,
    max: u64,
    rejected: &mut Vec<String>,
) -> Option<usize> {
    let (key, value) = field(obj, keys)?;
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v >= min && v <= max => usize::try_from(v).ok(),
        _ => {
            reject(key, value, rejected);
            None
        }
    }
}

fn flag(obj: &Map<String, Value>, keys: &[&str], rejected: &mut Vec<String>) -> Option<bool> {
    let (key, value) = field(obj, keys)?;
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) if n.as_u64() == Some(0) => Some(false),
        Value::Number(n) if n.as_u64() == Some(1) => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => {
            reject(key, value, rejected);
            None
        }
    }
}

fn text(obj: &Map<String, Value>, keys: &[&str], rejected: &mut Vec<String>) -> Option<String> {
    let (key, value) = field(obj, keys)?;
    match value.as_str() {
        Some(s) => Some(s.to_string()),
        None => {
            reject(key, value, rejected);
            None
        }
    }
}

fn curve(obj: &Map<String, Value>, keys: &[&str], rejected: &mut Vec<String>) -> Option<FadeCurve> {
    let (key, value) = field(obj, keys)?;
    match value.as_str().and_then(FadeCurve::from_str) {
        Some(c) => Some(c),
        None => {
            reject(key, value, rejected);
            None
        }
    }
}
