//! Sine tone rendering
//!
//! Each note is rendered as a plain sine, shaped with Hann-window attack and
//! decay ramps, then trimmed to its outermost zero crossings so segment
//! boundaries sit near zero amplitude.

use pisong_common::fade_curves::{hann_fall, hann_rise};
use std::f64::consts::TAU;
use tracing::warn;

/// Minimum share of the original length that phase alignment may keep.
///
/// Below this the segment is left untrimmed. Empirical; tune freely.
pub const PHASE_ALIGN_MIN_FRACTION: f64 = 0.1;

/// A rendered note: samples at a fixed rate, tagged with what produced them
#[derive(Debug, Clone, PartialEq)]
pub struct ToneSegment {
    pub samples: Vec<f32>,
    pub frequency: f64,
    pub duration: f32,
    pub sample_rate: u32,
}

impl ToneSegment {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Peak absolute amplitude
    pub fn peak(&self) -> f32 {
        peak(&self.samples)
    }
}

/// Peak absolute amplitude of a sample slice (0.0 when empty)
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

/// Number of samples a duration occupies
pub fn sample_count(duration: f32, sample_rate: u32) -> usize {
    if !(duration.is_finite() && duration > 0.0) {
        return 0;
    }
    (sample_rate as f64 * duration as f64).round() as usize
}

/// Render `amplitude × sin(2π f t)` over `[0, duration)`
///
/// Produces `round(sample_rate × duration)` samples with `t` spaced evenly
/// across the duration. A non-positive duration yields an empty segment; a
/// non-positive frequency yields silence of the full length.
pub fn synthesize(frequency: f64, duration: f32, sample_rate: u32, amplitude: f32) -> ToneSegment {
    let n = sample_count(duration, sample_rate);
    let samples = if frequency > 0.0 && frequency.is_finite() {
        let step = duration as f64 / n.max(1) as f64;
        (0..n)
            .map(|i| {
                let t = i as f64 * step;
                amplitude * (TAU * frequency * t).sin() as f32
            })
            .collect()
    } else {
        vec![0.0; n]
    };

    ToneSegment {
        samples,
        frequency,
        duration,
        sample_rate,
    }
}

/// Shape the first and last samples with Hann-window halves
///
/// Attack covers `min(round(attack × sample_rate), len / 2)` samples and
/// decay covers `min(round(decay × sample_rate), len / 2)`, so the two ramps
/// never overlap. Gains are within `[0, 1]`; the peak can only shrink.
pub fn apply_envelope(samples: &mut [f32], attack: f32, decay: f32, sample_rate: u32) {
    let len = samples.len();
    let attack_samples = ramp_len(attack, sample_rate).min(len / 2);
    let decay_samples = ramp_len(decay, sample_rate).min(len / 2);

    if attack_samples > 0 {
        for (s, g) in samples[..attack_samples].iter_mut().zip(hann_rise(attack_samples)) {
            *s *= g;
        }
    }

    if decay_samples > 0 {
        let start = len - decay_samples;
        for (s, g) in samples[start..].iter_mut().zip(hann_fall(decay_samples)) {
            *s *= g;
        }
    }
}

fn ramp_len(seconds: f32, sample_rate: u32) -> usize {
    if !(seconds.is_finite() && seconds > 0.0) {
        return 0;
    }
    (seconds as f64 * sample_rate as f64).round() as usize
}

fn sign(x: f32) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Indices `i` where the sign of `samples[i + 1]` differs from `samples[i]`
pub fn zero_crossings(samples: &[f32]) -> Vec<usize> {
    samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| sign(w[0]) != sign(w[1]))
        .map(|(i, _)| i)
        .collect()
}

/// Trim a segment to its first and last zero crossings
///
/// The trimmed range is `[first, last)`. It is only applied if it keeps more
/// than [`PHASE_ALIGN_MIN_FRACTION`] of the segment; otherwise, and when
/// there are no crossings, the segment comes back unchanged.
pub fn phase_align(samples: Vec<f32>) -> Vec<f32> {
    let crossings = zero_crossings(&samples);
    let (Some(&start), Some(&last)) = (crossings.first(), crossings.last()) else {
        return samples;
    };

    let end = if last > start { last } else { samples.len() - 1 };

    if (end - start) as f64 > PHASE_ALIGN_MIN_FRACTION * samples.len() as f64 {
        samples[start..end].to_vec()
    } else {
        warn!(
            "Phase alignment found too few zero crossings in {} samples, keeping original",
            samples.len()
        );
        samples
    }
}

/// Renders enveloped, phase-aligned tones with fixed shaping settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneRenderer {
    pub sample_rate: u32,
    pub attack: f32,
    pub decay: f32,
    pub amplitude: f32,
}

impl Default for ToneRenderer {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            attack: 0.02,
            decay: 0.02,
            amplitude: 0.5,
        }
    }
}

impl ToneRenderer {
    /// synthesize → envelope → phase-align
    pub fn render(&self, frequency: f64, duration: f32) -> ToneSegment {
        let mut segment = synthesize(frequency, duration, self.sample_rate, self.amplitude);
        apply_envelope(&mut segment.samples, self.attack, self.decay, self.sample_rate);
        segment.samples = phase_align(segment.samples);
        segment
    }
}
