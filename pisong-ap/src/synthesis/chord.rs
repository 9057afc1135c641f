//! One-shot chord rendering

use super::stitcher::normalize;
use super::tone::synthesize;
use super::Waveform;
use pisong_common::{Error, Result, PITCH_TABLE};
use tracing::debug;

/// Sum plain sines for every recognized note and normalize
///
/// Unknown note names are ignored. No envelope is applied.
///
/// # Errors
/// `Error::InvalidInput` if no note is recognized.
pub fn render_chord(notes: &[String], duration: f32, volume: f32, sample_rate: u32) -> Result<Waveform> {
    let frequencies: Vec<f64> = notes
        .iter()
        .filter_map(|note| {
            let frequency = PITCH_TABLE.frequency(note);
            if frequency.is_none() {
                debug!("Ignoring unknown chord note {}", note);
            }
            frequency
        })
        .collect();

    if frequencies.is_empty() {
        return Err(Error::InvalidInput(
            "no valid notes provided or unrecognized note names".to_string(),
        ));
    }

    let mut samples = synthesize(frequencies[0], duration, sample_rate, volume).samples;
    for &frequency in &frequencies[1..] {
        let voice = synthesize(frequency, duration, sample_rate, volume).samples;
        for (s, v) in samples.iter_mut().zip(voice) {
            *s += v;
        }
    }
    normalize(&mut samples);

    Ok(Waveform {
        samples,
        sample_rate,
    })
}
