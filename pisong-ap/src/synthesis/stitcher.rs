//! Crossfade stitcher
//!
//! Joins composite note segments into one continuous waveform. Each new
//! segment overlaps the tail of the previous one by up to the crossfade
//! length; the overlap is blended with a [`FadeCurve`] pair so the sum of
//! gains stays at unity for the default sine-squared curve.
//!
//! The previous segment is held back (pending) until the next one arrives,
//! because its tail is only final once the blend is known. [`finish`]
//! flushes it and normalizes the result to a peak of 1.0.
//!
//! [`finish`]: SequenceStitcher::finish

use super::tone::peak;
use super::Waveform;
use pisong_common::FadeCurve;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct SequenceStitcher {
    sample_rate: u32,
    crossfade_samples: usize,
    curve: FadeCurve,
    pending: Option<Vec<f32>>,
    output: Vec<f32>,
    overlap_total: usize,
}

impl SequenceStitcher {
    /// # Arguments
    /// * `crossfade` - Maximum overlap in seconds; 0 butts segments together
    pub fn new(sample_rate: u32, crossfade: f32, curve: FadeCurve) -> Self {
        let crossfade_samples = if crossfade.is_finite() && crossfade > 0.0 {
            (sample_rate as f64 * crossfade as f64).round() as usize
        } else {
            0
        };

        Self {
            sample_rate,
            crossfade_samples,
            curve,
            pending: None,
            output: Vec::new(),
            overlap_total: 0,
        }
    }

    pub fn crossfade_samples(&self) -> usize {
        self.crossfade_samples
    }

    /// Samples removed by blending so far
    pub fn overlap_total(&self) -> usize {
        self.overlap_total
    }

    /// Add the next composite segment
    pub fn push(&mut self, mut segment: Vec<f32>) {
        let Some(mut prev) = self.pending.take() else {
            self.pending = Some(segment);
            return;
        };

        let n = prev.len().min(segment.len()).min(self.crossfade_samples);
        if n > 0 {
            let fade_out = self.curve.fade_out_table(n);
            let fade_in = self.curve.fade_in_table(n);
            let tail_start = prev.len() - n;

            for k in 0..n {
                prev[tail_start + k] = prev[tail_start + k] * fade_out[k] + segment[k] * fade_in[k];
            }
            segment.drain(..n);
            self.overlap_total += n;
            trace!("Blended {} samples", n);
        }

        self.output.extend_from_slice(&prev);
        self.pending = Some(segment);
    }

    /// Flush the pending segment and normalize
    ///
    /// A silent result stays silent; an empty sequence yields an empty
    /// waveform.
    pub fn finish(mut self) -> Waveform {
        if let Some(prev) = self.pending.take() {
            self.output.extend_from_slice(&prev);
        }
        normalize(&mut self.output);

        Waveform {
            samples: self.output,
            sample_rate: self.sample_rate,
        }
    }
}

/// Scale samples so the peak absolute value is 1.0
///
/// All-zero input is left unchanged.
pub fn normalize(samples: &mut [f32]) {
    let mut max = peak(samples);
    if max == 0.0 {
        max = 1.0;
    }
    for s in samples.iter_mut() {
        *s /= max;
    }
}
