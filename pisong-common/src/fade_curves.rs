//! Fade curve implementations for envelopes and crossfading
//!
//! Provides the crossfade curve family used when stitching note segments
//! together, plus the Hann-window halves used for note attack and decay.
//!
//! Positional curves take a normalized position (0.0 at the start of the
//! fade, 1.0 at the end). The `*_table` helpers sample a curve into a
//! per-sample gain table.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Fade curve types for crossfading
///
/// - Linear: Constant rate of change
/// - SineSquared: `sin²(t × π/2)`, smooth at both ends; fade-in and fade-out
///   always sum to 1.0
/// - EqualPower: `sin(t × π/2)`, constant perceived loudness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Linear: v(t) = t
    Linear,

    /// Sine-squared: v(t) = sin²(t × π/2)
    #[default]
    SineSquared,

    /// Equal-Power: v(t) = sin(t × π/2)
    EqualPower,
}

impl FadeCurve {
    /// Calculate fade-in multiplier at given position
    ///
    /// # Arguments
    /// * `position` - Normalized position through fade (0.0 to 1.0)
    ///
    /// # Returns
    /// Volume multiplier to apply to sample (0.0 = silence, 1.0 = full volume)
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::SineSquared => {
                let s = (t * FRAC_PI_2).sin();
                s * s
            }
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Calculate fade-out multiplier at given position
    ///
    /// # Returns
    /// Volume multiplier to apply to sample (1.0 = full volume, 0.0 = silence)
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            // Complement of the fade-in so the pair always sums to unity
            FadeCurve::SineSquared => 1.0 - self.calculate_fade_in(t),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Sample the fade-in curve at `n` evenly spaced positions including both
    /// endpoints (`linspace(0, 1, n)`)
    ///
    /// A single-sample table is `[0.0]`.
    pub fn fade_in_table(&self, n: usize) -> Vec<f32> {
        linspace_positions(n)
            .map(|t| self.calculate_fade_in(t))
            .collect()
    }

    /// Sample the fade-out curve at the same positions as [`Self::fade_in_table`]
    pub fn fade_out_table(&self, n: usize) -> Vec<f32> {
        linspace_positions(n)
            .map(|t| self.calculate_fade_out(t))
            .collect()
    }

    /// Parse curve from string
    ///
    /// Supports:
    /// - 'linear'
    /// - 'sine_squared', 'sinesquared', 'sin2', 'cosine'
    /// - 'equal_power', 'equalpower'
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(FadeCurve::Linear),
            "sine_squared" | "sinesquared" | "sin2" | "cosine" => Some(FadeCurve::SineSquared),
            "equal_power" | "equalpower" => Some(FadeCurve::EqualPower),
            _ => None,
        }
    }

    /// Canonical lowercase name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::SineSquared => "sine_squared",
            FadeCurve::EqualPower => "equal_power",
        }
    }
}

fn linspace_positions(n: usize) -> impl Iterator<Item = f32> {
    let denom = n.saturating_sub(1).max(1) as f32;
    (0..n).map(move |k| k as f32 / denom)
}

/// Rising half of a Hann window of length `2n`
///
/// `w[k] = 0.5 - 0.5 × cos(2πk / (2n - 1))` for `k` in `0..n`.
/// Starts at 0.0 and approaches (but does not reach) 1.0.
pub fn hann_rise(n: usize) -> Vec<f32> {
    (0..n).map(|k| hann_value(k, 2 * n)).collect()
}

/// Falling half of a Hann window of length `2n`
///
/// Mirror of [`hann_rise`]; ends at 0.0.
pub fn hann_fall(n: usize) -> Vec<f32> {
    (n..2 * n).map(|k| hann_value(k, 2 * n)).collect()
}

fn hann_value(k: usize, window_len: usize) -> f32 {
    if window_len <= 1 {
        return 1.0;
    }
    let phase = 2.0 * PI * k as f32 / (window_len - 1) as f32;
    0.5 - 0.5 * phase.cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVES: [FadeCurve; 3] = [FadeCurve::Linear, FadeCurve::SineSquared, FadeCurve::EqualPower];

    #[test]
    fn test_fade_in_bounds() {
        for curve in &CURVES {
            let start_val = curve.calculate_fade_in(0.0);
            let end_val = curve.calculate_fade_in(1.0);
            assert!(
                (start_val - 0.0).abs() < 0.01,
                "{:?} fade-in at 0.0 should be ~0.0, got {}",
                curve,
                start_val
            );
            assert!(
                (end_val - 1.0).abs() < 0.01,
                "{:?} fade-in at 1.0 should be ~1.0, got {}",
                curve,
                end_val
            );
        }
    }

    #[test]
    fn test_fade_out_bounds() {
        for curve in &CURVES {
            let start_val = curve.calculate_fade_out(0.0);
            let end_val = curve.calculate_fade_out(1.0);
            assert!((start_val - 1.0).abs() < 0.01, "{:?} fade-out start {}", curve, start_val);
            assert!((end_val - 0.0).abs() < 0.01, "{:?} fade-out end {}", curve, end_val);
        }
    }

    #[test]
    fn test_sine_squared_pair_sums_to_unity() {
        for i in 0..=20 {
            let t = i as f32 / 20.0;
            let sum = FadeCurve::SineSquared.calculate_fade_in(t)
                + FadeCurve::SineSquared.calculate_fade_out(t);
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_tables_monotonic() {
        for curve in &CURVES {
            let up = curve.fade_in_table(64);
            let down = curve.fade_out_table(64);
            assert_eq!(up.len(), 64);
            assert!(up.windows(2).all(|w| w[0] <= w[1]), "{:?}", curve);
            assert!(down.windows(2).all(|w| w[0] >= w[1]), "{:?}", curve);
            assert_eq!(up[0], 0.0);
            assert!((up[63] - 1.0).abs() < 1e-6);
        }
        assert_eq!(FadeCurve::SineSquared.fade_in_table(1), vec![0.0]);
        assert!(FadeCurve::SineSquared.fade_in_table(0).is_empty());
    }

    #[test]
    fn test_hann_halves() {
        let rise = hann_rise(100);
        let fall = hann_fall(100);
        assert_eq!(rise.len(), 100);
        assert_eq!(fall.len(), 100);
        assert!(rise[0].abs() < 1e-6);
        assert!(fall[99].abs() < 1e-6);
        assert!(rise.iter().chain(fall.iter()).all(|&w| (0.0..=1.0).contains(&w)));
        assert!(rise.windows(2).all(|w| w[0] <= w[1]));
        assert!(fall.windows(2).all(|w| w[0] >= w[1]));
        // Symmetric window
        for k in 0..100 {
            assert!((rise[k] - fall[99 - k]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(FadeCurve::from_str("linear"), Some(FadeCurve::Linear));
        assert_eq!(FadeCurve::from_str("SIN2"), Some(FadeCurve::SineSquared));
        assert_eq!(FadeCurve::from_str("equalpower"), Some(FadeCurve::EqualPower));
        assert_eq!(FadeCurve::from_str("exponential"), None);
        for curve in &CURVES {
            assert_eq!(FadeCurve::from_str(curve.as_str()), Some(*curve));
        }
    }

    #[test]
    fn test_default() {
        assert_eq!(FadeCurve::default(), FadeCurve::SineSquared);
    }
}
