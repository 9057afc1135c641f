//! Live sine frames for the scrolling waveform display

use pisong_common::params::WaveParams;
use serde::Serialize;
use std::f64::consts::TAU;

/// One frame of `(x, y)` points plus the phase for the next frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveFrame {
    pub points: Vec<[f64; 2]>,
    pub next_phase: f64,
}

impl WaveFrame {
    /// Flat little-endian f32 `x, y, x, y, ...`
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.points.len() * 8);
        for [x, y] in &self.points {
            bytes.extend_from_slice(&(*x as f32).to_le_bytes());
            bytes.extend_from_slice(&(*y as f32).to_le_bytes());
        }
        bytes
    }
}

/// Sample `amplitude × sin(2π f (phase + x))` at `samples` points over
/// `[0, frame_size)`
pub fn compute_wave(params: &WaveParams) -> WaveFrame {
    let dt = if params.samples > 0 {
        params.frame_size / params.samples as f64
    } else {
        0.0
    };

    let points = (0..params.samples)
        .map(|i| {
            let x = i as f64 * dt;
            let y = params.amplitude * (TAU * params.frequency * (params.phase + x)).sin();
            [x, y]
        })
        .collect();

    WaveFrame {
        points,
        next_phase: next_phase(params),
    }
}

/// Phase after one frame period
pub fn next_phase(params: &WaveParams) -> f64 {
    if params.frame_rate > 0.0 {
        params.phase + 1.0 / params.frame_rate
    } else {
        params.phase
    }
}
