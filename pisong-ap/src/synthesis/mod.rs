//! Digit sequence synthesis
//!
//! Pipeline: digits → melody notes → enveloped, phase-aligned tones →
//! optional harmony mix → crossfade stitching → normalization.
//!
//! Rendering is CPU-bound and synchronous. Async callers go through
//! [`spawn_synthesis`], which moves the work onto the blocking pool. A
//! blocking task cannot be aborted, so the render loop polls a
//! [`CancellationToken`] once per digit and gives up with
//! `Error::Cancelled`.

pub mod chord;
pub mod encode;
pub mod harmony;
pub mod stitcher;
pub mod tone;
pub mod wave_frame;

use crate::digits::{melody_key, DigitSource};
use crate::error::{Error, Result};
use harmony::HarmonyEngine;
use pisong_common::params::SynthesisParams;
use pisong_common::PITCH_TABLE;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use stitcher::SequenceStitcher;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tone::ToneRenderer;
use tracing::{debug, info, warn};

/// A finished, normalized mono waveform
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn peak(&self) -> f32 {
        tone::peak(&self.samples)
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Render a digit sequence into a waveform
///
/// Digits without a melody key are skipped: they produce no segment and do
/// not advance the harmony cursor.
///
/// # Errors
/// `Error::InvalidRoot` if harmony is enabled and `key_root` is not a note.
pub fn render_digits<R: Rng>(
    digits: &[u8],
    params: &SynthesisParams,
    renderer: &ToneRenderer,
    rng: &mut R,
) -> Result<Waveform> {
    render_digits_cancellable(digits, params, renderer, rng, &CancellationToken::new())
}

/// [`render_digits`], stopping before the next digit once `cancel` fires
///
/// # Errors
/// `Error::Cancelled` if the token was cancelled before the last digit.
pub fn render_digits_cancellable<R: Rng>(
    digits: &[u8],
    params: &SynthesisParams,
    renderer: &ToneRenderer,
    rng: &mut R,
    cancel: &CancellationToken,
) -> Result<Waveform> {
    let mut harmony = if params.harmony {
        Some(HarmonyEngine::from_params(params, *renderer)?)
    } else {
        None
    };

    let mut stitcher =
        SequenceStitcher::new(renderer.sample_rate, params.crossfade, params.crossfade_curve);

    for (position, &digit) in digits.iter().enumerate() {
        if cancel.is_cancelled() {
            debug!("Synthesis cancelled after {} of {} digits", position, digits.len());
            return Err(Error::Cancelled);
        }

        let Some(frequency) = melody_key(digit).and_then(|key| PITCH_TABLE.frequency(key)) else {
            warn!("Digit {} at position {} has no melody note, skipping", digit, position);
            continue;
        };

        let melody = renderer.render(frequency, params.duration).samples;
        let composite = match harmony.as_mut() {
            Some(engine) => engine.harmonize(&melody, params.duration, rng),
            None => melody,
        };
        stitcher.push(composite);
    }

    Ok(stitcher.finish())
}

/// Render the first `params.digits` digits from `source`
///
/// Uses `params.seed` for the random movement policy when given, otherwise
/// fresh entropy.
pub fn synthesize_digits(
    params: &SynthesisParams,
    source: &dyn DigitSource,
    renderer: &ToneRenderer,
) -> Result<Waveform> {
    synthesize_digits_cancellable(params, source, renderer, &CancellationToken::new())
}

/// [`synthesize_digits`] under a cancellation token
pub fn synthesize_digits_cancellable(
    params: &SynthesisParams,
    source: &dyn DigitSource,
    renderer: &ToneRenderer,
    cancel: &CancellationToken,
) -> Result<Waveform> {
    let start = Instant::now();
    let digits = source.digits(params.digits);

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let waveform = render_digits_cancellable(&digits, params, renderer, &mut rng, cancel)?;

    info!(
        "Synthesized {} digits into {} samples ({:.2}s audio) in {}ms",
        digits.len(),
        waveform.len(),
        waveform.duration_secs(),
        start.elapsed().as_millis()
    );
    Ok(waveform)
}

/// Validate and render on the blocking pool
///
/// Validation runs on the worker too, so the handle carries every failure.
/// Dropping the handle does not stop the worker; cancel `cancel` for that.
pub fn spawn_synthesis(
    params: SynthesisParams,
    source: Arc<dyn DigitSource>,
    renderer: ToneRenderer,
    max_digits: usize,
    cancel: CancellationToken,
) -> JoinHandle<Result<Waveform>> {
    debug!(
        "Dispatching synthesis: {} digits, root {}, harmony {}",
        params.digits, params.key_root, params.harmony
    );
    tokio::task::spawn_blocking(move || {
        params.validate(max_digits, renderer.sample_rate)?;
        synthesize_digits_cancellable(&params, source.as_ref(), &renderer, &cancel)
    })
}

/// [`spawn_synthesis`] and wait for the result
///
/// If this future is dropped (the HTTP client went away) the worker is
/// cancelled.
pub async fn synthesize_on_worker(
    params: SynthesisParams,
    source: Arc<dyn DigitSource>,
    renderer: ToneRenderer,
    max_digits: usize,
) -> Result<Waveform> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    spawn_synthesis(params, source, renderer, max_digits, cancel).await?
}
