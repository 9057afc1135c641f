//! π waveform session
//!
//! Synthesizes the requested sequence on the blocking pool, then streams it
//! as binary f32 chunks paced at playback speed, bracketed by `start` and
//! `complete` JSON events.
//!
//! While synthesis runs the session keeps servicing inbound messages. An
//! update that touches synthesis fields discards the current job or
//! waveform and synthesizes again with the merged parameters; other fields
//! (such as `chunk_samples`) apply from the next chunk. A discarded job is
//! cancelled, so its worker stops at the next digit.

use super::{
    apply_settings, await_params, deliver, finish, ClientMessage, ServerFrame, SessionEnd,
    StreamEvent,
};
use crate::digits::DigitSource;
use crate::error::Result;
use crate::synthesis::encode::f32_le_bytes;
use crate::synthesis::spawn_synthesis;
use crate::synthesis::tone::ToneRenderer;
use crate::synthesis::Waveform;
use futures::{Sink, Stream, StreamExt};
use pisong_common::params::{StreamParameters, MAX_CHUNK_SAMPLES};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a π session needs from the service
#[derive(Clone)]
pub struct PiStreamContext {
    pub digits: Arc<dyn DigitSource>,
    pub renderer: ToneRenderer,
    pub max_digits: usize,
}

/// Waveform being streamed and the read position
struct Playback {
    waveform: Waveform,
    position: usize,
    chunks_sent: usize,
}

/// Running synthesis; dropping it cancels the worker
struct SynthesisJob {
    handle: JoinHandle<Result<Waveform>>,
    _cancel: DropGuard,
}

impl SynthesisJob {
    fn start(ctx: &PiStreamContext, params: &StreamParameters) -> (Self, CancellationToken) {
        let cancel = CancellationToken::new();
        let handle = spawn_synthesis(
            params.synthesis.clone(),
            Arc::clone(&ctx.digits),
            ctx.renderer,
            ctx.max_digits,
            cancel.clone(),
        );
        let job = SynthesisJob {
            handle,
            _cancel: cancel.clone().drop_guard(),
        };
        (job, cancel)
    }
}

/// Await the pending job, or never resolve if there is none
async fn join_pending(job: &mut Option<SynthesisJob>) -> Result<Waveform> {
    match job.as_mut() {
        Some(job) => (&mut job.handle).await?,
        None => std::future::pending().await,
    }
}

fn chunk_duration(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(samples as f64 / sample_rate as f64)
}

/// Run a π session until the waveform is delivered, the client leaves or
/// stops it, or synthesis fails
pub async fn run_pi_session<S, K>(
    session_id: Uuid,
    ctx: PiStreamContext,
    mut inbound: S,
    mut outbound: K,
    initial: Option<StreamParameters>,
) -> SessionEnd
where
    S: Stream<Item = ClientMessage> + Unpin,
    K: Sink<ServerFrame> + Unpin,
{
    let mut params = match initial {
        Some(params) => params,
        None => match await_params(session_id, &mut inbound).await {
            Ok((params, _)) => params,
            Err(end) => return finish(session_id, &mut outbound, end).await,
        },
    };

    let start_job = |params: &StreamParameters| {
        info!(
            "Session {}: synthesizing {} digits (root {}, {} movement)",
            session_id,
            params.synthesis.digits,
            params.synthesis.key_root,
            params.synthesis.harmony_movement.as_str()
        );
        SynthesisJob::start(&ctx, params).0
    };

    let mut job: Option<SynthesisJob> = Some(start_job(&params));
    let mut playback: Option<Playback> = None;
    let mut next_tick = Instant::now();

    let end = loop {
        tokio::select! {
            biased;

            message = inbound.next() => match message {
                Some(ClientMessage::Text(text)) => {
                    let Some(update) = apply_settings(session_id, &text, &mut params) else {
                        continue;
                    };
                    if update.stop {
                        break SessionEnd::Stopped;
                    }
                    if update.touches_synthesis() {
                        debug!("Session {}: synthesis settings changed, restarting", session_id);
                        playback = None;
                        job = Some(start_job(&params));
                    }
                }
                Some(ClientMessage::Close) | None => break SessionEnd::Disconnected,
            },

            result = join_pending(&mut job), if job.is_some() => {
                job = None;
                match result {
                    Ok(waveform) => {
                        let start = StreamEvent::Start {
                            session_id,
                            sample_rate: waveform.sample_rate,
                            total_samples: waveform.len(),
                            chunk_samples: params.chunk_samples,
                        };
                        if !deliver(&mut outbound, start.to_frame()).await {
                            break SessionEnd::Disconnected;
                        }
                        playback = Some(Playback {
                            waveform,
                            position: 0,
                            chunks_sent: 0,
                        });
                        next_tick = Instant::now();
                    }
                    Err(e) => {
                        warn!("Session {}: synthesis failed: {}", session_id, e);
                        let event = StreamEvent::Error { message: e.to_string() };
                        let _ = deliver(&mut outbound, event.to_frame()).await;
                        break SessionEnd::Failed(e.to_string());
                    }
                }
            },

            _ = sleep_until(next_tick), if playback.is_some() => {
                let Some(current) = playback.as_mut() else {
                    continue;
                };

                let total = current.waveform.len();
                if current.position >= total {
                    let complete = StreamEvent::Complete {
                        session_id,
                        samples_sent: current.position,
                        chunks_sent: current.chunks_sent,
                    };
                    let _ = deliver(&mut outbound, complete.to_frame()).await;
                    break SessionEnd::Completed;
                }

                let chunk = params.chunk_samples.clamp(1, MAX_CHUNK_SAMPLES as usize);
                let until = (current.position + chunk).min(total);
                let bytes = f32_le_bytes(&current.waveform.samples[current.position..until]);
                if !deliver(&mut outbound, ServerFrame::Binary(bytes)).await {
                    break SessionEnd::Disconnected;
                }

                let sent = until - current.position;
                current.position = until;
                current.chunks_sent += 1;
                next_tick = Instant::now() + chunk_duration(sent, current.waveform.sample_rate);
            }
        }
    };

    finish(session_id, &mut outbound, end).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::digits::FixedDigits;
    use crate::error::Error;
    use pisong_common::params::SynthesisParams;

    fn long_job_context() -> (PiStreamContext, StreamParameters) {
        let ctx = PiStreamContext {
            digits: Arc::new(FixedDigits(vec![5; 2000])),
            renderer: ToneRenderer::default(),
            max_digits: 2000,
        };
        let params = StreamParameters {
            synthesis: SynthesisParams {
                digits: 2000,
                duration: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        (ctx, params)
    }

    #[tokio::test]
    async fn test_dropping_job_cancels_worker() {
        let (ctx, params) = long_job_context();
        let (job, cancel) = SynthesisJob::start(&ctx, &params);
        assert!(!cancel.is_cancelled());

        drop(job);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_superseded_job_stops_early() {
        let (ctx, params) = long_job_context();
        let (job, cancel) = SynthesisJob::start(&ctx, &params);
        let SynthesisJob { handle, _cancel: guard } = job;

        // Replacing the job drops its guard
        drop(guard);
        assert!(cancel.is_cancelled());
        assert!(matches!(handle.await.unwrap(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_chunk_duration() {
        assert_eq!(chunk_duration(44100, 44100), Duration::from_secs(1));
        assert_eq!(chunk_duration(22050, 44100), Duration::from_millis(500));
        assert_eq!(chunk_duration(10, 0), Duration::ZERO);
    }
}
