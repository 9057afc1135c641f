//! Live sine session
//!
//! Emits one [`WaveFrame`] as JSON every `1 / frame_rate` seconds, advancing
//! the phase by one frame period each time. Any settings message changes the
//! next frame; `generate_wave: false` pauses emission without closing.

use super::{apply_settings, await_params, deliver, finish, ClientMessage, ServerFrame, SessionEnd};
use crate::synthesis::wave_frame::compute_wave;
use futures::{Sink, Stream, StreamExt};
use pisong_common::params::StreamParameters;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Frame period, guarded against a zero or absurd rate
fn frame_period(frame_rate: f64) -> Duration {
    if frame_rate.is_finite() && frame_rate > 0.0 {
        Duration::from_secs_f64(1.0 / frame_rate)
    } else {
        Duration::from_secs(1)
    }
}

/// Run a live session until the client leaves or stops it
///
/// With `initial = None` the first settings message starts the stream.
pub async fn run_live_session<S, K>(
    session_id: Uuid,
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

    info!(
        "Session {}: live stream at {} Hz, {} fps",
        session_id, params.wave.frequency, params.wave.frame_rate
    );

    let mut next_tick = Instant::now();
    let mut frames_sent: u64 = 0;

    let end = loop {
        tokio::select! {
            biased;

            message = inbound.next() => match message {
                Some(ClientMessage::Text(text)) => {
                    if let Some(update) = apply_settings(session_id, &text, &mut params) {
                        if update.stop {
                            break SessionEnd::Stopped;
                        }
                    }
                }
                Some(ClientMessage::Close) | None => break SessionEnd::Disconnected,
            },

            _ = sleep_until(next_tick) => {
                if params.generate_wave {
                    let frame = compute_wave(&params.wave);
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Session {}: failed to serialize frame: {}", session_id, e);
                            break SessionEnd::Disconnected;
                        }
                    };
                    if !deliver(&mut outbound, ServerFrame::Text(json)).await {
                        break SessionEnd::Disconnected;
                    }
                    params.wave.phase = frame.next_phase;
                    frames_sent += 1;
                }
                next_tick = Instant::now() + frame_period(params.wave.frame_rate);
            }
        }
    };

    debug!("Session {}: {} frames sent", session_id, frames_sent);
    finish(session_id, &mut outbound, end).await
}
