//! Paced delivery sessions over a duplex channel
//!
//! A session is one task that owns its [`StreamParameters`] and interleaves
//! two things with `tokio::select!`: receiving settings messages from the
//! client and emitting the next paced chunk. Inbound messages are polled
//! first, so an update that arrives before a tick is visible in that tick.
//!
//! Sessions are written against `futures` [`Stream`]/[`Sink`] rather than a
//! concrete socket; the WebSocket handlers adapt axum messages to
//! [`ClientMessage`] and [`ServerFrame`], and tests drive sessions through
//! in-memory channels.
//!
//! **States:** `AwaitingParams` ([`await_params`], skipped when the
//! parameters arrive with the upgrade request) → `Streaming` (the session's
//! `select!` loop) → `Closed` ([`finish`], which reports a [`SessionEnd`]).

pub mod live;
pub mod pi;

use futures::{Sink, SinkExt, Stream, StreamExt};
use pisong_common::params::{SettingsUpdate, StreamParameters};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

pub use live::run_live_session;
pub use pi::{run_pi_session, PiStreamContext};

/// Inbound message from the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// JSON settings object
    Text(String),
    /// Client closed the channel
    Close,
}

/// Outbound frame to the client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

/// Control events sent as JSON text on the π stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Start {
        session_id: Uuid,
        sample_rate: u32,
        total_samples: usize,
        chunk_samples: usize,
    },
    Complete {
        session_id: Uuid,
        samples_sent: usize,
        chunks_sent: usize,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn to_frame(&self) -> ServerFrame {
        match serde_json::to_string(self) {
            Ok(json) => ServerFrame::Text(json),
            Err(e) => {
                warn!("Failed to serialize stream event: {}", e);
                ServerFrame::Text(String::from("{\"event\":\"error\"}"))
            }
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client went away or the channel failed
    Disconnected,
    /// Client sent `{"stop": true}`
    Stopped,
    /// π waveform fully delivered
    Completed,
    /// Synthesis failed; the client was sent an error event
    Failed(String),
}

/// Parse a settings message and merge it into `params`
///
/// Malformed messages are logged and ignored (`None`). The parsed update is
/// returned so the caller can react to `stop` and synthesis changes.
pub fn apply_settings(
    session_id: Uuid,
    text: &str,
    params: &mut StreamParameters,
) -> Option<SettingsUpdate> {
    match SettingsUpdate::parse(text) {
        Ok(update) => {
            update.apply(params);
            debug!(
                "Session {}: applied settings ({} rejected)",
                session_id,
                update.rejected.len()
            );
            Some(update)
        }
        Err(e) => {
            warn!("Session {}: ignoring settings message: {}", session_id, e);
            None
        }
    }
}

/// Wait for the first usable settings message
///
/// Fields are merged onto defaults. Returns `Err` with the end reason if the
/// client leaves or stops first.
async fn await_params<S>(
    session_id: Uuid,
    inbound: &mut S,
) -> std::result::Result<(StreamParameters, SettingsUpdate), SessionEnd>
where
    S: Stream<Item = ClientMessage> + Unpin,
{
    debug!("Session {}: awaiting parameters", session_id);
    loop {
        match inbound.next().await {
            Some(ClientMessage::Text(text)) => {
                let mut params = StreamParameters::default();
                if let Some(update) = apply_settings(session_id, &text, &mut params) {
                    if update.stop {
                        return Err(SessionEnd::Stopped);
                    }
                    return Ok((params, update));
                }
            }
            Some(ClientMessage::Close) | None => return Err(SessionEnd::Disconnected),
        }
    }
}

/// Send one frame; `false` once the channel is gone
async fn deliver<K>(outbound: &mut K, frame: ServerFrame) -> bool
where
    K: Sink<ServerFrame> + Unpin,
{
    outbound.send(frame).await.is_ok()
}

/// Close the outbound side, sending a close frame first unless the client
/// already left
async fn finish<K>(session_id: Uuid, outbound: &mut K, end: SessionEnd) -> SessionEnd
where
    K: Sink<ServerFrame> + Unpin,
{
    if end != SessionEnd::Disconnected {
        let _ = outbound.send(ServerFrame::Close).await;
    }
    let _ = outbound.close().await;
    debug!("Session {}: closed ({:?})", session_id, end);
    end
}
