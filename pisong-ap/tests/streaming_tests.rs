//! Streaming session tests
//!
//! Sessions run against in-memory channels on a paused clock, so pacing is
//! deterministic and tests finish instantly.

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use pisong_ap::digits::FixedDigits;
use pisong_ap::streaming::{
    run_live_session, run_pi_session, ClientMessage, PiStreamContext, ServerFrame, SessionEnd,
};
use pisong_ap::synthesis::synthesize_digits;
use pisong_ap::synthesis::tone::ToneRenderer;
use pisong_ap::synthesis::wave_frame::{compute_wave, next_phase};
use pisong_common::params::{HarmonyMovement, StreamParameters, SynthesisParams, WaveParams};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

struct Harness {
    to_session: UnboundedSender<ClientMessage>,
    from_session: UnboundedReceiver<ServerFrame>,
    session: JoinHandle<SessionEnd>,
}

impl Harness {
    fn send(&self, json: &str) {
        self.to_session
            .unbounded_send(ClientMessage::Text(json.to_string()))
            .unwrap();
    }

    async fn next(&mut self) -> Option<ServerFrame> {
        self.from_session.next().await
    }

    async fn next_json(&mut self) -> Value {
        match self.next().await {
            Some(ServerFrame::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    /// Everything the session sends until it closes the channel
    async fn drain(&mut self) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next().await {
            frames.push(frame);
        }
        frames
    }
}

fn live(initial: Option<StreamParameters>) -> Harness {
    let (to_session, inbound) = unbounded();
    let (outbound, from_session) = unbounded();
    let session = tokio::spawn(run_live_session(Uuid::new_v4(), inbound, outbound, initial));
    Harness {
        to_session,
        from_session,
        session,
    }
}

fn pi_context(digits: Vec<u8>) -> PiStreamContext {
    PiStreamContext {
        digits: Arc::new(FixedDigits(digits)),
        renderer: ToneRenderer::default(),
        max_digits: 100,
    }
}

/// Start a π session; `queued` messages are already waiting when it starts
fn pi(digits: Vec<u8>, initial: Option<StreamParameters>, queued: &[&str]) -> Harness {
    let (to_session, inbound) = unbounded();
    let (outbound, from_session) = unbounded();
    for json in queued {
        to_session
            .unbounded_send(ClientMessage::Text(json.to_string()))
            .unwrap();
    }
    let session = tokio::spawn(run_pi_session(
        Uuid::new_v4(),
        pi_context(digits),
        inbound,
        outbound,
        initial,
    ));
    Harness {
        to_session,
        from_session,
        session,
    }
}

/// The frame a session should send, through the same JSON text round trip
fn expected_frame(wave: &WaveParams) -> Value {
    let json = serde_json::to_string(&compute_wave(wave)).unwrap();
    serde_json::from_str(&json).unwrap()
}

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn seeded_synthesis(digits: usize) -> SynthesisParams {
    SynthesisParams {
        digits,
        duration: 0.05,
        crossfade: 0.01,
        harmony_movement: HarmonyMovement::Random,
        seed: Some(99),
        ..Default::default()
    }
}

// ============================================================================
// Live sessions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_live_defaults_every_frame() {
    let mut h = live(Some(StreamParameters::default()));

    let mut wave = WaveParams::default();
    let start = Instant::now();
    for _ in 0..4 {
        let frame = h.next_json().await;
        assert_eq!(frame, expected_frame(&wave));
        wave.phase = next_phase(&wave);
    }
    // Three frame periods at 30 fps
    assert!(start.elapsed() >= Duration::from_millis(99));

    drop(h.to_session);
    assert_eq!(h.session.await.unwrap(), SessionEnd::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_live_update_applies_from_next_frame() {
    let mut h = live(Some(StreamParameters::default()));

    let first = h.next_json().await;
    assert_eq!(first, expected_frame(&WaveParams::default()));

    h.send(r#"{"frequency": 220, "amplitude": "0.5"}"#);
    let second = h.next_json().await;

    let expected = WaveParams {
        frequency: 220.0,
        amplitude: 0.5,
        phase: next_phase(&WaveParams::default()),
        ..Default::default()
    };
    assert_eq!(second, expected_frame(&expected));
}

#[tokio::test(start_paused = true)]
async fn test_live_invalid_fields_do_not_block_valid_ones() {
    let mut h = live(Some(StreamParameters::default()));
    h.next_json().await;

    h.send(r#"{"samples": -5, "frame_size": 0.2, "nonsense": true}"#);
    h.send("this is not json");
    let frame = h.next_json().await;
    let points = frame["points"].as_array().unwrap();
    assert_eq!(points.len(), 100);
    assert!((points[1][0].as_f64().unwrap() - 0.002).abs() < 1e-12);
}

#[tokio::test(start_paused = true)]
async fn test_live_waits_for_first_message() {
    let mut h = live(None);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.from_session.try_next().is_err(), "no frames before parameters");

    h.send(r#"{"frequency": 100, "samples": 8}"#);
    let frame = h.next_json().await;
    let expected = WaveParams {
        frequency: 100.0,
        samples: 8,
        ..Default::default()
    };
    assert_eq!(frame, expected_frame(&expected));
}

#[tokio::test(start_paused = true)]
async fn test_live_pause_and_resume() {
    let mut h = live(Some(StreamParameters::default()));
    h.next_json().await;

    h.send(r#"{"generate_wave": false}"#);
    tokio::time::sleep(Duration::from_secs(1)).await;
    // Anything sent before the pause was applied is at most one frame
    let mut stray = 0;
    while let Ok(Some(_)) = h.from_session.try_next() {
        stray += 1;
    }
    assert!(stray <= 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.from_session.try_next().is_err(), "paused stream stays silent");

    h.send(r#"{"generate_wave": true}"#);
    assert!(matches!(h.next().await, Some(ServerFrame::Text(_))));
}

#[tokio::test(start_paused = true)]
async fn test_live_stop_message() {
    let mut h = live(Some(StreamParameters::default()));
    h.next_json().await;

    h.send(r#"{"stop": true}"#);
    let rest = h.drain().await;
    assert_eq!(rest.last(), Some(&ServerFrame::Close));
    assert_eq!(h.session.await.unwrap(), SessionEnd::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_live_client_close() {
    let mut h = live(Some(StreamParameters::default()));
    h.next_json().await;

    h.to_session.unbounded_send(ClientMessage::Close).unwrap();
    let rest = h.drain().await;
    assert!(!rest.contains(&ServerFrame::Close));
    assert_eq!(h.session.await.unwrap(), SessionEnd::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_live_consumer_gone() {
    let h = live(Some(StreamParameters::default()));
    let Harness {
        to_session,
        from_session,
        session,
    } = h;
    drop(from_session);

    assert_eq!(session.await.unwrap(), SessionEnd::Disconnected);
    drop(to_session);
}

// ============================================================================
// π sessions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_pi_chunks_reassemble_batch_waveform() {
    let digits = vec![3, 1, 4, 1, 5, 9];
    let params = StreamParameters {
        chunk_samples: 1000,
        synthesis: seeded_synthesis(6),
        ..Default::default()
    };
    let batch = synthesize_digits(
        &params.synthesis,
        &FixedDigits(digits.clone()),
        &ToneRenderer::default(),
    )
    .unwrap();

    let mut h = pi(digits, Some(params), &[]);

    let start = h.next_json().await;
    assert_eq!(start["event"], "start");
    assert_eq!(start["sample_rate"], 44100);
    assert_eq!(start["total_samples"], batch.len());

    let started = Instant::now();
    let mut samples = Vec::new();
    let mut chunks = 0;
    let complete = loop {
        match h.next().await {
            Some(ServerFrame::Binary(bytes)) => {
                let chunk = floats(&bytes);
                assert!(chunk.len() <= 1000);
                samples.extend(chunk);
                chunks += 1;
            }
            Some(ServerFrame::Text(text)) => break serde_json::from_str::<Value>(&text).unwrap(),
            other => panic!("unexpected frame {:?}", other),
        }
    };

    assert_eq!(samples, batch.samples);
    assert_eq!(complete["event"], "complete");
    assert_eq!(complete["samples_sent"], batch.len());
    assert_eq!(complete["chunks_sent"], chunks);
    // Paced at playback speed
    assert!(started.elapsed() >= Duration::from_secs_f64(batch.duration_secs() * 0.9));

    assert_eq!(h.next().await, Some(ServerFrame::Close));
    assert_eq!(h.session.await.unwrap(), SessionEnd::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_pi_params_from_first_message() {
    let mut h = pi(vec![1, 4], None, &[]);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(h.from_session.try_next().is_err());

    h.send(r#"{"digits": 2, "duration": 0.05, "harmony": false}"#);
    let start = h.next_json().await;
    assert_eq!(start["event"], "start");
    assert!(start["total_samples"].as_u64().unwrap() > 0);
}

#[tokio::test(start_paused = true)]
async fn test_pi_synthesis_update_restarts() {
    let initial = StreamParameters {
        synthesis: seeded_synthesis(6),
        ..Default::default()
    };
    let mut h = pi(vec![3, 1, 4, 1, 5, 9], Some(initial), &[r#"{"digits": 2}"#]);

    let expected = synthesize_digits(
        &seeded_synthesis(2),
        &FixedDigits(vec![3, 1]),
        &ToneRenderer::default(),
    )
    .unwrap();

    let start = h.next_json().await;
    assert_eq!(start["total_samples"], expected.len());

    let frames = h.drain().await;
    let samples: Vec<f32> = frames
        .iter()
        .filter_map(|f| match f {
            ServerFrame::Binary(bytes) => Some(floats(bytes)),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(samples, expected.samples);
}

#[tokio::test(start_paused = true)]
async fn test_pi_chunk_size_update() {
    let initial = StreamParameters {
        chunk_samples: 500,
        synthesis: seeded_synthesis(4),
        ..Default::default()
    };
    let mut h = pi(vec![2, 7, 1, 8], Some(initial), &[]);
    assert_eq!(h.next_json().await["event"], "start");

    match h.next().await {
        Some(ServerFrame::Binary(bytes)) => assert_eq!(bytes.len(), 500 * 4),
        other => panic!("expected chunk, got {:?}", other),
    }

    h.send(r#"{"chunk_samples": 250}"#);
    match h.next().await {
        Some(ServerFrame::Binary(bytes)) => assert_eq!(bytes.len(), 250 * 4),
        other => panic!("expected chunk, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_pi_invalid_root_reports_error() {
    let initial = StreamParameters {
        synthesis: SynthesisParams {
            key_root: "W3".to_string(),
            ..seeded_synthesis(3)
        },
        ..Default::default()
    };
    let mut h = pi(vec![1, 2, 3], Some(initial), &[]);

    let event = h.next_json().await;
    assert_eq!(event["event"], "error");
    assert!(event["message"].as_str().unwrap().contains("W3"));
    assert_eq!(h.next().await, Some(ServerFrame::Close));
    assert!(matches!(h.session.await.unwrap(), SessionEnd::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_pi_oversized_sequence_reports_error() {
    let mut h = pi(vec![1; 100], None, &[r#"{"digits": 100, "duration": 59}"#]);

    let event = h.next_json().await;
    assert_eq!(event["event"], "error");
    assert!(event["message"].as_str().unwrap().contains("sample limit"));
    assert_eq!(h.next().await, Some(ServerFrame::Close));
    assert!(matches!(h.session.await.unwrap(), SessionEnd::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_pi_oversized_note_duration_is_dropped() {
    let mut h = pi(vec![1, 4], None, &[r#"{"digits": 2, "duration": 1e7, "stop": false}"#]);

    // Default note length applies instead
    let start = h.next_json().await;
    assert_eq!(start["event"], "start");
    let total = start["total_samples"].as_u64().unwrap();
    assert!(total > 0 && total <= 2 * 22050, "total {}", total);

    h.send(r#"{"stop": true}"#);
    drop(h.to_session);
    h.session.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_pi_zero_digits_completes_empty() {
    let initial = StreamParameters {
        synthesis: seeded_synthesis(0),
        ..Default::default()
    };
    let mut h = pi(vec![], Some(initial), &[]);

    let start = h.next_json().await;
    assert_eq!(start["total_samples"], 0);
    let complete = h.next_json().await;
    assert_eq!(complete["event"], "complete");
    assert_eq!(complete["samples_sent"], 0);
    assert_eq!(h.session.await.unwrap(), SessionEnd::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_pi_stop_mid_stream() {
    let initial = StreamParameters {
        chunk_samples: 256,
        synthesis: seeded_synthesis(8),
        ..Default::default()
    };
    let mut h = pi(vec![1; 8], Some(initial), &[]);
    assert_eq!(h.next_json().await["event"], "start");
    assert!(matches!(h.next().await, Some(ServerFrame::Binary(_))));

    h.send(r#"{"stop": true}"#);
    let rest = h.drain().await;
    assert_eq!(rest.last(), Some(&ServerFrame::Close));
    assert!(!rest
        .iter()
        .any(|f| matches!(f, ServerFrame::Text(t) if t.contains("complete"))));
    assert_eq!(h.session.await.unwrap(), SessionEnd::Stopped);
}
