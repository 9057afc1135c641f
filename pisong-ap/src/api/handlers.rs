//! HTTP request handlers

use crate::api::server::AppContext;
use crate::error::Error;
use crate::synthesis::chord::render_chord;
use crate::synthesis::encode::{f32_le_bytes, wav_bytes};
use crate::synthesis::wave_frame::{compute_wave, WaveFrame};
use crate::synthesis::{synthesize_on_worker, Waveform};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pisong_common::params::{SynthesisParams, WaveParams};
use pisong_common::scale::{build_scale, harmonized_note};
use pisong_common::{HarmonyType, ScaleType, PITCH_TABLE};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub active_sessions: usize,
    pub sessions_started: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ScaleQuery {
    pub root: String,
    #[serde(default)]
    pub scale_type: ScaleType,
    #[serde(default)]
    pub include_octave: bool,
    /// Note to harmonize against the scale
    pub melody: Option<String>,
    pub harmony_type: Option<HarmonyType>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScaleNote {
    pub note: String,
    /// `None` when the note is off the piano
    pub frequency: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScaleResponse {
    pub root: String,
    pub scale_type: String,
    pub notes: Vec<ScaleNote>,
    pub harmony: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChordRequest {
    pub notes: Vec<String>,
    #[serde(default = "default_chord_duration")]
    pub duration: f32,
    #[serde(default = "default_chord_volume")]
    pub volume: f32,
}

/// Longest chord the endpoint renders, seconds
const MAX_CHORD_SECONDS: f32 = 30.0;

fn default_chord_duration() -> f32 {
    1.0
}

fn default_chord_volume() -> f32 {
    0.5
}

type ApiError = (StatusCode, Json<StatusResponse>);

/// Map a service error to a status code and JSON body
fn error_response(e: Error) -> ApiError {
    let status = if e.is_client_error() {
        warn!("Rejected request: {}", e);
        StatusCode::BAD_REQUEST
    } else {
        error!("Request failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

/// Binary body with sample metadata headers
fn samples_response(bytes: Vec<u8>, content_type: &'static str, waveform: &Waveform) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert("x-sample-rate", HeaderValue::from(waveform.sample_rate));
    headers.insert("x-sample-count", HeaderValue::from(waveform.len()));
    (headers, bytes).into_response()
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "pisong_ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sessions: ctx.state.active_sessions(),
        sessions_started: ctx.state.sessions_started(),
    })
}

// ============================================================================
// Wave Endpoints
// ============================================================================

/// GET /api/v1/wave - One live frame as JSON
pub async fn get_wave(Query(params): Query<WaveParams>) -> Result<Json<WaveFrame>, ApiError> {
    params.validate().map_err(|e| error_response(e.into()))?;
    Ok(Json(compute_wave(&params)))
}

/// GET /api/v1/wave/binary - One live frame as flat f32 `x, y` pairs
pub async fn get_wave_binary(Query(params): Query<WaveParams>) -> Result<Response, ApiError> {
    params.validate().map_err(|e| error_response(e.into()))?;
    let bytes = compute_wave(&params).to_le_bytes();
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}

// ============================================================================
// π Synthesis Endpoints
// ============================================================================

async fn synthesize(ctx: &AppContext, params: SynthesisParams) -> Result<Waveform, ApiError> {
    info!(
        "Synthesis request: {} digits, root {}, harmony {}",
        params.digits, params.key_root, params.harmony
    );
    synthesize_on_worker(
        params,
        ctx.digits.clone(),
        ctx.config.renderer,
        ctx.config.max_digits,
    )
    .await
    .map_err(error_response)
}

/// POST /api/v1/pi/waveform - Normalized f32 LE samples
pub async fn post_pi_waveform(
    State(ctx): State<AppContext>,
    Json(params): Json<SynthesisParams>,
) -> Result<Response, ApiError> {
    let waveform = synthesize(&ctx, params).await?;
    let bytes = f32_le_bytes(&waveform.samples);
    Ok(samples_response(bytes, "application/octet-stream", &waveform))
}

/// POST /api/v1/pi/wav - 16-bit mono WAV
pub async fn post_pi_wav(
    State(ctx): State<AppContext>,
    Json(params): Json<SynthesisParams>,
) -> Result<Response, ApiError> {
    let waveform = synthesize(&ctx, params).await?;
    let bytes = wav_bytes(&waveform.samples, waveform.sample_rate).map_err(error_response)?;
    Ok(samples_response(bytes, "audio/wav", &waveform))
}

// ============================================================================
// Music Helper Endpoints
// ============================================================================

/// GET /api/v1/scale - Scale notes, frequencies and an optional harmony note
pub async fn get_scale(Query(query): Query<ScaleQuery>) -> Result<Json<ScaleResponse>, ApiError> {
    let notes = build_scale(&query.root, query.scale_type, query.include_octave)
        .map_err(|e| error_response(e.into()))?;

    let harmony = query.melody.as_deref().and_then(|melody| {
        harmonized_note(melody, &notes, query.harmony_type.unwrap_or_default()).map(str::to_string)
    });

    Ok(Json(ScaleResponse {
        root: query.root,
        scale_type: query.scale_type.as_str().to_string(),
        notes: notes
            .into_iter()
            .map(|note| ScaleNote {
                frequency: PITCH_TABLE.frequency(&note),
                note,
            })
            .collect(),
        harmony,
    }))
}

/// POST /api/v1/chord - Summed, normalized chord as f32 LE samples
pub async fn post_chord(
    State(ctx): State<AppContext>,
    Json(request): Json<ChordRequest>,
) -> Result<Response, ApiError> {
    if !(request.duration > 0.0 && request.duration <= MAX_CHORD_SECONDS) {
        return Err(error_response(Error::BadRequest(format!(
            "duration must be in (0, {}], got {}",
            MAX_CHORD_SECONDS, request.duration
        ))));
    }

    let waveform = render_chord(
        &request.notes,
        request.duration,
        request.volume,
        ctx.config.renderer.sample_rate,
    )
    .map_err(|e| error_response(e.into()))?;

    info!("Rendered chord {:?} ({} samples)", request.notes, waveform.len());
    let bytes = f32_le_bytes(&waveform.samples);
    Ok(samples_response(bytes, "application/octet-stream", &waveform))
}
