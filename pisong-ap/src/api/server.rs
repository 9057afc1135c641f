//! HTTP server setup and routing
//!
//! Sets up the Axum router for the REST endpoints and the two WebSocket
//! streams, with CORS for the configured browser origins and request
//! tracing.

use crate::config::Config;
use crate::digits::DigitSource;
use crate::error::{Error, Result};
use crate::state::SharedState;
use crate::streaming::PiStreamContext;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub config: Arc<Config>,
    pub digits: Arc<dyn DigitSource>,
}

impl AppContext {
    pub fn new(config: Config, digits: Arc<dyn DigitSource>) -> Self {
        Self {
            state: Arc::new(SharedState::new()),
            config: Arc::new(config),
            digits,
        }
    }

    /// What a π stream session needs from this context
    pub fn pi_stream_context(&self) -> PiStreamContext {
        PiStreamContext {
            digits: Arc::clone(&self.digits),
            renderer: self.config.renderer,
            max_digits: self.config.max_digits,
        }
    }
}

/// CORS for the configured origins; credentials allowed, so methods and
/// headers mirror the request instead of using a wildcard
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the application router
pub fn create_router(ctx: AppContext) -> Router {
    let cors = cors_layer(&ctx.config.allowed_origins);

    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Live sine frames
        .route("/api/v1/wave", get(super::handlers::get_wave))
        .route("/api/v1/wave/binary", get(super::handlers::get_wave_binary))

        // π synthesis
        .route("/api/v1/pi/waveform", post(super::handlers::post_pi_waveform))
        .route("/api/v1/pi/wav", post(super::handlers::post_pi_wav))

        // Music helpers
        .route("/api/v1/scale", get(super::handlers::get_scale))
        .route("/api/v1/chord", post(super::handlers::post_chord))

        // Streaming
        .route("/api/v1/ws/wave", get(super::ws::wave_socket))
        .route("/api/v1/ws/pi", get(super::ws::pi_socket))

        // Attach application context
        .with_state(ctx)

        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = ctx.config.bind_addr();
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
