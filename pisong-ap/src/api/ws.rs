//! WebSocket endpoints
//!
//! Adapts axum WebSocket messages to the transport-neutral
//! [`ClientMessage`]/[`ServerFrame`] pair and runs one session per
//! connection. Query parameters, if any, seed the session; otherwise the
//! first text message does.

use crate::api::server::AppContext;
use crate::streaming::{run_live_session, run_pi_session, ClientMessage, ServerFrame};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use pisong_common::params::{SettingsUpdate, StreamParameters};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Inbound axum message as a session message; pings and binary are dropped
fn client_message(message: Result<Message, axum::Error>) -> Option<ClientMessage> {
    match message {
        Ok(Message::Text(text)) => Some(ClientMessage::Text(text)),
        Ok(Message::Close(_)) => Some(ClientMessage::Close),
        Ok(_) => None,
        Err(e) => {
            debug!("WebSocket receive error: {}", e);
            Some(ClientMessage::Close)
        }
    }
}

fn server_message(frame: ServerFrame) -> Message {
    match frame {
        ServerFrame::Text(text) => Message::Text(text),
        ServerFrame::Binary(bytes) => Message::Binary(bytes),
        ServerFrame::Close => Message::Close(None),
    }
}

/// Split a socket into session-facing halves
fn adapt(
    socket: WebSocket,
) -> (
    impl Stream<Item = ClientMessage> + Unpin,
    impl Sink<ServerFrame, Error = axum::Error> + Unpin,
) {
    let (sink, stream) = socket.split();
    let inbound = stream.filter_map(|message| future::ready(client_message(message)));
    let outbound = sink.with(|frame| future::ready(Ok::<_, axum::Error>(server_message(frame))));
    (inbound, outbound)
}

/// Session parameters from the upgrade request's query string
///
/// `None` for an empty query, so the session waits for a settings message.
fn initial_params(query: &HashMap<String, String>, defaults: StreamParameters) -> Option<StreamParameters> {
    if query.is_empty() {
        return None;
    }
    let object: Map<String, Value> = query
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    let mut params = defaults;
    match SettingsUpdate::from_value(&Value::Object(object)) {
        Ok(update) => update.apply(&mut params),
        Err(e) => debug!("Ignoring query parameters: {}", e),
    }
    Some(params)
}

/// GET /api/v1/ws/wave - Live sine frames
pub async fn wave_socket(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(ctx): State<AppContext>,
) -> Response {
    let initial = initial_params(&query, ctx.config.stream_defaults());

    ws.on_upgrade(move |socket| async move {
        let session_id = Uuid::new_v4();
        let _guard = ctx.state.begin_session();
        info!("Session {}: live wave connected", session_id);

        let (inbound, outbound) = adapt(socket);
        let end = run_live_session(session_id, inbound, outbound, initial).await;
        info!("Session {}: live wave ended ({:?})", session_id, end);
    })
}

/// GET /api/v1/ws/pi - π waveform as paced binary chunks
pub async fn pi_socket(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(ctx): State<AppContext>,
) -> Response {
    let initial = initial_params(&query, ctx.config.stream_defaults());
    let stream_ctx = ctx.pi_stream_context();

    ws.on_upgrade(move |socket| async move {
        let session_id = Uuid::new_v4();
        let _guard = ctx.state.begin_session();
        info!("Session {}: pi stream connected", session_id);

        let (inbound, outbound) = adapt(socket);
        let end = run_pi_session(session_id, stream_ctx, inbound, outbound, initial).await;
        info!("Session {}: pi stream ended ({:?})", session_id, end);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_mapping() {
        assert_eq!(
            client_message(Ok(Message::Text("{}".to_string()))),
            Some(ClientMessage::Text("{}".to_string()))
        );
        assert_eq!(client_message(Ok(Message::Close(None))), Some(ClientMessage::Close));
        assert_eq!(client_message(Ok(Message::Ping(vec![1]))), None);
    }

    #[test]
    fn test_initial_params_from_query() {
        let defaults = StreamParameters::default();
        assert!(initial_params(&HashMap::new(), defaults.clone()).is_none());

        let query = HashMap::from([
            ("frequency".to_string(), "220".to_string()),
            ("generate_wave".to_string(), "false".to_string()),
            ("samples".to_string(), "oops".to_string()),
        ]);
        let params = initial_params(&query, defaults).unwrap();
        assert_eq!(params.wave.frequency, 220.0);
        assert!(!params.generate_wave);
        assert_eq!(params.wave.samples, 100);
    }
}
