//! # PiSong Audio Pipeline Library (pisong-ap)
//!
//! Turns the decimal digits of π into music and delivers it.
//!
//! **Purpose:** Map digits to melody notes, render enveloped sine tones,
//! layer harmony voices, stitch everything into one click-free waveform, and
//! serve the result over HTTP or as a paced WebSocket stream that accepts
//! live parameter updates.
//!
//! **Architecture:** Synchronous synthesis on the tokio blocking pool; one
//! task per streaming session multiplexing inbound settings and outbound
//! chunks with `tokio::select!`.

pub mod api;
pub mod config;
pub mod digits;
pub mod error;
pub mod state;
pub mod streaming;
pub mod synthesis;

pub use error::{Error, Result};
pub use state::SharedState;
