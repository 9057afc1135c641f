//! # PiSong Common Library
//!
//! Shared code for the PiSong crates including:
//! - Equal-tempered pitch table (88 piano keys)
//! - Scale construction and harmony interval lookup
//! - Fade curve definitions for envelopes and crossfades
//! - Synthesis and streaming parameter bundles
//! - Configuration loading

pub mod config;
pub mod error;
pub mod fade_curves;
pub mod params;
pub mod pitch;
pub mod scale;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use pitch::{PitchTable, PITCH_TABLE};
pub use scale::{HarmonyType, ScaleType};
