//! Configuration file loading and compiled defaults
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Steps 1 and 2 are handled by the binary's argument parser; this module
//! provides the file schema, its discovery and the compiled defaults.
//!
//! A missing config file is not an error: a warning is logged and the
//! defaults apply. A config file that exists but cannot be parsed is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    /// Origins permitted by CORS
    pub allowed_origins: Option<Vec<String>>,
    pub synthesis: SynthesisSection,
    pub streaming: StreamingSection,
}

/// `[synthesis]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSection {
    pub sample_rate: Option<u32>,
    /// Note attack, seconds
    pub attack: Option<f32>,
    /// Note decay, seconds
    pub decay: Option<f32>,
    /// Peak amplitude of each rendered tone before mixing
    pub amplitude: Option<f32>,
    /// Upper bound on digits per request
    pub max_digits: Option<usize>,
}

/// `[streaming]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSection {
    /// Samples per binary chunk on the π stream
    pub chunk_samples: Option<usize>,
    /// Default live frames per second
    pub frame_rate: Option<f64>,
}

/// Fallback values used when neither CLI, environment nor file set a key
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub allowed_origins: Vec<String>,
    pub sample_rate: u32,
    pub attack: f32,
    pub decay: f32,
    pub amplitude: f32,
    pub max_digits: usize,
    pub chunk_samples: usize,
    pub frame_rate: f64,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "debug".to_string(),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            sample_rate: 44100,
            attack: 0.02,
            decay: 0.02,
            amplitude: 0.5,
            max_digits: 10_000,
            chunk_samples: 4096,
            frame_rate: 30.0,
        }
    }
}

/// Platform config file location (`~/.config/pisong/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pisong").join("config.toml"))
}

/// Pick the config file to read
///
/// Explicit path (CLI or `PISONG_CONFIG`, already merged by the caller)
/// wins; otherwise the platform default location if it exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    default_config_path().filter(|p| p.exists())
}

/// Parse a config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<TomlConfig>(&content)?;
    Ok(config)
}

/// Load the config file if there is one
///
/// # Errors
/// `Error::Config` if the file exists but is not valid TOML for this schema.
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using compiled defaults", path.display());
        return Ok(TomlConfig::default());
    }

    match load_toml_config(path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) => Err(Error::Config(format!("{}: {}", path.display(), e))),
    }
}
