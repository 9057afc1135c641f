//! pisong-ap configuration
//!
//! Merges command-line arguments (with their environment fallbacks), the
//! TOML config file and compiled defaults into one [`Config`].

use crate::error::{Error, Result};
use crate::synthesis::tone::ToneRenderer;
use clap::Parser;
use pisong_common::config::{load_or_default, resolve_config_path, CompiledDefaults, TomlConfig};
use pisong_common::params::{StreamParameters, MAX_CHUNK_SAMPLES, MAX_FRAME_RATE};
use std::path::PathBuf;
use tracing::info;

/// Highest accepted synthesis sample rate
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Command-line arguments for pisong-ap
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "pisong-ap")]
#[command(about = "π sonification and waveform streaming service")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PISONG_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "PISONG_HOST")]
    pub host: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "PISONG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "PISONG_LOG")]
    pub log_level: Option<String>,
}

/// Resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub allowed_origins: Vec<String>,
    pub renderer: ToneRenderer,
    pub max_digits: usize,
    pub chunk_samples: usize,
    pub frame_rate: f64,
    /// File the settings were read from, if any
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(&Args::default(), TomlConfig::default(), None)
    }
}

impl Config {
    /// Resolve configuration: CLI/env > TOML > compiled defaults
    ///
    /// # Errors
    /// `Error::Config` if the config file cannot be parsed or a value is out
    /// of range.
    pub fn resolve(args: &Args) -> Result<Self> {
        let path = resolve_config_path(args.config.as_deref());
        let file = load_or_default(path.as_deref()).map_err(|e| Error::Config(e.to_string()))?;

        let config = Self::merge(args, file, path);
        config.validate()?;
        info!(
            "Configuration resolved: {}:{}, sample rate {}, max digits {}",
            config.host, config.port, config.renderer.sample_rate, config.max_digits
        );
        Ok(config)
    }

    fn merge(args: &Args, file: TomlConfig, path: Option<PathBuf>) -> Self {
        let defaults = CompiledDefaults::default();
        let synthesis = file.synthesis;
        let streaming = file.streaming;

        Self {
            host: args.host.clone().or(file.host).unwrap_or(defaults.host),
            port: args.port.or(file.port).unwrap_or(defaults.port),
            log_level: args
                .log_level
                .clone()
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
            allowed_origins: file.allowed_origins.unwrap_or(defaults.allowed_origins),
            renderer: ToneRenderer {
                sample_rate: synthesis.sample_rate.unwrap_or(defaults.sample_rate),
                attack: synthesis.attack.unwrap_or(defaults.attack),
                decay: synthesis.decay.unwrap_or(defaults.decay),
                amplitude: synthesis.amplitude.unwrap_or(defaults.amplitude),
            },
            max_digits: synthesis.max_digits.unwrap_or(defaults.max_digits),
            chunk_samples: streaming.chunk_samples.unwrap_or(defaults.chunk_samples),
            frame_rate: streaming.frame_rate.unwrap_or(defaults.frame_rate),
            config_path: path,
        }
    }

    fn validate(&self) -> Result<()> {
        let r = &self.renderer;
        if r.sample_rate == 0 || r.sample_rate > MAX_SAMPLE_RATE {
            return Err(Error::Config(format!(
                "sample_rate must be in 1..={}, got {}",
                MAX_SAMPLE_RATE, r.sample_rate
            )));
        }
        if !(r.attack >= 0.0 && r.decay >= 0.0 && r.amplitude.is_finite()) {
            return Err(Error::Config(format!(
                "invalid envelope: attack {}, decay {}, amplitude {}",
                r.attack, r.decay, r.amplitude
            )));
        }
        if self.chunk_samples == 0 || self.chunk_samples as u64 > MAX_CHUNK_SAMPLES {
            return Err(Error::Config(format!(
                "chunk_samples must be in 1..={}, got {}",
                MAX_CHUNK_SAMPLES, self.chunk_samples
            )));
        }
        if !(self.frame_rate > 0.0 && self.frame_rate <= MAX_FRAME_RATE) {
            return Err(Error::Config(format!("invalid frame_rate {}", self.frame_rate)));
        }
        Ok(())
    }

    /// `host:port` for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Session defaults carrying the configured chunk size and frame rate
    pub fn stream_defaults(&self) -> StreamParameters {
        let mut params = StreamParameters {
            chunk_samples: self.chunk_samples,
            ..Default::default()
        };
        params.wave.frame_rate = self.frame_rate;
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.renderer, ToneRenderer::default());
        assert_eq!(config.max_digits, 10_000);
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_args_override_file() {
        let file: TomlConfig = toml::from_str(
            r#"
            port = 9000
            host = "127.0.0.1"
            [streaming]
            chunk_samples = 1024
            "#,
        )
        .unwrap();
        let args = Args {
            port: Some(9100),
            ..Default::default()
        };
        let config = Config::merge(&args, file, None);
        assert_eq!(config.port, 9100);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.chunk_samples, 1024);
        assert_eq!(config.stream_defaults().chunk_samples, 1024);
    }

    #[test]
    fn test_validate_rejects_zero_sample_rate() {
        let mut config = Config::default();
        config.renderer.sample_rate = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_huge_sample_rate() {
        let mut config = Config::default();
        config.renderer.sample_rate = u32::MAX;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.renderer.sample_rate = MAX_SAMPLE_RATE;
        assert!(config.validate().is_ok());
    }
}
