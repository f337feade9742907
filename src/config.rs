//! # Config
//!
//! Runtime settings, read from an optional TOML file and overridden from the
//! command line by the binary.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::streamer::DEFAULT_BUFFER_SIZE;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the control server listens on.
    pub address: String,
    /// Samples per second, shared by the oscillator and the output device.
    pub sample_rate: u32,
    /// Initial oscillator frequency in Hz. Any finite value, including zero
    /// and negative ones.
    pub frequency: f64,
    /// Samples per buffer handed to the output device.
    pub buffer_size: usize,
    /// Buffers allowed to wait between the streamer and the device.
    pub queue_depth: usize,
    /// Page served at `/`. The built-in page is used when unset.
    pub index_page: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: "0.0.0.0:8080".to_string(),
            sample_rate: 44100,
            frequency: 440.0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            queue_depth: 2,
            index_page: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;
        Config::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Config> {
        toml::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::ConfigError("sample_rate must be positive".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(Error::ConfigError("buffer_size must be positive".to_string()));
        }
        if !self.frequency.is_finite() {
            return Err(Error::ConfigError("frequency must be a finite number".to_string()));
        }
        if self.queue_depth == 0 {
            return Err(Error::ConfigError("queue_depth must be positive".to_string()));
        }
        Ok(())
    }
}
