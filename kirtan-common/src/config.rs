//! Configuration loading
//!
//! Resolution priority, highest first:
//! 1. Environment variables (`KIRTAN_*`)
//! 2. TOML config file (`$KIRTAN_CONFIG`, else the platform config dir)
//! 3. Compiled defaults
//!
//! A missing or unreadable config file logs a warning and falls back to the
//! compiled defaults; it never aborts startup.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

/// Calibration constants for the capture pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Frame size in samples (one VAD/pitch window)
    pub frame_size: usize,
    /// Voiced when frame RMS is strictly above this linear threshold
    pub vad_rms_threshold: f32,
    /// Linear RMS mapped to avg_energy = 1.0
    pub reference_ceiling: f64,
    /// Pitch is estimated on every Nth voiced frame
    pub pitch_frame_stride: usize,
    /// Lowest accepted pitch candidate (Hz)
    pub pitch_min_hz: f64,
    /// Highest accepted pitch candidate (Hz)
    pub pitch_max_hz: f64,
    /// Normalized autocorrelation floor below which a candidate is discarded
    pub pitch_corr_floor: f64,
    /// Ring buffer capacity in samples between the device callback and the
    /// extraction thread
    pub ring_capacity: usize,
    /// Input device name (None = system default)
    pub device_name: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            frame_size: 2048,
            vad_rms_threshold: 0.02,
            reference_ceiling: 0.25,
            pitch_frame_stride: 3,
            pitch_min_hz: 70.0,
            pitch_max_hz: 420.0,
            pitch_corr_floor: 0.30,
            // ~1.5s of headroom at 44.1kHz; the callback drops on overflow
            ring_capacity: 65_536,
            device_name: None,
        }
    }
}

/// External enrichment service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Hard timeout for one enrichment call
    pub timeout_ms: u64,
    /// Model identifier forwarded to the service
    pub model: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:8807".to_string(),
            timeout_ms: 1_500,
            model: "raga-flash-v1".to_string(),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub capture: CaptureConfig,
    pub enrichment: EnrichmentConfig,
}

impl EngineConfig {
    /// Load configuration with the full resolution chain.
    ///
    /// Never fails: file problems degrade to compiled defaults with a
    /// warning, then environment overrides are applied on top.
    pub fn load() -> Self {
        let mut config = match resolve_config_path() {
            Some(path) => match Self::load_from_path(&path) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Config file unusable, using defaults");
                    Self::default()
                }
            },
            None => Self::default(),
        };
        config.apply_env_overrides();
        config
    }

    /// Parse a specific TOML file
    pub fn load_from_path(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply `KIRTAN_*` environment overrides on top of the current values
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_parse::<u32>("KIRTAN_SAMPLE_RATE") {
            self.capture.sample_rate = value;
        }
        if let Some(value) = env_parse::<f32>("KIRTAN_VAD_THRESHOLD") {
            self.capture.vad_rms_threshold = value;
        }
        if let Some(value) = env_parse::<bool>("KIRTAN_ENRICHMENT_ENABLED") {
            self.enrichment.enabled = value;
        }
        if let Ok(value) = std::env::var("KIRTAN_ENRICHMENT_URL") {
            if !value.is_empty() {
                self.enrichment.base_url = value;
            }
        }
        if let Some(value) = env_parse::<u64>("KIRTAN_ENRICHMENT_TIMEOUT_MS") {
            self.enrichment.timeout_ms = value;
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

/// Config file location: `$KIRTAN_CONFIG`, else `<config dir>/kirtan/config.toml`
fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KIRTAN_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let candidate = dirs::config_dir()?.join("kirtan").join("config.toml");
    if candidate.exists() {
        Some(candidate)
    } else {
        None
    }
}
