//! Configuration types for the playback engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Audio output settings.
    pub audio: AudioConfig,
    /// Playback scheduling and crossfade settings.
    pub playback: PlaybackConfig,
    /// Synthesis request settings.
    pub synthesis: SynthesisConfig,
}

/// Audio output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of synthesized audio in Hz. The transport delivers
    /// 16-bit mono PCM at this rate, and output is mono at the same rate.
    pub sample_rate: u32,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            output_device: None,
        }
    }
}

/// Playback scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Amplitude fade-in applied at the start of every scheduled unit, in
    /// seconds. Masks discontinuity clicks at chunk boundaries.
    pub unit_fade_in: f64,
    /// Initial crossfade overlap window between chained utterances, in
    /// seconds.
    pub crossfade_window: f64,
    /// Amount the overlap window shrinks per crossfade step, in seconds.
    pub crossfade_shrink: f64,
    /// Skip decoded chunks whose peak amplitude never exceeds
    /// `silence_peak_threshold` instead of scheduling them.
    pub skip_silent_chunks: bool,
    /// Peak amplitude below which a chunk counts as silent.
    pub silence_peak_threshold: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            unit_fade_in: 0.06,
            crossfade_window: 0.06,
            crossfade_shrink: 0.005,
            skip_silent_chunks: true,
            silence_peak_threshold: 1e-4,
        }
    }
}

/// Synthesis request configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Voice name sent with every synthesize request.
    pub voice: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            voice: "Azilea".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::EngineError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot
    /// be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::EngineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/lilt/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp/lilt-config"))
            .join("lilt")
            .join("config.toml")
    }
}
