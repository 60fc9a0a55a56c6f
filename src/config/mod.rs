//! Configuration management for gst-audio
//!
//! A [`Config`] is loaded once per run and passed by reference into every
//! component constructor. Nothing in the crate reads configuration from a
//! global.

use crate::audio::MelScale;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Signal-processing parameters shared by analysis and synthesis
    pub audio: AudioConfig,
    /// Waveform reconstruction settings
    pub synthesis: SynthesisConfig,
    /// Dataset preprocessing settings
    pub preprocess: PreprocessConfig,
}

/// A frame or hop size, given either in samples or in milliseconds
///
/// In YAML this is written as a bare integer (`hop: 256`) or as a map
/// (`hop: { ms: 12.5 }`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameSpan {
    /// Exact number of samples
    Samples(usize),
    /// Duration, converted with the configured sample rate
    Millis { ms: f32 },
}

impl FrameSpan {
    /// Resolve to a sample count at `sample_rate`
    pub fn to_samples(self, sample_rate: u32) -> usize {
        match self {
            FrameSpan::Samples(n) => n,
            FrameSpan::Millis { ms } => (ms / 1000.0 * sample_rate as f32).round() as usize,
        }
    }
}

/// Audio analysis/synthesis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz; files on disk must match it exactly
    pub sample_rate: u32,
    /// Number of linear frequency bins (n_fft / 2 + 1)
    pub num_freq: usize,
    /// Hop between consecutive frames
    pub hop: FrameSpan,
    /// Analysis window length
    pub window: FrameSpan,
    /// Number of mel bands
    pub num_mels: usize,
    /// Lowest mel filter edge in Hz
    pub fmin: f32,
    /// Highest mel filter edge in Hz (Nyquist when absent)
    pub fmax: Option<f32>,
    /// Mel warping formula
    pub mel_scale: MelScale,
    /// Pre-emphasis coefficient
    pub preemphasis: f32,
    /// Reference level subtracted after amplitude-to-dB conversion
    pub ref_level_db: f32,
    /// Decibel floor; everything below maps to the bottom of the range
    pub min_level_db: f32,
    /// Map normalized values to [-max_abs_value, max_abs_value] instead of [0, 1]
    pub symmetric: bool,
    /// Bound used by symmetric normalization
    pub max_abs_value: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 20000,
            num_freq: 1025,
            hop: FrameSpan::Millis { ms: 12.5 },
            window: FrameSpan::Millis { ms: 50.0 },
            num_mels: 80,
            fmin: 0.0,
            fmax: None,
            mel_scale: MelScale::Slaney,
            preemphasis: 0.97,
            ref_level_db: 20.0,
            min_level_db: -100.0,
            symmetric: false,
            max_abs_value: 4.0,
        }
    }
}

impl AudioConfig {
    /// FFT size derived from the bin count
    pub fn n_fft(&self) -> usize {
        (self.num_freq.saturating_sub(1)) * 2
    }

    /// Hop length in samples
    pub fn hop_length(&self) -> usize {
        self.hop.to_samples(self.sample_rate)
    }

    /// Window length in samples
    pub fn win_length(&self) -> usize {
        self.window.to_samples(self.sample_rate)
    }

    /// Upper mel edge in Hz
    pub fn fmax_hz(&self) -> f32 {
        self.fmax.unwrap_or(self.sample_rate as f32 / 2.0)
    }

    /// Validate parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("Sample rate must be > 0".into()));
        }
        if self.num_freq < 2 {
            return Err(Error::Config("num_freq must be >= 2".into()));
        }
        let n_fft = self.n_fft();
        let hop = self.hop_length();
        let win = self.win_length();
        if hop == 0 {
            return Err(Error::Config("hop length must be > 0".into()));
        }
        if win == 0 || win > n_fft {
            return Err(Error::Config(format!(
                "window length {} must be in 1..={} (n_fft)",
                win, n_fft
            )));
        }
        if hop > win {
            return Err(Error::Config(format!(
                "hop length {} exceeds window length {}",
                hop, win
            )));
        }
        if self.num_mels == 0 {
            return Err(Error::Config("num_mels must be > 0".into()));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        let fmax = self.fmax_hz();
        if self.fmin < 0.0 || self.fmin >= fmax {
            return Err(Error::Config(format!(
                "fmin {} must be in [0, fmax={})",
                self.fmin, fmax
            )));
        }
        if fmax > nyquist {
            return Err(Error::Config(format!(
                "fmax {} exceeds Nyquist {}",
                fmax, nyquist
            )));
        }
        if !(0.0..1.0).contains(&self.preemphasis) {
            return Err(Error::Config("preemphasis must be in [0, 1)".into()));
        }
        if self.min_level_db >= 0.0 {
            return Err(Error::Config("min_level_db must be < 0".into()));
        }
        if self.symmetric && self.max_abs_value <= 0.0 {
            return Err(Error::Config("max_abs_value must be > 0".into()));
        }
        Ok(())
    }

    /// 64-bit hash over every field.
    ///
    /// Components remember the fingerprint of the config they were built
    /// from so that mixing analysis and synthesis stages built from
    /// different configs is caught instead of silently producing garbage.
    /// Stable within one build of the crate.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.sample_rate.hash(&mut hasher);
        self.num_freq.hash(&mut hasher);
        self.hop_length().hash(&mut hasher);
        self.win_length().hash(&mut hasher);
        self.num_mels.hash(&mut hasher);
        self.fmin.to_bits().hash(&mut hasher);
        self.fmax_hz().to_bits().hash(&mut hasher);
        self.mel_scale.hash(&mut hasher);
        self.preemphasis.to_bits().hash(&mut hasher);
        self.ref_level_db.to_bits().hash(&mut hasher);
        self.min_level_db.to_bits().hash(&mut hasher);
        self.symmetric.hash(&mut hasher);
        self.max_abs_value.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}

/// Waveform reconstruction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Number of Griffin-Lim iterations
    pub griffin_lim_iters: usize,
    /// Exponent applied to the linear magnitude before phase reconstruction
    pub power: f32,
    /// Fast Griffin-Lim momentum (0 = classic algorithm)
    pub momentum: f32,
    /// Seed for the initial random phase
    pub seed: u64,
    /// Frame RMS level (dBFS) above which a frame counts as speech
    pub endpoint_threshold_db: f32,
    /// Frame size used by endpoint detection
    pub endpoint_frame: FrameSpan,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            griffin_lim_iters: 60,
            power: 1.5,
            momentum: 0.0,
            seed: 0,
            endpoint_threshold_db: -40.0,
            endpoint_frame: FrameSpan::Millis { ms: 10.0 },
        }
    }
}

impl SynthesisConfig {
    /// Validate parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.griffin_lim_iters == 0 {
            return Err(Error::Config("griffin_lim_iters must be > 0".into()));
        }
        if self.power <= 0.0 {
            return Err(Error::Config("power must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(Error::Config("momentum must be in [0, 1)".into()));
        }
        Ok(())
    }
}

/// Dataset preprocessing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Always rescale each utterance to `peak_target`, not only when it clips
    pub peak_norm: bool,
    /// Peak amplitude after normalization
    pub peak_target: f32,
    /// Worker threads (CPU count when absent)
    pub num_workers: Option<usize>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            peak_norm: false,
            peak_target: 0.9,
            num_workers: None,
        }
    }
}

impl PreprocessConfig {
    /// Effective worker count
    pub fn workers(&self) -> usize {
        self.num_workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create default configuration and save to file
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.synthesis.validate()?;
        if self.preprocess.peak_target <= 0.0 || self.preprocess.peak_target > 1.0 {
            return Err(Error::Config("peak_target must be in (0, 1]".into()));
        }
        Ok(())
    }

    /// Human-readable dump of the audio parameters, logged at startup
    pub fn describe(&self) -> String {
        let a = &self.audio;
        format!(
            "sr={} n_fft={} hop={} win={} mels={} fmin={} fmax={} preemph={} ref_db={} min_db={} gl_iters={} power={}",
            a.sample_rate,
            a.n_fft(),
            a.hop_length(),
            a.win_length(),
            a.num_mels,
            a.fmin,
            a.fmax_hz(),
            a.preemphasis,
            a.ref_level_db,
            a.min_level_db,
            self.synthesis.griffin_lim_iters,
            self.synthesis.power,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_derived_sizes() {
        let config = AudioConfig::default();
        assert_eq!(config.n_fft(), 2048);
        assert_eq!(config.hop_length(), 250);
        assert_eq!(config.win_length(), 1000);
        assert_eq!(config.fmax_hz(), 10000.0);
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_frame_span_yaml_forms() {
        let yaml = "audio:\n  sample_rate: 22050\n  num_freq: 513\n  hop: 256\n  window: { ms: 46.44 }\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.audio.hop, FrameSpan::Samples(256));
        assert_eq!(config.audio.hop_length(), 256);
        assert_eq!(config.audio.win_length(), 1024);
        // Unspecified sections fall back to defaults
        assert_eq!(config.synthesis.griffin_lim_iters, 60);
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = Config::create_default(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.audio.window = FrameSpan::Samples(4096);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.audio.fmax = Some(15000.0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.audio.preemphasis = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.synthesis.griffin_lim_iters = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fingerprint_tracks_fields() {
        let a = AudioConfig::default();
        let b = AudioConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = AudioConfig {
            sample_rate: 22050,
            ..AudioConfig::default()
        };
        assert_ne!(a.fingerprint(), c.fingerprint());

        let d = AudioConfig {
            min_level_db: -80.0,
            ..AudioConfig::default()
        };
        assert_ne!(a.fingerprint(), d.fingerprint());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load("/nonexistent/config.yaml");
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }
}
