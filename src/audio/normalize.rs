//! Decibel scaling and range normalization of magnitude spectrograms
//!
//! Analysis: `normalize(amp_to_db(m) - ref_level_db)`.
//! Synthesis: `db_to_amp(denormalize(v) + ref_level_db)`.
//!
//! The clip at both ends of the range is lossy: every magnitude below the
//! floor `10^((min_level_db + ref_level_db) / 20)` comes back as the floor,
//! and every magnitude above `10^(ref_level_db / 20)` comes back as that
//! ceiling.

use crate::config::AudioConfig;
use ndarray::Array2;

/// Smallest amplitude fed to the logarithm (-100 dB)
pub const AMP_FLOOR: f32 = 1e-5;

/// Convert amplitude to decibels
pub fn amp_to_db(x: f32) -> f32 {
    20.0 * x.max(AMP_FLOOR).log10()
}

/// Convert decibels to amplitude
pub fn db_to_amp(db: f32) -> f32 {
    10f32.powf(db * 0.05)
}

/// Bidirectional magnitude ↔ normalized-dB mapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnitudeNormalizer {
    min_level_db: f32,
    ref_level_db: f32,
    symmetric: bool,
    max_abs_value: f32,
    fingerprint: Option<u64>,
}

impl MagnitudeNormalizer {
    /// Create normalizer from audio configuration
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            min_level_db: config.min_level_db,
            ref_level_db: config.ref_level_db,
            symmetric: config.symmetric,
            max_abs_value: config.max_abs_value,
            fingerprint: Some(config.fingerprint()),
        }
    }

    /// One-sided [0, 1] normalizer with explicit levels
    pub fn with_levels(min_level_db: f32, ref_level_db: f32) -> Self {
        Self {
            min_level_db,
            ref_level_db,
            symmetric: false,
            max_abs_value: 1.0,
            fingerprint: None,
        }
    }

    /// Fingerprint of the config this normalizer was built from
    pub fn fingerprint(&self) -> Option<u64> {
        self.fingerprint
    }

    /// Output range of [`normalize`](Self::normalize)
    pub fn range(&self) -> (f32, f32) {
        if self.symmetric {
            (-self.max_abs_value, self.max_abs_value)
        } else {
            (0.0, 1.0)
        }
    }

    /// Map a reference-relative dB value into the normalized range
    pub fn normalize(&self, db: f32) -> f32 {
        let unit = ((db - self.min_level_db) / -self.min_level_db).clamp(0.0, 1.0);
        if self.symmetric {
            (2.0 * unit - 1.0) * self.max_abs_value
        } else {
            unit
        }
    }

    /// Inverse of [`normalize`](Self::normalize); out-of-range input is clamped first
    pub fn denormalize(&self, value: f32) -> f32 {
        let (lo, hi) = self.range();
        let value = value.clamp(lo, hi);
        let unit = if self.symmetric {
            (value + self.max_abs_value) / (2.0 * self.max_abs_value)
        } else {
            value
        };
        unit * -self.min_level_db + self.min_level_db
    }

    /// Magnitude spectrogram → normalized spectrogram
    pub fn to_normalized(&self, magnitude: &Array2<f32>) -> Array2<f32> {
        magnitude.mapv(|m| self.normalize(amp_to_db(m) - self.ref_level_db))
    }

    /// Normalized spectrogram → magnitude spectrogram
    pub fn to_magnitude(&self, normalized: &Array2<f32>) -> Array2<f32> {
        normalized.mapv(|v| db_to_amp(self.denormalize(v) + self.ref_level_db))
    }

    /// Smallest magnitude that survives a round trip
    pub fn floor_amplitude(&self) -> f32 {
        db_to_amp(self.min_level_db + self.ref_level_db).max(AMP_FLOOR)
    }

    /// Largest magnitude that survives a round trip
    pub fn ceiling_amplitude(&self) -> f32 {
        db_to_amp(self.ref_level_db)
    }
}
