//! Mel filterbank construction and projection
//!
//! Triangular filters with area (Slaney) normalization, built from either
//! the Slaney or the HTK mel warping. A filterbank is a pure function of
//! the audio configuration; [`MelFilterbankCache`] keeps one per config
//! fingerprint so batch workers share a single copy.

use crate::config::AudioConfig;
use crate::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Mel warping formula
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MelScale {
    /// Linear below 1 kHz, logarithmic above (librosa default)
    #[default]
    Slaney,
    /// `2595 * log10(1 + f / 700)`
    Htk,
}

const SLANEY_F_SP: f32 = 200.0 / 3.0;
const SLANEY_MIN_LOG_HZ: f32 = 1000.0;
const SLANEY_MIN_LOG_MEL: f32 = SLANEY_MIN_LOG_HZ / SLANEY_F_SP;
// ln(6.4) / 27
const SLANEY_LOGSTEP: f32 = 0.068_751_78;

impl MelScale {
    /// Convert frequency to mel scale
    pub fn hz_to_mel(self, hz: f32) -> f32 {
        match self {
            MelScale::Htk => 2595.0 * (1.0 + hz / 700.0).log10(),
            MelScale::Slaney => {
                if hz >= SLANEY_MIN_LOG_HZ {
                    SLANEY_MIN_LOG_MEL + (hz / SLANEY_MIN_LOG_HZ).ln() / SLANEY_LOGSTEP
                } else {
                    hz / SLANEY_F_SP
                }
            }
        }
    }

    /// Convert mel to frequency
    pub fn mel_to_hz(self, mel: f32) -> f32 {
        match self {
            MelScale::Htk => 700.0 * (10f32.powf(mel / 2595.0) - 1.0),
            MelScale::Slaney => {
                if mel >= SLANEY_MIN_LOG_MEL {
                    SLANEY_MIN_LOG_HZ * (SLANEY_LOGSTEP * (mel - SLANEY_MIN_LOG_MEL)).exp()
                } else {
                    SLANEY_F_SP * mel
                }
            }
        }
    }
}

/// Mel filterbank for converting linear spectrogram to mel scale
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    /// Filterbank matrix (n_mels x n_fft/2+1)
    pub filters: Array2<f32>,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of mel bands
    pub n_mels: usize,
    /// FFT size
    pub n_fft: usize,
    fingerprint: Option<u64>,
}

impl MelFilterbank {
    /// Create mel filterbank from audio configuration
    pub fn new(config: &AudioConfig) -> Self {
        let mut fb = Self::with_params(
            config.sample_rate,
            config.n_fft(),
            config.num_mels,
            config.fmin,
            config.fmax_hz(),
            config.mel_scale,
        );
        fb.fingerprint = Some(config.fingerprint());
        fb
    }

    /// Create mel filterbank from explicit parameters
    pub fn with_params(
        sample_rate: u32,
        n_fft: usize,
        n_mels: usize,
        fmin: f32,
        fmax: f32,
        scale: MelScale,
    ) -> Self {
        let filters = create_mel_filterbank(sample_rate, n_fft, n_mels, fmin, fmax, scale);
        Self {
            filters,
            sample_rate,
            n_mels,
            n_fft,
            fingerprint: None,
        }
    }

    /// Number of linear bins the filterbank expects
    pub fn n_freqs(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Fingerprint of the config this filterbank was built from
    pub fn fingerprint(&self) -> Option<u64> {
        self.fingerprint
    }

    /// Project a linear magnitude spectrogram onto the mel bands.
    ///
    /// spectrogram: (n_fft/2+1, frames) → (n_mels, frames). A bin count
    /// that does not match the filterbank is a wiring bug and is reported
    /// as [`Error::ShapeMismatch`].
    pub fn project(&self, spectrogram: &Array2<f32>) -> Result<Array2<f32>> {
        if spectrogram.nrows() != self.n_freqs() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} linear bins", self.n_freqs()),
                actual: format!("{} linear bins", spectrogram.nrows()),
            });
        }
        Ok(self.filters.dot(spectrogram))
    }
}

/// Create mel filterbank matrix
fn create_mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
    scale: MelScale,
) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;

    let fft_freqs: Vec<f32> = (0..n_freqs)
        .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    // n_mels + 2 band edges, evenly spaced in mel
    let mel_min = scale.hz_to_mel(fmin);
    let mel_max = scale.hz_to_mel(fmax);
    let hz_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| {
            let mel = mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32;
            scale.mel_to_hz(mel)
        })
        .collect();

    let diffs: Vec<f32> = hz_points
        .windows(2)
        .map(|w| (w[1] - w[0]).max(f32::EPSILON))
        .collect();

    let mut filters = Array2::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        // Slaney-style area normalization
        let enorm = 2.0 / (hz_points[m + 2] - hz_points[m]).max(f32::EPSILON);
        for (k, &f) in fft_freqs.iter().enumerate() {
            let lower = (f - hz_points[m]) / diffs[m];
            let upper = (hz_points[m + 2] - f) / diffs[m + 1];
            let weight = lower.min(upper).max(0.0);
            filters[[m, k]] = weight * enorm;
        }
    }

    filters
}

/// Filterbanks keyed by audio-config fingerprint.
///
/// Construction is deterministic, so dropping or clearing the cache never
/// changes results, only how often the matrix is rebuilt.
#[derive(Debug, Default)]
pub struct MelFilterbankCache {
    entries: RwLock<HashMap<u64, Arc<MelFilterbank>>>,
}

impl MelFilterbankCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the filterbank for `config`, building it on first request
    pub fn get(&self, config: &AudioConfig) -> Arc<MelFilterbank> {
        let key = config.fingerprint();
        if let Some(fb) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(fb);
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key).or_insert_with(|| {
            log::debug!(
                "Building mel filterbank: {} bands, n_fft={}, {}-{} Hz",
                config.num_mels,
                config.n_fft(),
                config.fmin,
                config.fmax_hz()
            );
            Arc::new(MelFilterbank::new(config))
        }))
    }

    /// Number of cached filterbanks
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached filterbanks
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hz_to_mel() {
        assert!(MelScale::Htk.hz_to_mel(0.0).abs() < 1e-6);
        assert!((MelScale::Htk.hz_to_mel(1000.0) - 1000.0).abs() < 1.0);
        assert!(MelScale::Slaney.hz_to_mel(0.0).abs() < 1e-6);
        assert!((MelScale::Slaney.hz_to_mel(1000.0) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_mel_to_hz_round_trip() {
        for scale in [MelScale::Htk, MelScale::Slaney] {
            for hz in [0.0f32, 440.0, 999.0, 1000.0, 4000.0, 10000.0] {
                let back = scale.mel_to_hz(scale.hz_to_mel(hz));
                assert!((hz - back).abs() < 1e-2, "{:?} {} -> {}", scale, hz, back);
            }
        }
    }

    #[test]
    fn test_mel_filterbank_creation() {
        let config = AudioConfig::default();
        let fb = MelFilterbank::new(&config);
        assert_eq!(fb.filters.shape(), &[80, 1025]);
        assert_eq!(fb.fingerprint(), Some(config.fingerprint()));

        let total_sum: f32 = fb.filters.iter().sum();
        assert!(total_sum > 0.0, "Filterbank should have some non-zero values");
    }

    #[test]
    fn test_rows_are_contiguous_and_bounded() {
        let fb = MelFilterbank::new(&AudioConfig::default());
        for (m, row) in fb.filters.outer_iter().enumerate() {
            let nonzero: Vec<usize> = row
                .iter()
                .enumerate()
                .filter(|&(_, &w)| w > 0.0)
                .map(|(k, _)| k)
                .collect();
            assert!(!nonzero.is_empty(), "band {} is empty", m);
            let (first, last) = (nonzero[0], nonzero[nonzero.len() - 1]);
            assert_eq!(last - first + 1, nonzero.len(), "band {} has gaps", m);

            // Area normalization: each triangle integrates to roughly one
            // bin width's worth of energy per Hz
            let hz_per_bin = fb.sample_rate as f32 / fb.n_fft as f32;
            let area = row.sum() * hz_per_bin;
            assert!(area > 0.5 && area < 1.5, "band {} area {}", m, area);
        }
    }

    #[test]
    fn test_project_silence_is_silent() {
        let fb = MelFilterbank::new(&AudioConfig::default());
        let silence = Array2::zeros((1025, 12));
        let mel = fb.project(&silence).unwrap();
        assert_eq!(mel.dim(), (80, 12));
        assert!(mel.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_project_rejects_wrong_bins() {
        let fb = MelFilterbank::new(&AudioConfig::default());
        let wrong = Array2::zeros((513, 3));
        assert!(matches!(fb.project(&wrong), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_cache_reuses_per_config() {
        let cache = MelFilterbankCache::new();
        let a = AudioConfig::default();
        let b = AudioConfig {
            num_mels: 40,
            ..AudioConfig::default()
        };

        let fb1 = cache.get(&a);
        let fb2 = cache.get(&a);
        assert!(Arc::ptr_eq(&fb1, &fb2));
        assert_eq!(cache.len(), 1);

        let fb3 = cache.get(&b);
        assert_eq!(fb3.n_mels, 40);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        let rebuilt = cache.get(&a);
        assert_eq!(rebuilt.filters, fb1.filters);
    }
}
