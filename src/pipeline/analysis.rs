//! Waveform → feature analysis
//!
//! Mel and linear targets come from one STFT call so their frame counts
//! always agree.

use crate::audio::{
    load_wav, magnitude_spectrogram, normalize_peak, MagnitudeNormalizer, MelFilterbank,
    MelFilterbankCache, Preemphasis, SpectralTransform,
};
use crate::config::{AudioConfig, PreprocessConfig};
use crate::{Error, Result};
use ndarray::Array2;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Normalized spectrogram pair for one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    /// Mel spectrogram (num_mels, frames)
    pub mel: Array2<f32>,
    /// Linear spectrogram (n_fft/2+1, frames)
    pub linear: Array2<f32>,
}

impl Features {
    /// Number of frames
    pub fn num_frames(&self) -> usize {
        self.linear.ncols()
    }
}

/// Analysis path: pre-emphasis → STFT → {mel projection →} normalization
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: AudioConfig,
    preemphasis: Preemphasis,
    transform: SpectralTransform,
    filterbank: Arc<MelFilterbank>,
    normalizer: MagnitudeNormalizer,
}

impl FeatureExtractor {
    /// Create extractor with a freshly built filterbank
    pub fn new(config: &AudioConfig) -> Result<Self> {
        config.validate()?;
        Self::from_parts(
            config,
            SpectralTransform::new(config)?,
            Arc::new(MelFilterbank::new(config)),
            MagnitudeNormalizer::new(config),
        )
    }

    /// Create extractor sharing filterbanks through `cache`
    pub fn with_cache(config: &AudioConfig, cache: &MelFilterbankCache) -> Result<Self> {
        config.validate()?;
        Self::from_parts(
            config,
            SpectralTransform::new(config)?,
            cache.get(config),
            MagnitudeNormalizer::new(config),
        )
    }

    /// Assemble an extractor from prebuilt components.
    ///
    /// Components built from a different `AudioConfig` are rejected with
    /// [`Error::ConfigMismatch`].
    pub fn from_parts(
        config: &AudioConfig,
        transform: SpectralTransform,
        filterbank: Arc<MelFilterbank>,
        normalizer: MagnitudeNormalizer,
    ) -> Result<Self> {
        let expected = config.fingerprint();
        for actual in [
            transform.fingerprint(),
            filterbank.fingerprint(),
            normalizer.fingerprint(),
        ]
        .into_iter()
        .flatten()
        {
            if actual != expected {
                return Err(Error::ConfigMismatch { expected, actual });
            }
        }

        if filterbank.n_freqs() != transform.n_freqs() {
            return Err(Error::ShapeMismatch {
                expected: format!("filterbank over {} bins", transform.n_freqs()),
                actual: format!("filterbank over {} bins", filterbank.n_freqs()),
            });
        }

        Ok(Self {
            config: config.clone(),
            preemphasis: Preemphasis::from_config(config),
            transform,
            filterbank,
            normalizer,
        })
    }

    /// Audio configuration
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Fingerprint of the audio configuration
    pub fn fingerprint(&self) -> u64 {
        self.config.fingerprint()
    }

    /// Mel filterbank in use
    pub fn filterbank(&self) -> &MelFilterbank {
        &self.filterbank
    }

    fn linear_magnitude(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let emphasized = self.preemphasis.apply(samples);
        Ok(magnitude_spectrogram(&self.transform.stft(&emphasized)?))
    }

    /// Compute normalized mel and linear spectrograms
    pub fn extract(&self, samples: &[f32]) -> Result<Features> {
        let start = Instant::now();
        let magnitude = self.linear_magnitude(samples)?;
        let mel = self.filterbank.project(&magnitude)?;

        let features = Features {
            mel: self.normalizer.to_normalized(&mel),
            linear: self.normalizer.to_normalized(&magnitude),
        };

        log::debug!(
            "Extracted features: {} samples -> {} frames in {:.1}ms",
            samples.len(),
            features.num_frames(),
            start.elapsed().as_secs_f32() * 1000.0
        );
        Ok(features)
    }

    /// Normalized linear spectrogram (n_fft/2+1, frames)
    pub fn spectrogram(&self, samples: &[f32]) -> Result<Array2<f32>> {
        Ok(self.normalizer.to_normalized(&self.linear_magnitude(samples)?))
    }

    /// Normalized mel spectrogram (num_mels, frames)
    pub fn melspectrogram(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let mel = self.filterbank.project(&self.linear_magnitude(samples)?)?;
        Ok(self.normalizer.to_normalized(&mel))
    }

    /// Load a training utterance, peak-normalize it and extract features
    pub fn analyze_file<P: AsRef<Path>>(
        &self,
        path: P,
        preprocess: &PreprocessConfig,
    ) -> Result<Features> {
        let mut wav = load_wav(path, &self.config)?;
        if normalize_peak(&mut wav.samples, preprocess.peak_target, preprocess.peak_norm) {
            log::debug!("Rescaled waveform peak to {}", preprocess.peak_target);
        }
        self.extract(&wav.samples)
    }

    /// Mel spectrogram of a style reference, as (frames, num_mels)
    pub fn reference_mel<P: AsRef<Path>>(&self, path: P) -> Result<Array2<f32>> {
        let wav = load_wav(path, &self.config)?;
        let mel = self.melspectrogram(&wav.samples)?;
        Ok(mel.t().as_standard_layout().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameSpan;
    use std::f32::consts::PI;

    fn small_config() -> AudioConfig {
        AudioConfig {
            sample_rate: 16000,
            num_freq: 257,
            hop: FrameSpan::Samples(128),
            window: FrameSpan::Samples(512),
            num_mels: 40,
            ..AudioConfig::default()
        }
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * 1000.0 * i as f32 / 16000.0).sin())
            .collect()
    }

    #[test]
    fn test_mel_and_linear_share_frames() {
        let extractor = FeatureExtractor::new(&small_config()).unwrap();
        let features = extractor.extract(&tone(3000)).unwrap();
        assert_eq!(features.linear.dim(), (257, 25));
        assert_eq!(features.mel.dim(), (40, 25));
        assert_eq!(features.num_frames(), 25);
    }

    #[test]
    fn test_extract_matches_single_paths() {
        let extractor = FeatureExtractor::new(&small_config()).unwrap();
        let signal = tone(2000);
        let features = extractor.extract(&signal).unwrap();
        assert_eq!(features.linear, extractor.spectrogram(&signal).unwrap());
        assert_eq!(features.mel, extractor.melspectrogram(&signal).unwrap());
    }

    #[test]
    fn test_values_in_normalized_range() {
        let extractor = FeatureExtractor::new(&small_config()).unwrap();
        let features = extractor.extract(&tone(4000)).unwrap();
        for &v in features.mel.iter().chain(features.linear.iter()) {
            assert!((0.0..=1.0).contains(&v), "value {} out of range", v);
        }
    }

    #[test]
    fn test_silence_maps_to_floor() {
        let extractor = FeatureExtractor::new(&small_config()).unwrap();
        let features = extractor.extract(&vec![0.0; 1000]).unwrap();
        assert!(features.mel.iter().all(|&v| v == 0.0));
        assert!(features.linear.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_cache_shares_filterbank() {
        let cache = MelFilterbankCache::new();
        let config = small_config();
        let a = FeatureExtractor::with_cache(&config, &cache).unwrap();
        let b = FeatureExtractor::with_cache(&config, &cache).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(std::ptr::eq(a.filterbank(), b.filterbank()));
    }

    #[test]
    fn test_mismatched_parts_rejected() {
        let config = small_config();
        let other = AudioConfig {
            ref_level_db: 10.0,
            ..small_config()
        };
        let result = FeatureExtractor::from_parts(
            &config,
            SpectralTransform::new(&config).unwrap(),
            Arc::new(MelFilterbank::new(&config)),
            MagnitudeNormalizer::new(&other),
        );
        match result {
            Err(Error::ConfigMismatch { expected, actual }) => {
                assert_eq!(expected, config.fingerprint());
                assert_eq!(actual, other.fingerprint());
            }
            other => panic!("expected ConfigMismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_reference_mel_is_transposed() {
        let config = small_config();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.wav");
        crate::audio::save_wav(&path, &tone(1600), &config).unwrap();

        let extractor = FeatureExtractor::new(&config).unwrap();
        let reference = extractor.reference_mel(&path).unwrap();
        assert_eq!(reference.dim(), (14, 40));
        assert!(reference.is_standard_layout());
    }

    #[test]
    fn test_analyze_file_rescales_clipping_input() {
        let config = small_config();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiet.wav");
        let quiet: Vec<f32> = tone(1600).iter().map(|s| s * 0.1).collect();
        crate::audio::save_wav(&path, &quiet, &config).unwrap();

        let extractor = FeatureExtractor::new(&config).unwrap();
        let kept = extractor
            .analyze_file(&path, &PreprocessConfig::default())
            .unwrap();
        let boosted = extractor
            .analyze_file(
                &path,
                &PreprocessConfig {
                    peak_norm: true,
                    ..PreprocessConfig::default()
                },
            )
            .unwrap();

        assert_eq!(kept.linear.dim(), boosted.linear.dim());
        assert!(boosted.linear.sum() > kept.linear.sum());
    }
}
