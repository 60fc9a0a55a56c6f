//! Spectrogram → waveform synthesis

use super::analysis::FeatureExtractor;
use crate::{
    audio::{to_wav_bytes, write_wav, EndpointDetector, Preemphasis},
    config::Config,
    vocoder::{GriffinLimVocoder, Vocoder},
    Error, Result,
};
use ndarray::Array2;
use std::path::Path;
use std::time::Instant;

/// Synthesis result
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Trimmed audio samples
    pub audio: Vec<f32>,
    /// Sample rate
    pub sample_rate: u32,
    /// Trim index into the untrimmed waveform
    pub end_point: usize,
    /// Spectrogram frames covered by the trimmed audio (for cropping alignments)
    pub n_frames: usize,
    /// Duration in seconds
    pub duration: f32,
    /// Processing time in seconds
    pub processing_time: f32,
}

impl SynthesisResult {
    /// Save to WAV file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        write_wav(std::io::BufWriter::new(file), &self.audio, self.sample_rate)
    }

    /// Encode as an in-memory 16-bit WAV file
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        to_wav_bytes(&self.audio, self.sample_rate)
    }

    /// Get duration formatted as MM:SS
    pub fn duration_formatted(&self) -> String {
        let minutes = (self.duration / 60.0) as u32;
        let seconds = (self.duration % 60.0) as u32;
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Synthesis path: vocoder → inverse pre-emphasis → endpoint trim
pub struct Synthesizer<V: Vocoder = GriffinLimVocoder> {
    vocoder: V,
    preemphasis: Preemphasis,
    endpoint: EndpointDetector,
    config: Config,
}

impl Synthesizer<GriffinLimVocoder> {
    /// Create Griffin-Lim synthesizer from configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let vocoder = GriffinLimVocoder::new(&config.audio, &config.synthesis)?;
        Self::with_vocoder(vocoder, config)
    }
}

impl<V: Vocoder> Synthesizer<V> {
    /// Create synthesizer around an existing vocoder.
    ///
    /// A vocoder built from a different audio configuration is rejected with
    /// [`Error::ConfigMismatch`]; one without a fingerprint must still match
    /// the configured sample rate and hop length.
    pub fn with_vocoder(vocoder: V, config: &Config) -> Result<Self> {
        let expected = config.audio.fingerprint();
        if let Some(actual) = vocoder.fingerprint() {
            if actual != expected {
                return Err(Error::ConfigMismatch { expected, actual });
            }
        }
        if vocoder.sample_rate() != config.audio.sample_rate {
            return Err(Error::Config(format!(
                "vocoder sample rate {} Hz, expected {} Hz",
                vocoder.sample_rate(),
                config.audio.sample_rate
            )));
        }
        if vocoder.hop_length() != config.audio.hop_length() {
            return Err(Error::Config(format!(
                "vocoder hop length {} samples, expected {}",
                vocoder.hop_length(),
                config.audio.hop_length()
            )));
        }

        log::info!("Synthesizer ready: {}", config.describe());

        Ok(Self {
            preemphasis: Preemphasis::from_config(&config.audio),
            endpoint: EndpointDetector::new(&config.audio, &config.synthesis),
            vocoder,
            config: config.clone(),
        })
    }

    /// Fail with [`Error::ConfigMismatch`] unless `extractor` uses the same
    /// audio configuration
    pub fn ensure_compatible(&self, extractor: &FeatureExtractor) -> Result<()> {
        let expected = self.config.audio.fingerprint();
        let actual = extractor.fingerprint();
        if actual != expected {
            return Err(Error::ConfigMismatch { expected, actual });
        }
        Ok(())
    }

    /// Synthesize a waveform from a normalized linear spectrogram
    /// (n_fft/2+1, frames)
    pub fn synthesize(&self, spectrogram: &Array2<f32>) -> Result<SynthesisResult> {
        let start_time = Instant::now();

        log::debug!("Running vocoder on {:?} spectrogram", spectrogram.dim());
        let mut audio = self.vocoder.synthesize(spectrogram)?;
        self.preemphasis.invert_in_place(&mut audio);

        let end_point = self.endpoint.find_endpoint(&audio);
        audio.truncate(end_point);

        let sample_rate = self.vocoder.sample_rate();
        let processing_time = start_time.elapsed().as_secs_f32();
        let duration = audio.len() as f32 / sample_rate as f32;
        let n_frames = end_point / self.vocoder.hop_length() + 1;

        log::info!(
            "Synthesis complete: {:.2}s audio ({} frames) in {:.2}s",
            duration,
            n_frames,
            processing_time
        );

        Ok(SynthesisResult {
            audio,
            sample_rate,
            end_point,
            n_frames,
            duration,
            processing_time,
        })
    }

    /// Synthesize and save to file
    pub fn synthesize_to_file<P: AsRef<Path>>(
        &self,
        spectrogram: &Array2<f32>,
        output_path: P,
    ) -> Result<SynthesisResult> {
        let result = self.synthesize(spectrogram)?;
        result.save(&output_path)?;
        log::info!("Saved audio to: {}", output_path.as_ref().display());
        Ok(result)
    }

    /// Get vocoder sample rate
    pub fn sample_rate(&self) -> u32 {
        self.vocoder.sample_rate()
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
