//! Audio I/O operations
//!
//! Reads mono PCM/float WAV at exactly the configured sample rate (no
//! resampling) and writes 16-bit signed PCM.

use crate::config::AudioConfig;
use crate::{Error, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{Cursor, Seek, Write};
use std::path::Path;

/// Mono waveform container
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Audio samples, nominally in [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl Waveform {
    /// Create new waveform
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Get duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Load a mono WAV file
///
/// Fails with [`Error::FormatMismatch`] when the file's sample rate differs
/// from `config.sample_rate` or it has more than one channel; callers must
/// resample or downmix beforehand. No samples are returned in that case.
pub fn load_wav<P: AsRef<Path>>(path: P, config: &AudioConfig) -> Result<Waveform> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }

    let reader = WavReader::open(path)
        .map_err(|e| Error::Audio(format!("Failed to open WAV {}: {}", path.display(), e)))?;
    let spec = reader.spec();

    if spec.sample_rate != config.sample_rate {
        return Err(Error::FormatMismatch {
            path: path.display().to_string(),
            detail: format!(
                "sample rate {} Hz, expected {} Hz",
                spec.sample_rate, config.sample_rate
            ),
        });
    }
    if spec.channels != 1 {
        return Err(Error::FormatMismatch {
            path: path.display().to_string(),
            detail: format!("{} channels, expected mono", spec.channels),
        });
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Audio(format!("Failed to read samples: {}", e)))?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Audio(format!("Failed to read samples: {}", e)))?
        }
    };

    log::debug!(
        "Loaded {} ({} samples, {:.2}s)",
        path.display(),
        samples.len(),
        samples.len() as f32 / spec.sample_rate as f32
    );

    Ok(Waveform::new(samples, spec.sample_rate))
}

/// Quantize one sample to 16-bit PCM.
///
/// Values are clipped to [-1, 1], scaled by 32767 and rounded half away
/// from zero. NaN maps to 0.
pub fn quantize_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

fn pcm16_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write 16-bit mono PCM WAV to any seekable writer
pub fn write_wav<W: Write + Seek>(writer: W, samples: &[f32], sample_rate: u32) -> Result<()> {
    let mut writer = WavWriter::new(writer, pcm16_spec(sample_rate))
        .map_err(|e| Error::Audio(format!("Failed to create WAV writer: {}", e)))?;

    for &sample in samples {
        writer
            .write_sample(quantize_i16(sample))
            .map_err(|e| Error::Audio(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| Error::Audio(format!("Failed to finalize WAV: {}", e)))?;

    Ok(())
}

/// Save samples as 16-bit mono PCM at the configured sample rate
pub fn save_wav<P: AsRef<Path>>(path: P, samples: &[f32], config: &AudioConfig) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    write_wav(std::io::BufWriter::new(file), samples, config.sample_rate)?;
    log::debug!("Wrote {} ({} samples)", path.display(), samples.len());
    Ok(())
}

/// Encode samples as an in-memory WAV file
pub fn to_wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_wav(&mut cursor, samples, sample_rate)?;
    Ok(cursor.into_inner())
}
