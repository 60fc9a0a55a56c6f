//! Vocoder module for spectrogram to waveform conversion
//!
//! Griffin-Lim phase reconstruction behind a small `Vocoder` trait

mod griffin_lim;

pub use griffin_lim::{GriffinLim, GriffinLimVocoder};

use crate::Result;
use ndarray::Array2;

/// Vocoder trait for spectrogram-to-waveform conversion
pub trait Vocoder {
    /// Convert a normalized spectrogram (bins, frames) to a waveform
    fn synthesize(&self, spectrogram: &Array2<f32>) -> Result<Vec<f32>>;

    /// Get sample rate
    fn sample_rate(&self) -> u32;

    /// Get hop length (for timing calculations)
    fn hop_length(&self) -> usize;

    /// Fingerprint of the audio config the vocoder was built from, if known
    fn fingerprint(&self) -> Option<u64> {
        None
    }
}
