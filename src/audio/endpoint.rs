//! Trailing-silence detection for reconstructed waveforms

use super::dsp::compute_rms;
use super::normalize::db_to_amp;
use crate::config::{AudioConfig, SynthesisConfig};

/// Finds where speech ends by scanning fixed-size frames backward from the
/// end of the waveform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointDetector {
    /// Frame RMS level (dBFS) that counts as non-silent
    threshold_db: f32,
    /// Frame size in samples
    frame_length: usize,
}

impl EndpointDetector {
    /// Create detector from configuration
    pub fn new(audio: &AudioConfig, synthesis: &SynthesisConfig) -> Self {
        Self::with_params(
            synthesis.endpoint_threshold_db,
            synthesis.endpoint_frame.to_samples(audio.sample_rate),
        )
    }

    /// Create detector with explicit threshold and frame size
    pub fn with_params(threshold_db: f32, frame_length: usize) -> Self {
        Self {
            threshold_db,
            frame_length: frame_length.max(1),
        }
    }

    /// Frame size in samples
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Index one past the end of the last frame whose level exceeds the
    /// threshold.
    ///
    /// Frames are aligned to the end of the signal. When no frame exceeds
    /// the threshold the whole signal is kept and the full length is
    /// returned, never 0.
    pub fn find_endpoint(&self, signal: &[f32]) -> usize {
        // Compared in the linear domain so thresholds below the dB floor
        // still treat digital silence as silent
        let threshold = db_to_amp(self.threshold_db);
        let mut end = signal.len();
        while end > 0 {
            let start = end.saturating_sub(self.frame_length);
            if compute_rms(&signal[start..end]) > threshold {
                return end;
            }
            end = start;
        }

        if !signal.is_empty() {
            log::warn!(
                "No frame above {} dB in {} samples; keeping full length",
                self.threshold_db,
                signal.len()
            );
        }
        signal.len()
    }

    /// Slice off the trailing silence
    pub fn trim<'a>(&self, signal: &'a [f32]) -> &'a [f32] {
        &signal[..self.find_endpoint(signal)]
    }
}
