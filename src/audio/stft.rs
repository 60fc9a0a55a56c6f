//! Short-Time Fourier Transform and its inverse
//!
//! Frames are centered: the signal is zero-padded by `n_fft / 2` at the
//! start so frame 0 is centered on sample 0, and padded at the end so the
//! final partial frame is kept. A periodic Hann window of `win_length`
//! samples sits in the middle of each `n_fft` frame.

use crate::config::AudioConfig;
use crate::{Error, Result};
use ndarray::Array2;
use num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Overlap-add normalization is skipped where the summed squared window
/// falls below this value.
const WINDOW_SUM_FLOOR: f32 = 1e-8;

/// Compute periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / size as f32).cos()))
        .collect()
}

/// Forward/inverse STFT with pre-planned FFTs
///
/// Cheap to share across threads: the plans are immutable and every call
/// allocates its own scratch buffers.
#[derive(Clone)]
pub struct SpectralTransform {
    n_fft: usize,
    hop_length: usize,
    win_length: usize,
    /// Hann window zero-padded (centered) to `n_fft`
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    ifft: Arc<dyn ComplexToReal<f32>>,
    fingerprint: Option<u64>,
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("n_fft", &self.n_fft)
            .field("hop_length", &self.hop_length)
            .field("win_length", &self.win_length)
            .finish()
    }
}

impl SpectralTransform {
    /// Create transform from audio configuration
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let mut transform =
            Self::with_params(config.n_fft(), config.hop_length(), config.win_length())?;
        transform.fingerprint = Some(config.fingerprint());
        Ok(transform)
    }

    /// Create transform from explicit sizes
    pub fn with_params(n_fft: usize, hop_length: usize, win_length: usize) -> Result<Self> {
        if n_fft < 2 || n_fft % 2 != 0 {
            return Err(Error::Config(format!("n_fft must be even and >= 2, got {}", n_fft)));
        }
        if hop_length == 0 {
            return Err(Error::Config("hop_length must be > 0".into()));
        }
        if win_length == 0 || win_length > n_fft {
            return Err(Error::Config(format!(
                "win_length {} must be in 1..={}",
                win_length, n_fft
            )));
        }

        let mut window = vec![0.0f32; n_fft];
        let offset = (n_fft - win_length) / 2;
        window[offset..offset + win_length].copy_from_slice(&hann_window(win_length));

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let ifft = planner.plan_fft_inverse(n_fft);

        Ok(Self {
            n_fft,
            hop_length,
            win_length,
            window,
            fft,
            ifft,
            fingerprint: None,
        })
    }

    /// FFT size
    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    /// Hop length in samples
    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Window length in samples
    pub fn win_length(&self) -> usize {
        self.win_length
    }

    /// Number of frequency bins per frame
    pub fn n_freqs(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Fingerprint of the config this transform was built from
    pub fn fingerprint(&self) -> Option<u64> {
        self.fingerprint
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn num_frames(&self, len: usize) -> usize {
        1 + (len + self.hop_length - 1) / self.hop_length
    }

    /// Compute STFT
    ///
    /// # Returns
    /// Complex STFT matrix (n_fft/2+1, time_frames)
    pub fn stft(&self, signal: &[f32]) -> Result<Array2<Complex<f32>>> {
        let pad = self.n_fft / 2;
        let num_frames = self.num_frames(signal.len());
        let padded_len = (num_frames - 1) * self.hop_length + self.n_fft;

        let mut padded = vec![0.0f32; padded_len];
        padded[pad..pad + signal.len()].copy_from_slice(signal);

        let n_freqs = self.n_freqs();
        let mut stft_matrix = Array2::zeros((n_freqs, num_frames));
        let mut input_buffer = self.fft.make_input_vec();
        let mut output_buffer = self.fft.make_output_vec();

        for frame_idx in 0..num_frames {
            let start = frame_idx * self.hop_length;
            let frame = &padded[start..start + self.n_fft];
            for ((dst, &x), &w) in input_buffer.iter_mut().zip(frame).zip(&self.window) {
                *dst = x * w;
            }

            self.fft
                .process(&mut input_buffer, &mut output_buffer)
                .map_err(|e| Error::Audio(format!("FFT failed: {}", e)))?;

            for (freq_idx, &val) in output_buffer.iter().enumerate() {
                stft_matrix[[freq_idx, frame_idx]] = val;
            }
        }

        Ok(stft_matrix)
    }

    /// Compute inverse STFT by windowed overlap-add.
    ///
    /// Each sample is divided by the summed squared window at that
    /// position. The output holds `hop_length * (frames - 1)` samples,
    /// which covers the whole signal the spectrogram was computed from;
    /// callers slice it back to the input length when they know it.
    pub fn istft(&self, stft_matrix: &Array2<Complex<f32>>) -> Result<Vec<f32>> {
        let n_freqs = self.n_freqs();
        if stft_matrix.nrows() != n_freqs {
            return Err(Error::ShapeMismatch {
                expected: format!("{} frequency bins", n_freqs),
                actual: format!("{} frequency bins", stft_matrix.nrows()),
            });
        }

        let num_frames = stft_matrix.ncols();
        if num_frames == 0 {
            return Ok(Vec::new());
        }

        let total_len = (num_frames - 1) * self.hop_length + self.n_fft;
        let mut signal = vec![0.0f32; total_len];
        let mut window_sum = vec![0.0f32; total_len];

        let mut spectrum = self.ifft.make_input_vec();
        let mut frame = self.ifft.make_output_vec();
        let scale = 1.0 / self.n_fft as f32;

        for frame_idx in 0..num_frames {
            for (freq_idx, dst) in spectrum.iter_mut().enumerate() {
                *dst = stft_matrix[[freq_idx, frame_idx]];
            }
            // DC and Nyquist bins of a real signal have no imaginary part
            spectrum[0].im = 0.0;
            spectrum[n_freqs - 1].im = 0.0;

            self.ifft
                .process(&mut spectrum, &mut frame)
                .map_err(|e| Error::Audio(format!("Inverse FFT failed: {}", e)))?;

            let start = frame_idx * self.hop_length;
            for (i, (&sample, &w)) in frame.iter().zip(&self.window).enumerate() {
                signal[start + i] += sample * scale * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &norm) in signal.iter_mut().zip(&window_sum) {
            if norm > WINDOW_SUM_FLOOR {
                *sample /= norm;
            }
        }

        let pad = self.n_fft / 2;
        Ok(signal[pad..pad + (num_frames - 1) * self.hop_length].to_vec())
    }
}

/// Compute magnitude spectrogram from STFT
pub fn magnitude_spectrogram(stft_matrix: &Array2<Complex<f32>>) -> Array2<f32> {
    stft_matrix.mapv(|c| c.norm())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn sine(freq: f32, sr: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn test_hann_window() {
        let window = hann_window(1024);
        assert_eq!(window.len(), 1024);
        assert!(window[0].abs() < 1e-6);
        assert!((window[512] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_window_centered_in_frame() {
        let transform = SpectralTransform::with_params(16, 2, 8).unwrap();
        assert!(transform.window[..4].iter().all(|&w| w == 0.0));
        assert!(transform.window[12..].iter().all(|&w| w == 0.0));
        assert!((transform.window[8] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stft_shape() {
        let transform = SpectralTransform::with_params(1024, 256, 1024).unwrap();
        let signal = sine(440.0, 22050, 2205);
        let stft = transform.stft(&signal).unwrap();
        assert_eq!(stft.shape()[0], 513);
        // 1 + ceil(2205 / 256)
        assert_eq!(stft.shape()[1], 10);
    }

    #[test]
    fn test_stft_peak_bin() {
        let sr = 16000;
        let transform = SpectralTransform::with_params(512, 128, 512).unwrap();
        // 1000 Hz lands exactly on bin 32 (16000 / 512 = 31.25 Hz per bin)
        let signal = sine(1000.0, sr, 8000);
        let mag = magnitude_spectrogram(&transform.stft(&signal).unwrap());
        let mid = mag.ncols() / 2;
        let peak = (0..mag.nrows())
            .max_by(|&a, &b| mag[[a, mid]].partial_cmp(&mag[[b, mid]]).unwrap())
            .unwrap();
        assert_eq!(peak, 32);
    }

    #[test]
    fn test_round_trip_reconstruction() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let signal: Vec<f32> = (0..5000).map(|_| rng.gen_range(-1.0f32..1.0)).collect();

        for (n_fft, hop, win) in [(512, 128, 512), (1024, 250, 800), (2048, 250, 1000)] {
            let transform = SpectralTransform::with_params(n_fft, hop, win).unwrap();
            let stft = transform.stft(&signal).unwrap();
            let rebuilt = transform.istft(&stft).unwrap();
            assert!(rebuilt.len() >= signal.len());

            let max_err = signal
                .iter()
                .zip(&rebuilt)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max);
            assert!(max_err < 1e-4, "({}, {}, {}): max error {}", n_fft, hop, win, max_err);
        }
    }

    #[test]
    fn test_frame_count_stable_through_inverse() {
        let transform = SpectralTransform::with_params(512, 100, 400).unwrap();
        let signal = sine(300.0, 16000, 1234);
        let stft = transform.stft(&signal).unwrap();
        let rebuilt = transform.istft(&stft).unwrap();
        let again = transform.stft(&rebuilt).unwrap();
        assert_eq!(stft.dim(), again.dim());
    }

    #[test]
    fn test_empty_signal() {
        let transform = SpectralTransform::with_params(512, 128, 512).unwrap();
        let stft = transform.stft(&[]).unwrap();
        assert_eq!(stft.dim(), (257, 1));
        assert!(stft.iter().all(|c| c.norm() == 0.0));
        assert!(transform.istft(&stft).unwrap().is_empty());
    }

    #[test]
    fn test_istft_rejects_wrong_bin_count() {
        let transform = SpectralTransform::with_params(512, 128, 512).unwrap();
        let bogus = Array2::<Complex<f32>>::zeros((100, 4));
        assert!(matches!(
            transform.istft(&bogus),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_params() {
        assert!(SpectralTransform::with_params(511, 128, 256).is_err());
        assert!(SpectralTransform::with_params(512, 0, 256).is_err());
        assert!(SpectralTransform::with_params(512, 128, 1024).is_err());
    }
}
