//! Griffin-Lim phase reconstruction
//!
//! Estimates a phase consistent with a magnitude-only spectrogram by
//! alternating between the time domain and the STFT domain, each time
//! keeping the new phase estimate and restoring the target magnitude.

use crate::audio::{MagnitudeNormalizer, SpectralTransform};
use crate::config::{AudioConfig, SynthesisConfig};
use crate::{Error, Result};
use ndarray::{Array2, Zip};
use num_complex::Complex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::f32::consts::PI;
use std::time::Instant;

use super::Vocoder;

/// Bins whose estimated magnitude falls below this get a zero phase
const PHASE_EPSILON: f32 = 1e-12;

/// Iterative phase reconstructor
///
/// The initial phase is drawn uniformly from [0, 2π) with a ChaCha20 RNG
/// seeded from `seed` on every call, so equal inputs give equal outputs.
#[derive(Debug, Clone)]
pub struct GriffinLim {
    transform: SpectralTransform,
    n_iter: usize,
    momentum: f32,
    seed: u64,
}

impl GriffinLim {
    /// Create reconstructor from configuration
    pub fn new(audio: &AudioConfig, synthesis: &SynthesisConfig) -> Result<Self> {
        let transform = SpectralTransform::new(audio)?;
        Ok(Self::with_transform(transform, synthesis.griffin_lim_iters)
            .with_momentum(synthesis.momentum)
            .with_seed(synthesis.seed))
    }

    /// Create reconstructor around an existing transform
    pub fn with_transform(transform: SpectralTransform, n_iter: usize) -> Self {
        Self {
            transform,
            n_iter,
            momentum: 0.0,
            seed: 0,
        }
    }

    /// Set number of iterations
    pub fn with_iterations(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Set fast Griffin-Lim momentum (0 disables it)
    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    /// Set the initial-phase seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Underlying STFT
    pub fn transform(&self) -> &SpectralTransform {
        &self.transform
    }

    /// Number of iterations
    pub fn iterations(&self) -> usize {
        self.n_iter
    }

    /// Reconstruct a waveform from a linear magnitude spectrogram
    /// (n_fft/2+1, frames).
    ///
    /// An all-zero spectrogram yields an all-zero waveform of the matching
    /// length. Negative values are treated as their absolute value.
    pub fn reconstruct(&self, magnitude: &Array2<f32>) -> Result<Vec<f32>> {
        let n_freqs = self.transform.n_freqs();
        if magnitude.nrows() != n_freqs {
            return Err(Error::ShapeMismatch {
                expected: format!("{} frequency bins", n_freqs),
                actual: format!("{} frequency bins", magnitude.nrows()),
            });
        }
        if magnitude.iter().any(|m| !m.is_finite()) {
            return Err(Error::Audio("magnitude spectrogram contains NaN or Inf".into()));
        }

        let num_frames = magnitude.ncols();
        if num_frames == 0 {
            return Ok(Vec::new());
        }

        let magnitude = magnitude.mapv(f32::abs);
        if magnitude.iter().all(|&m| m == 0.0) {
            log::warn!("Griffin-Lim input is silent; returning silence");
            return Ok(vec![0.0; (num_frames - 1) * self.transform.hop_length()]);
        }

        let start = Instant::now();
        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        let mut spectrum = magnitude.mapv(|m| Complex::from_polar(m, rng.gen_range(0.0..2.0 * PI)));
        let mut previous = if self.momentum > 0.0 {
            Some(spectrum.clone())
        } else {
            None
        };

        let mut signal = self.transform.istft(&spectrum)?;
        for _ in 0..self.n_iter {
            let estimate = self.transform.stft(&signal)?;
            if estimate.dim() != spectrum.dim() {
                return Err(Error::ShapeMismatch {
                    expected: format!("{:?}", spectrum.dim()),
                    actual: format!("{:?}", estimate.dim()),
                });
            }

            match previous.as_mut() {
                None => {
                    Zip::from(&mut spectrum)
                        .and(&estimate)
                        .and(&magnitude)
                        .for_each(|s, &e, &m| *s = project(e, m));
                }
                Some(prev) => {
                    let alpha = self.momentum;
                    Zip::from(&mut spectrum)
                        .and(prev)
                        .and(&estimate)
                        .and(&magnitude)
                        .for_each(|s, p, &e, &m| {
                            let projected = project(e, m);
                            *s = projected + (projected - *p) * alpha;
                            *p = projected;
                        });
                }
            }

            signal = self.transform.istft(&spectrum)?;
        }

        log::debug!(
            "Griffin-Lim: {} frames, {} iterations in {:.1}ms",
            num_frames,
            self.n_iter,
            start.elapsed().as_secs_f32() * 1000.0
        );

        Ok(signal)
    }
}

/// Keep the phase of `estimate`, replace its magnitude with `magnitude`
#[inline]
fn project(estimate: Complex<f32>, magnitude: f32) -> Complex<f32> {
    let norm = estimate.norm();
    if norm > PHASE_EPSILON {
        estimate * (magnitude / norm)
    } else {
        Complex::new(magnitude, 0.0)
    }
}

/// Normalized linear spectrogram → waveform (still pre-emphasized)
///
/// Undoes the dB normalization, raises the magnitude to `power` and runs
/// Griffin-Lim.
#[derive(Debug, Clone)]
pub struct GriffinLimVocoder {
    griffin_lim: GriffinLim,
    normalizer: MagnitudeNormalizer,
    power: f32,
    sample_rate: u32,
    fingerprint: u64,
}

impl GriffinLimVocoder {
    /// Create vocoder from configuration
    pub fn new(audio: &AudioConfig, synthesis: &SynthesisConfig) -> Result<Self> {
        audio.validate()?;
        synthesis.validate()?;
        Ok(Self {
            griffin_lim: GriffinLim::new(audio, synthesis)?,
            normalizer: MagnitudeNormalizer::new(audio),
            power: synthesis.power,
            sample_rate: audio.sample_rate,
            fingerprint: audio.fingerprint(),
        })
    }

    /// Phase reconstructor
    pub fn griffin_lim(&self) -> &GriffinLim {
        &self.griffin_lim
    }
}

impl Vocoder for GriffinLimVocoder {
    fn synthesize(&self, spectrogram: &Array2<f32>) -> Result<Vec<f32>> {
        let power = self.power;
        let magnitude = self
            .normalizer
            .to_magnitude(spectrogram)
            .mapv(|m| m.powf(power));
        self.griffin_lim.reconstruct(&magnitude)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn hop_length(&self) -> usize {
        self.griffin_lim.transform().hop_length()
    }

    fn fingerprint(&self) -> Option<u64> {
        Some(self.fingerprint)
    }
}
