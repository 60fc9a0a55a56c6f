//! Digital Signal Processing utilities

use crate::config::AudioConfig;

/// First-order pre-emphasis filter and its exact inverse
///
/// Forward: `y[n] = x[n] - k * x[n-1]`, inverse: `x[n] = y[n] + k * x[n-1]`,
/// both with `x[-1] = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preemphasis {
    coef: f32,
}

impl Preemphasis {
    /// Create filter with explicit coefficient
    pub fn new(coef: f32) -> Self {
        Self { coef }
    }

    /// Create filter from audio configuration
    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.preemphasis)
    }

    /// Filter coefficient
    pub fn coef(&self) -> f32 {
        self.coef
    }

    /// Apply pre-emphasis (high-pass)
    pub fn apply(&self, signal: &[f32]) -> Vec<f32> {
        let mut output = Vec::with_capacity(signal.len());
        let mut prev = 0.0f32;
        for &x in signal {
            output.push(x - self.coef * prev);
            prev = x;
        }
        output
    }

    /// Undo pre-emphasis.
    ///
    /// Strictly sequential: each sample depends on the previously
    /// reconstructed one. Accumulates in f64 so long utterances do not
    /// drift.
    pub fn invert(&self, signal: &[f32]) -> Vec<f32> {
        let coef = self.coef as f64;
        let mut output = Vec::with_capacity(signal.len());
        let mut prev = 0.0f64;
        for &y in signal {
            let x = y as f64 + coef * prev;
            output.push(x as f32);
            prev = x;
        }
        output
    }

    /// Undo pre-emphasis in place
    pub fn invert_in_place(&self, signal: &mut [f32]) {
        let coef = self.coef as f64;
        let mut prev = 0.0f64;
        for sample in signal.iter_mut() {
            let x = *sample as f64 + coef * prev;
            *sample = x as f32;
            prev = x;
        }
    }
}

/// Compute peak amplitude
pub fn compute_peak(signal: &[f32]) -> f32 {
    signal.iter().map(|x| x.abs()).fold(0.0f32, f32::max)
}

/// Compute RMS energy
pub fn compute_rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|x| x * x).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Rescale so the peak becomes `target`.
///
/// Only applied when the signal clips (peak > 1.0) or `always` is set.
/// Silent input is returned unchanged. Returns `true` when the signal was
/// rescaled.
pub fn normalize_peak(signal: &mut [f32], target: f32, always: bool) -> bool {
    let peak = compute_peak(signal);
    if peak < 1e-8 || !(always || peak > 1.0) {
        return false;
    }

    let scale = target / peak;
    for sample in signal.iter_mut() {
        *sample *= scale;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn random_signal(len: usize, seed: u64) -> Vec<f32> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }

    #[test]
    fn test_preemphasis_first_sample_passes_through() {
        let filter = Preemphasis::new(0.97);
        let y = filter.apply(&[0.5, 0.5, 0.5]);
        assert_eq!(y[0], 0.5);
        assert!((y[1] - 0.5 * 0.03).abs() < 1e-7);
    }

    #[test]
    fn test_preemphasis_round_trip() {
        for (seed, coef) in [(1u64, 0.97f32), (2, 0.5), (3, 0.0), (4, 0.9)] {
            let filter = Preemphasis::new(coef);
            let x = random_signal(20000, seed);
            let back = filter.invert(&filter.apply(&x));
            let max_err = x
                .iter()
                .zip(&back)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max);
            assert!(max_err < 1e-5, "coef {}: max error {}", coef, max_err);
        }
    }

    #[test]
    fn test_zero_coefficient_is_identity() {
        let filter = Preemphasis::new(0.0);
        let x = random_signal(64, 7);
        assert_eq!(filter.apply(&x), x);
        assert_eq!(filter.invert(&x), x);
    }

    #[test]
    fn test_invert_in_place_matches_invert() {
        let filter = Preemphasis::new(0.97);
        let y = random_signal(500, 9);
        let mut inplace = y.clone();
        filter.invert_in_place(&mut inplace);
        assert_eq!(inplace, filter.invert(&y));
    }

    #[test]
    fn test_empty_signal() {
        let filter = Preemphasis::new(0.97);
        assert!(filter.apply(&[]).is_empty());
        assert!(filter.invert(&[]).is_empty());
    }

    #[test]
    fn test_normalize_peak_only_when_clipping() {
        let mut quiet = vec![0.1, -0.5, 0.3];
        assert!(!normalize_peak(&mut quiet, 0.9, false));
        assert_eq!(quiet, vec![0.1, -0.5, 0.3]);

        let mut loud = vec![0.5, -2.0, 1.0];
        assert!(normalize_peak(&mut loud, 0.9, false));
        assert!((compute_peak(&loud) - 0.9).abs() < 1e-6);

        let mut forced = vec![0.1, -0.5, 0.3];
        assert!(normalize_peak(&mut forced, 0.9, true));
        assert!((forced[1] + 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_peak_silence() {
        let mut silence = vec![0.0; 10];
        assert!(!normalize_peak(&mut silence, 0.9, true));
        assert!(silence.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_rms() {
        assert_eq!(compute_rms(&[]), 0.0);
        assert!((compute_rms(&[1.0, -1.0]) - 1.0).abs() < 1e-6);
    }
}
