//! Audio processing module for gst-audio
//!
//! Waveform I/O, pre-emphasis, STFT/iSTFT, mel projection, magnitude
//! normalization and endpoint detection.

mod dsp;
mod endpoint;
mod io;
pub mod mel;
pub mod normalize;
pub mod npy;
pub mod stft;

pub use dsp::{compute_peak, compute_rms, normalize_peak, Preemphasis};
pub use endpoint::EndpointDetector;
pub use io::{load_wav, quantize_i16, save_wav, to_wav_bytes, write_wav, Waveform};
pub use mel::{MelFilterbank, MelFilterbankCache, MelScale};
pub use normalize::{amp_to_db, db_to_amp, MagnitudeNormalizer};
pub use npy::{read_npy, write_npy};
pub use stft::{magnitude_spectrogram, SpectralTransform};
