//! gst-audio - Signal-processing core for style-token Tacotron in Rust
//!
//! Converts between waveforms and the normalized spectrograms that cross
//! the acoustic-model boundary, in both directions.
//!
//! # Features
//! - Pre-emphasis, STFT/iSTFT and Slaney or HTK mel projection
//! - Bounded dB normalization of mel and linear magnitudes
//! - Seeded Griffin-Lim phase reconstruction with optional momentum
//! - Trailing-silence endpoint detection
//! - Parallel dataset preprocessing with Rayon
//!
//! # Example
//! ```no_run
//! use gst_audio::{Config, FeatureExtractor, Synthesizer};
//!
//! let config = Config::load("config.yaml").unwrap();
//! let extractor = FeatureExtractor::new(&config.audio).unwrap();
//! let synthesizer = Synthesizer::new(&config).unwrap();
//!
//! let wav = gst_audio::audio::load_wav("speech.wav", &config.audio).unwrap();
//! let features = extractor.extract(&wav.samples).unwrap();
//! let result = synthesizer.synthesize(&features.linear).unwrap();
//! result.save("resynthesized.wav").unwrap();
//! ```

// Allow traditional for loops - often clearer for audio DSP code
#![allow(clippy::needless_range_loop)]

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod vocoder;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{FeatureExtractor, Features, SynthesisResult, Synthesizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
