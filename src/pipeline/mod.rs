//! Analysis and synthesis pipelines
//!
//! Analysis turns waveforms into normalized mel/linear features, synthesis
//! turns a normalized linear spectrogram back into a trimmed waveform.

mod analysis;
mod preprocess;
mod synthesis;

pub use analysis::{FeatureExtractor, Features};
pub use preprocess::{
    preprocess_dataset, process_utterance, read_id_list, read_metadata, DatasetLayout,
    PreprocessReport,
};
pub use synthesis::{SynthesisResult, Synthesizer};
