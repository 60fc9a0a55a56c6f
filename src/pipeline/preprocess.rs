//! Batch dataset preprocessing
//!
//! Maps feature extraction over every utterance of a dataset on a bounded
//! worker pool, writes `mel/{id}.npy` and `linear/{id}.npy`, then the
//! `train.txt` / `valid.txt` manifests (`id|frames|text`).

use super::analysis::FeatureExtractor;
use crate::audio::{write_npy, MelFilterbankCache};
use crate::config::{Config, PreprocessConfig};
use crate::{Error, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Input and output locations of a dataset
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    /// Every utterance id to process, one per line
    pub whole_list: PathBuf,
    /// Training split ids
    pub train_list: PathBuf,
    /// Validation split ids
    pub valid_list: PathBuf,
    /// Metadata file, `id|...|text` per line
    pub metadata: PathBuf,
    /// Directory holding `{id}.wav`
    pub wav_dir: PathBuf,
    /// Output directory
    pub out_dir: PathBuf,
}

impl DatasetLayout {
    /// Mel feature directory
    pub fn mel_dir(&self) -> PathBuf {
        self.out_dir.join("mel")
    }

    /// Linear feature directory
    pub fn linear_dir(&self) -> PathBuf {
        self.out_dir.join("linear")
    }

    /// Source waveform for one utterance
    pub fn wav_path(&self, id: &str) -> PathBuf {
        self.wav_dir.join(format!("{}.wav", id))
    }
}

/// Outcome of a preprocessing run
#[derive(Debug, Clone, Default)]
pub struct PreprocessReport {
    /// Successfully processed utterances and their frame counts
    pub processed: Vec<(String, usize)>,
    /// Utterances that failed, with the reason
    pub failed: Vec<(String, String)>,
    /// Lines written to train.txt
    pub train_lines: usize,
    /// Lines written to valid.txt
    pub valid_lines: usize,
}

impl PreprocessReport {
    /// Check if every utterance was processed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Read an id list, one id per line; blank lines are skipped
pub fn read_id_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = read_text(path.as_ref())?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Read `id|...|text` metadata into an id → text map
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let content = read_text(path.as_ref())?;
    let mut texts = HashMap::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut fields = line.split('|');
        let id = fields.next().unwrap_or_default();
        let text = fields.last().unwrap_or_default();
        texts.insert(id.to_string(), text.to_string());
    }
    Ok(texts)
}

fn read_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Extract and store features for one utterance, returning its frame count
pub fn process_utterance(
    extractor: &FeatureExtractor,
    preprocess: &PreprocessConfig,
    layout: &DatasetLayout,
    id: &str,
) -> Result<usize> {
    let features = extractor.analyze_file(layout.wav_path(id), preprocess)?;
    write_npy(layout.mel_dir().join(format!("{}.npy", id)), &features.mel)?;
    write_npy(layout.linear_dir().join(format!("{}.npy", id)), &features.linear)?;
    Ok(features.num_frames())
}

/// Preprocess a whole dataset.
///
/// One failing utterance is logged and reported without stopping the
/// others; split entries without features are left out of the manifests.
pub fn preprocess_dataset(layout: &DatasetLayout, config: &Config) -> Result<PreprocessReport> {
    config.validate()?;
    let start = Instant::now();

    let whole_ids = read_id_list(&layout.whole_list)?;
    let train_ids = read_id_list(&layout.train_list)?;
    let valid_ids = read_id_list(&layout.valid_list)?;
    let texts = read_metadata(&layout.metadata)?;

    if whole_ids.is_empty() {
        return Err(Error::Config(format!(
            "No utterances to process, check {}",
            layout.whole_list.display()
        )));
    }

    std::fs::create_dir_all(layout.mel_dir())?;
    std::fs::create_dir_all(layout.linear_dir())?;

    let cache = MelFilterbankCache::new();
    let extractor = FeatureExtractor::with_cache(&config.audio, &cache)?;
    let workers = config.preprocess.workers();

    log::info!(
        "Preprocessing {} utterances from {} with {} workers",
        whole_ids.len(),
        layout.wav_dir.display(),
        workers
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::Config(format!("Failed to build worker pool: {}", e)))?;

    let outcomes: Vec<(String, Result<usize>)> = pool.install(|| {
        whole_ids
            .par_iter()
            .map(|id| {
                let outcome = if texts.contains_key(id) {
                    process_utterance(&extractor, &config.preprocess, layout, id)
                } else {
                    Err(Error::InvalidFormat(format!("no metadata entry for '{}'", id)))
                };
                (id.clone(), outcome)
            })
            .collect()
    });

    let mut report = PreprocessReport::default();
    let mut frames = HashMap::new();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(n) => {
                frames.insert(id.clone(), n);
                report.processed.push((id, n));
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", id, e);
                report.failed.push((id, e.to_string()));
            }
        }
    }

    report.train_lines = write_manifest(
        &layout.out_dir.join("train.txt"),
        &train_ids,
        &frames,
        &texts,
    )?;
    report.valid_lines = write_manifest(
        &layout.out_dir.join("valid.txt"),
        &valid_ids,
        &frames,
        &texts,
    )?;

    log::info!(
        "Preprocessed {}/{} utterances in {:.1}s (train {}, valid {})",
        report.processed.len(),
        whole_ids.len(),
        start.elapsed().as_secs_f32(),
        report.train_lines,
        report.valid_lines
    );

    Ok(report)
}

fn write_manifest(
    path: &Path,
    ids: &[String],
    frames: &HashMap<String, usize>,
    texts: &HashMap<String, String>,
) -> Result<usize> {
    let mut out = String::new();
    let mut lines = 0;
    for id in ids {
        match (frames.get(id), texts.get(id)) {
            (Some(n), Some(text)) => {
                out.push_str(&format!("{}|{}|{}\n", id, n, text));
                lines += 1;
            }
            _ => log::warn!("{} has no features, left out of {}", id, path.display()),
        }
    }
    std::fs::write(path, out)?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_id_list_skips_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "a001\n\n  a002  \r\na003\n").unwrap();
        assert_eq!(read_id_list(&path).unwrap(), vec!["a001", "a002", "a003"]);
    }

    #[test]
    fn test_metadata_uses_last_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.csv");
        std::fs::write(&path, "a001|raw text|Normalized text.\na002|Only one.\n").unwrap();

        let texts = read_metadata(&path).unwrap();
        assert_eq!(texts["a001"], "Normalized text.");
        assert_eq!(texts["a002"], "Only one.");
    }

    #[test]
    fn test_missing_list() {
        assert!(matches!(
            read_id_list("/nonexistent/ids.txt"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_manifest_skips_ids_without_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.txt");
        let ids: Vec<String> = ["a001", "a002", "a003"].iter().map(|s| s.to_string()).collect();
        let frames: HashMap<String, usize> =
            [("a001".to_string(), 120), ("a003".to_string(), 87)].into_iter().collect();
        let texts: HashMap<String, String> = ids
            .iter()
            .map(|id| (id.clone(), format!("Text of {}.", id)))
            .collect();

        let lines = write_manifest(&path, &ids, &frames, &texts).unwrap();
        assert_eq!(lines, 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "a001|120|Text of a001.\na003|87|Text of a003.\n"
        );
    }

    #[test]
    fn test_layout_paths() {
        let layout = DatasetLayout {
            whole_list: "whole.txt".into(),
            train_list: "train_ids.txt".into(),
            valid_list: "valid_ids.txt".into(),
            metadata: "metadata.csv".into(),
            wav_dir: PathBuf::from("wavs"),
            out_dir: PathBuf::from("training"),
        };
        assert_eq!(layout.wav_path("a001"), PathBuf::from("wavs/a001.wav"));
        assert_eq!(layout.mel_dir(), PathBuf::from("training/mel"));
        assert_eq!(layout.linear_dir(), PathBuf::from("training/linear"));
    }
}
