//! gst-audio CLI - feature extraction and Griffin-Lim synthesis
//!
//! Command-line interface for the gst-audio signal-processing core

use clap::{Parser, Subcommand};
use gst_audio::{
    audio::{read_npy, write_npy},
    pipeline::{preprocess_dataset, DatasetLayout},
    Config, FeatureExtractor, Result, Synthesizer,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "gst-audio",
    about = "Spectral analysis and Griffin-Lim synthesis for style-token Tacotron",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract mel/linear training features for a dataset
    Preprocess {
        /// Whole index list file path
        whole_list: PathBuf,

        /// Train index list file path
        train_list: PathBuf,

        /// Valid index list file path
        valid_list: PathBuf,

        /// Metadata file path (id|...|text)
        metadata: PathBuf,

        /// Directory holding {id}.wav
        wav_dir: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "training")]
        out_path: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Worker threads (defaults to CPU count)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Reconstruct a waveform from a normalized linear spectrogram (.npy)
    Synthesize {
        /// Linear spectrogram, shape (n_fft/2+1, frames)
        #[arg(short, long)]
        input: PathBuf,

        /// Output audio file path
        #[arg(short, long, default_value = "output.wav")]
        output: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Griffin-Lim iterations
        #[arg(long)]
        iterations: Option<usize>,

        /// Initial-phase seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Extract a style-reference mel spectrogram, shape (frames, num_mels)
    ReferenceMel {
        /// Reference audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output .npy path
        #[arg(short, long, default_value = "reference_mel.npy")]
        output: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate default configuration file
    InitConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Show information about the system
    Info {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run benchmarks
    Benchmark {
        /// Number of iterations
        #[arg(short, long, default_value = "10")]
        iterations: usize,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) if p.extension().map_or(false, |e| e == "json") => Config::load_json(p),
        Some(p) => Config::load(p),
        None => {
            log::info!("No config given, using defaults");
            Ok(Config::default())
        }
    }
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Preprocess {
            whole_list,
            train_list,
            valid_list,
            metadata,
            wav_dir,
            out_path,
            config,
            workers,
        } => {
            let mut config = load_config(config.as_deref())?;
            if workers.is_some() {
                config.preprocess.num_workers = workers;
            }

            let layout = DatasetLayout {
                whole_list,
                train_list,
                valid_list,
                metadata,
                wav_dir,
                out_dir: out_path.clone(),
            };
            let report = preprocess_dataset(&layout, &config)?;

            println!("✓ Processed {} utterances", report.processed.len());
            println!("  train set size: {}", report.train_lines);
            println!("  valid set size: {}", report.valid_lines);
            if !report.is_complete() {
                println!("⚠ {} utterances failed:", report.failed.len());
                for (id, reason) in &report.failed {
                    println!("  {}: {}", id, reason);
                }
            }
            println!("✓ Features written to: {}", out_path.display());
        }

        Commands::Synthesize {
            input,
            output,
            config,
            iterations,
            seed,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(n) = iterations {
                config.synthesis.griffin_lim_iters = n;
            }
            if let Some(s) = seed {
                config.synthesis.seed = s;
            }

            let spectrogram = read_npy(&input)?;
            log::info!(
                "Loaded spectrogram {:?} from {}",
                spectrogram.dim(),
                input.display()
            );

            let synthesizer = Synthesizer::new(&config)?;
            let result = synthesizer.synthesize_to_file(&spectrogram, &output)?;

            println!("✓ Synthesis complete: {}", output.display());
            println!(
                "  duration {} ({} samples, trim at {}, {} frames)",
                result.duration_formatted(),
                result.audio.len(),
                result.end_point,
                result.n_frames
            );
        }

        Commands::ReferenceMel {
            input,
            output,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let extractor = FeatureExtractor::new(&config.audio)?;
            let mel = extractor.reference_mel(&input)?;
            write_npy(&output, &mel)?;

            println!("✓ Reference mel {:?} saved to: {}", mel.dim(), output.display());
        }

        Commands::InitConfig { output } => {
            log::info!("Creating default configuration...");

            Config::create_default(&output)?;

            println!("✓ Configuration saved to: {}", output.display());
        }

        Commands::Info { config } => {
            let config = load_config(config.as_deref())?;
            let audio = &config.audio;

            println!("gst-audio - Tacotron signal-processing core");
            println!("===========================================");
            println!("Version: {}", gst_audio::VERSION);
            println!("Platform: {}", std::env::consts::OS);
            println!("Architecture: {}", std::env::consts::ARCH);
            println!();
            println!("Sample Rate: {} Hz", audio.sample_rate);
            println!("FFT Size: {}", audio.n_fft());
            println!("Hop Length: {}", audio.hop_length());
            println!("Window Length: {}", audio.win_length());
            println!(
                "Mel Bands: {} ({:?}, {}-{} Hz)",
                audio.num_mels,
                audio.mel_scale,
                audio.fmin,
                audio.fmax_hz()
            );
            println!(
                "Levels: ref {} dB, floor {} dB",
                audio.ref_level_db, audio.min_level_db
            );
            println!(
                "Griffin-Lim: {} iterations, power {}, momentum {}",
                config.synthesis.griffin_lim_iters,
                config.synthesis.power,
                config.synthesis.momentum
            );
            println!("Config fingerprint: {:016x}", audio.fingerprint());
            println!();
            println!("CPU Cores: {}", num_cpus::get());
            println!("Physical Cores: {}", num_cpus::get_physical());
        }

        Commands::Benchmark { iterations } => {
            log::info!("Running benchmarks ({} iterations)...", iterations);
            let config = Config::default();

            benchmark_analysis(&config, iterations)?;
            benchmark_synthesis(&config, iterations)?;

            println!("✓ Benchmarks complete");
        }
    }

    Ok(())
}

fn test_signal(sample_rate: u32, seconds: f32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * seconds) as usize;
    (0..num_samples)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn benchmark_analysis(config: &Config, iterations: usize) -> Result<()> {
    use std::time::Instant;

    println!("\nFeature Extraction Benchmark");
    println!("----------------------------");

    let extractor = FeatureExtractor::new(&config.audio)?;
    let signal = test_signal(config.audio.sample_rate, 1.0);

    let start = Instant::now();
    for _ in 0..iterations {
        extractor.extract(&signal)?;
    }
    let elapsed = start.elapsed();

    let per_iter = elapsed.as_secs_f32() / iterations.max(1) as f32;
    println!(
        "  Signal length: {} samples ({:.2}s)",
        signal.len(),
        signal.len() as f32 / config.audio.sample_rate as f32
    );
    println!("  Iterations: {}", iterations);
    println!("  Total time: {:.3}s", elapsed.as_secs_f32());
    println!("  Per iteration: {:.3}ms", per_iter * 1000.0);
    println!("  Throughput: {:.1}x real-time", 1.0 / per_iter);
    Ok(())
}

fn benchmark_synthesis(config: &Config, iterations: usize) -> Result<()> {
    use std::time::Instant;

    println!("\nGriffin-Lim Benchmark");
    println!("---------------------");

    let extractor = FeatureExtractor::new(&config.audio)?;
    let synthesizer = Synthesizer::new(config)?;
    let linear = extractor.spectrogram(&test_signal(config.audio.sample_rate, 1.0))?;

    let start = Instant::now();
    let mut audio_duration = 0.0;
    for _ in 0..iterations {
        audio_duration = synthesizer.synthesize(&linear)?.duration;
    }
    let elapsed = start.elapsed();

    let per_iter = elapsed.as_secs_f32() / iterations.max(1) as f32;
    println!("  Frames: {}", linear.ncols());
    println!("  Audio duration: {:.2}s", audio_duration);
    println!("  Iterations: {}", iterations);
    println!("  Total time: {:.3}s", elapsed.as_secs_f32());
    println!("  Per iteration: {:.3}ms", per_iter * 1000.0);
    if audio_duration > 0.0 {
        println!("  RTF: {:.3}x", per_iter / audio_duration);
    }
    Ok(())
}
