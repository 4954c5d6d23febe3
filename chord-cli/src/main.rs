//! # chord-detect - Command Line Front-End
//!
//! Feeds the chord detector from the command line. Three inputs stand in
//! for a live capture layer:
//! - **tones**: synthesized notes, analysed as a single frame
//! - **spectrum**: a JSON spectrum snapshot, detected as-is
//! - **pcm**: a raw mono f32 little-endian recording, analysed frame by frame
//!   on the detection worker thread
//!
//! Results are printed as JSON, one object per line unless `--pretty` is set.

use anyhow::{Context, Result, bail};
use chord_core::{
    ChordDetector, ChordResult, DetectorConfig,
    audio::{self, FrameAccumulator},
    fft::{DEFAULT_SMOOTHING, SpectrumAnalyser},
    tuning,
    worker::{DetectionWorker, SpectrumFrame},
};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Samples handed to the frame accumulator per read, mimicking a capture callback.
const CAPTURE_CHUNK: usize = 1024;
/// Frames waiting for the worker before submission blocks.
const WORKER_QUEUE: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "chord-detect", version, about = "Identify the chord sounding in audio or spectrum data")]
struct Cli {
    /// Detector configuration file (JSON); defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize notes (e.g. C4 E4 G4) and detect the chord they form.
    Tones {
        #[arg(required = true)]
        notes: Vec<String>,
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
        #[arg(long, default_value_t = 8192)]
        fft_size: usize,
        /// Amplitude of each sine.
        #[arg(long, default_value_t = 0.05)]
        amplitude: f32,
    },
    /// Detect the chord in a JSON spectrum snapshot {"bins", "sampleRate", "fftSize"}.
    Spectrum { file: PathBuf },
    /// Detect chords over a raw mono f32 little-endian PCM file.
    Pcm {
        file: PathBuf,
        #[arg(long)]
        sample_rate: u32,
        #[arg(long, default_value_t = 8192)]
        fft_size: usize,
        /// Analyser smoothing time constant between frames (0..1).
        #[arg(long, default_value_t = DEFAULT_SMOOTHING)]
        smoothing: f32,
    },
}

/// A detection result tagged with the time of the frame it came from.
#[derive(Serialize)]
struct TimedResult<'a> {
    #[serde(rename = "timeSec")]
    time_sec: f64,
    #[serde(flatten)]
    result: &'a ChordResult,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DetectorConfig::load(path)?,
        None => DetectorConfig::default(),
    };
    let detector = ChordDetector::new(config)?;
    debug!("Detector config: {:?}", detector.config());

    match cli.command {
        Command::Tones {
            notes,
            sample_rate,
            fft_size,
            amplitude,
        } => {
            let result = run_tones(&detector, &notes, sample_rate, fft_size, amplitude)?;
            print_json(&result, cli.pretty)
        }
        Command::Spectrum { file } => {
            let result = run_spectrum(&detector, &file)?;
            print_json(&result, cli.pretty)
        }
        Command::Pcm {
            file,
            sample_rate,
            fft_size,
            smoothing,
        } => run_pcm(detector, &file, sample_rate, fft_size, smoothing, cli.pretty),
    }
}

fn run_tones(
    detector: &ChordDetector,
    notes: &[String],
    sample_rate: u32,
    fft_size: usize,
    amplitude: f32,
) -> Result<ChordResult> {
    let frequencies = notes
        .iter()
        .map(|name| {
            tuning::parse_note(name)
                .map(|note| note.frequency)
                .with_context(|| format!("Not a note name: {}", name))
        })
        .collect::<Result<Vec<f64>>>()?;
    info!("Synthesizing {:?} Hz", frequencies);

    let mut analyser = SpectrumAnalyser::new(fft_size)?.with_smoothing(0.0);
    let frame = audio::synthesize_tones(&frequencies, amplitude, sample_rate, analyser.fft_size());
    let spectrum = analyser.process(&frame);
    Ok(detector.detect(&spectrum, sample_rate, analyser.fft_size()))
}

fn run_spectrum(detector: &ChordDetector, path: &Path) -> Result<ChordResult> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read spectrum file {}", path.display()))?;
    let frame: SpectrumFrame = serde_json::from_str(&data)
        .with_context(|| format!("Invalid spectrum file {}", path.display()))?;
    if frame.bins.len() != frame.fft_size / 2 {
        warn!(
            "Spectrum has {} bins, expected fftSize / 2 = {}",
            frame.bins.len(),
            frame.fft_size / 2
        );
    }
    Ok(detector.detect(&frame.bins, frame.sample_rate, frame.fft_size))
}

fn run_pcm(
    detector: ChordDetector,
    path: &Path,
    sample_rate: u32,
    fft_size: usize,
    smoothing: f32,
    pretty: bool,
) -> Result<()> {
    if sample_rate == 0 {
        bail!("Sample rate must be positive");
    }
    let samples = read_pcm_f32(path)?;
    info!(
        "Read {} samples ({:.1} s) from {}",
        samples.len(),
        samples.len() as f64 / sample_rate as f64,
        path.display()
    );

    let mut analyser = SpectrumAnalyser::new(fft_size)?.with_smoothing(smoothing);
    let mut accumulator = FrameAccumulator::new(analyser.fft_size());
    let (worker, results) = DetectionWorker::spawn(detector, WORKER_QUEUE)?;

    let mut frame_count = 0usize;
    for chunk in samples.chunks(CAPTURE_CHUNK) {
        for frame in accumulator.push(chunk) {
            // The analyser runs on every frame so its smoothing stays continuous.
            let spectrum = analyser.process(&frame);
            let bins = if audio::is_audio_active(&frame, audio::ACTIVITY_THRESHOLD) {
                spectrum
            } else {
                vec![0; spectrum.len()]
            };
            if !worker.submit_wait(SpectrumFrame {
                bins,
                sample_rate,
                fft_size: analyser.fft_size(),
            }) {
                bail!("Detection worker stopped unexpectedly");
            }
            frame_count += 1;
        }
    }
    worker.finish();
    debug!(
        "Submitted {} frames, {} samples left over",
        frame_count,
        accumulator.pending()
    );

    let frame_duration = accumulator.frame_size() as f64 / sample_rate as f64;
    let mut last_name: Option<String> = None;
    for (index, result) in results.iter().enumerate() {
        if last_name.as_deref() == Some(result.name.as_str()) {
            continue;
        }
        print_json(
            &TimedResult {
                time_sec: index as f64 * frame_duration,
                result: &result,
            },
            pretty,
        )?;
        last_name = Some(result.name);
    }
    Ok(())
}

/// Reads raw mono f32 little-endian samples.
fn read_pcm_f32(path: &Path) -> Result<Vec<f32>> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read PCM file {}", path.display()))?;
    if bytes.len() % 4 != 0 {
        warn!(
            "PCM file length {} is not a multiple of 4, ignoring trailing bytes",
            bytes.len()
        );
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}
