//! Chord scan tool - prints one chord per fixed window of an audio file.

use chordsheet::chord_scan::{effective_window, scan_chords, DEFAULT_WINDOW_SECONDS};
use chordsheet::{
    AudioDecoder, ChromaExtractor, ChromaMethod, Config, HarmonicSeparator, StrategyKind,
    SymphoniaDecoder,
};
use clap::Parser;
use log::LevelFilter;
use std::error::Error;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "chord_scan", version, about = "Print the chord in every window of a song")]
struct Args {
    /// Audio file (wav, mp3, flac)
    audio: PathBuf,

    /// Window length in seconds
    #[arg(long, default_value_t = DEFAULT_WINDOW_SECONDS)]
    window: f64,

    /// Chord strategy: template or root-third
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Minor third must beat the major third by this factor (root-third)
    #[arg(long)]
    minor_sensitivity: Option<f32>,

    /// Chroma flavour: stft or energy-normalized
    #[arg(long)]
    chroma: Option<ChromaMethod>,

    /// Remove percussive energy before chord detection
    #[arg(long)]
    harmonic: bool,

    /// Analyse only the first SECONDS of audio (0 = whole file)
    #[arg(long, value_name = "SECONDS")]
    max_duration: Option<f64>,

    /// Spell notes Do, Re, Mi instead of C, D, E
    #[arg(long)]
    solfege: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load().unwrap_or_else(|e| {
        log::warn!("Ignoring saved defaults: {}", e);
        Config::new()
    });
    config.merge(&Config {
        strategy: args.strategy,
        minor_sensitivity: args.minor_sensitivity,
        chroma_method: args.chroma,
        harmonic_separation: args.harmonic.then_some(true),
        max_duration: args.max_duration,
        note_naming: args.solfege.then_some(chordsheet::NoteNaming::Solfege),
        ..Config::default()
    });
    let options = config.resolve()?;

    let decoded = SymphoniaDecoder::new(options.max_duration_seconds).decode_file(&args.audio)?;
    let waveform = if options.harmonic_separation {
        HarmonicSeparator::default().harmonic(&decoded.waveform)
    } else {
        decoded.waveform
    };

    let extractor = ChromaExtractor::new(options.chroma_method);
    let strategy = options.strategy.build(options.minor_sensitivity);
    let window = effective_window(args.window);
    let windows = scan_chords(&waveform, &extractor, strategy.as_ref(), window);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&windows)?);
        return Ok(());
    }

    println!(
        "{}: {:.2}s, {} windows of {}s ({} strategy)",
        args.audio.display(),
        waveform.duration(),
        windows.len(),
        window,
        strategy.name()
    );
    for window in &windows {
        println!("{}", window.describe(options.note_naming));
    }
    Ok(())
}
