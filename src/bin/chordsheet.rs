//! Chord sheet generator: audio plus lyrics timing in, chords over lyrics out.

use chordsheet::chord::chord_name;
use chordsheet::transcription::TranscriptionService;
use chordsheet::{
    ChordSheetPipeline, ChromaMethod, Config, GapPolicy, NoteNaming, StrategyKind,
    SymphoniaDecoder, TimelineEvent, TranscriptFile, TranscriptionQuality, WhisperHttpClient,
};
use clap::Parser;
use log::LevelFilter;
use std::error::Error;
use std::path::PathBuf;
use std::process;

/// Longest lyric line before wrapping, in characters.
const LINE_WIDTH: usize = 64;

#[derive(Parser, Debug)]
#[command(
    name = "chordsheet",
    version,
    about = "Detect chords in a song and print them over its lyrics",
    after_help = "Defaults can be saved to ~/.state/chordsheet/defaults.toml using --save-defaults.\n\
                  Saved defaults override built-in defaults, and command-line options override both."
)]
struct Args {
    /// Audio file (wav, mp3, flac)
    audio: Option<PathBuf>,

    /// Whisper-style JSON transcript with segment (and word) timings
    #[arg(long, conflicts_with = "whisper_url")]
    transcript: Option<PathBuf>,

    /// OpenAI-compatible transcription server, e.g. http://localhost:8000
    #[arg(long)]
    whisper_url: Option<String>,

    /// Transcription language (detected when omitted)
    #[arg(long)]
    language: Option<String>,

    /// Transcription model size: tiny, base, small
    #[arg(long)]
    quality: Option<TranscriptionQuality>,

    /// Seconds without lyrics that count as an instrumental gap
    #[arg(long)]
    gap_threshold: Option<f64>,

    /// Gap reporting: single (one marker per gap) or windowed
    #[arg(long)]
    gap_policy: Option<GapPolicy>,

    /// Window length in seconds for the windowed gap policy
    #[arg(long)]
    gap_window: Option<f64>,

    /// Chord strategy: template or root-third
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Minor third must beat the major third by this factor (root-third)
    #[arg(long)]
    minor_sensitivity: Option<f32>,

    /// Chroma flavour: stft or energy-normalized
    #[arg(long)]
    chroma: Option<ChromaMethod>,

    /// One chord decision per phrase instead of per word
    #[arg(long)]
    phrase_level: bool,

    /// Remove percussive energy before chord detection
    #[arg(long)]
    harmonic: bool,

    /// Analyse only the first SECONDS of audio (0 = whole file)
    #[arg(long, value_name = "SECONDS")]
    max_duration: Option<f64>,

    /// Spell notes Do, Re, Mi instead of C, D, E
    #[arg(long)]
    solfege: bool,

    /// Print the event sequence as JSON
    #[arg(long)]
    json: bool,

    /// Show saved default configuration from file and exit
    #[arg(long)]
    show_saved_defaults: bool,

    /// Save current command-line options as defaults and exit
    #[arg(long)]
    save_defaults: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Options given explicitly on the command line.
    fn cmdline_config(&self) -> Config {
        Config {
            transcription_quality: self.quality,
            gap_threshold: self.gap_threshold,
            minor_sensitivity: self.minor_sensitivity,
            word_level: self.phrase_level.then_some(false),
            harmonic_separation: self.harmonic.then_some(true),
            strategy: self.strategy,
            gap_policy: self.gap_policy,
            gap_window: self.gap_window,
            chroma_method: self.chroma,
            max_duration: self.max_duration,
            note_naming: self.solfege.then_some(NoteNaming::Solfege),
            whisper_url: self.whisper_url.clone(),
        }
    }
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let saved_config = Config::load().unwrap_or_else(|e| {
        log::warn!("Ignoring saved defaults: {}", e);
        Config::new()
    });

    if args.show_saved_defaults {
        let config_path = Config::get_config_path()?;
        if config_path.exists() {
            println!("Saved defaults from {:?}:", config_path);
            println!();
            saved_config.print("Configuration");
        } else {
            println!("No saved defaults file found at {:?}", config_path);
            println!("Use --save-defaults to create one.");
        }
        return Ok(());
    }

    let cmdline_config = args.cmdline_config();
    let mut effective_config = saved_config.clone();
    effective_config.merge(&cmdline_config);

    if args.save_defaults {
        let options = effective_config.resolve()?;
        let path = effective_config.save()?;
        println!("Defaults saved to {:?}", path);
        println!();
        effective_config.print("Saved configuration");
        log::debug!("Resolved options: {:?}", options);
        return Ok(());
    }

    let audio = args
        .audio
        .clone()
        .ok_or("no audio file given (see --help)")?;
    let options = effective_config.resolve()?;

    let transcriber: Box<dyn TranscriptionService> = match (&args.transcript, &effective_config.whisper_url) {
        (Some(path), _) => Box::new(TranscriptFile::new(path)),
        (None, Some(url)) => {
            let mut client = WhisperHttpClient::new(url, options.transcription_quality);
            if let Some(language) = &args.language {
                client = client.with_language(language);
            }
            Box::new(client)
        }
        (None, None) => {
            return Err("lyrics timing needed: pass --transcript <json> or --whisper-url <url>".into())
        }
    };

    let naming = options.note_naming;
    let decoder = SymphoniaDecoder::new(options.max_duration_seconds);
    let pipeline = ChordSheetPipeline::new(Box::new(decoder), transcriber, options)?;
    let result = pipeline.analyze_file(&audio)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_sheet(&result.events, naming));
    }
    Ok(())
}

/// Chords-over-lyrics text. Instrumental markers get a line of their own.
fn render_sheet(events: &[TimelineEvent], naming: NoteNaming) -> String {
    let mut out = String::new();
    let mut chords = String::new();
    let mut lyrics = String::new();

    fn flush(out: &mut String, chords: &mut String, lyrics: &mut String) {
        if lyrics.trim().is_empty() && chords.trim().is_empty() {
            chords.clear();
            lyrics.clear();
            return;
        }
        out.push_str(chords.trim_end());
        out.push('\n');
        out.push_str(lyrics.trim_end());
        out.push('\n');
        chords.clear();
        lyrics.clear();
    }

    for event in events {
        match event {
            TimelineEvent::InstrumentalMarker { marker, chord, .. } => {
                flush(&mut out, &mut chords, &mut lyrics);
                let name = chord_name(*chord, naming);
                if name.is_empty() {
                    out.push_str(&format!("[{}]\n", marker));
                } else {
                    out.push_str(&format!("[{}: {}]\n", marker, name));
                }
            }
            TimelineEvent::SungToken { text, chord, .. } => {
                let name = chord_name(*chord, naming);
                let width = text.chars().count().max(name.chars().count()) + 1;
                if lyrics.chars().count() + width > LINE_WIDTH {
                    flush(&mut out, &mut chords, &mut lyrics);
                }
                chords.push_str(&format!("{:<width$}", name, width = width));
                lyrics.push_str(&format!("{:<width$}", text, width = width));
            }
        }
    }
    flush(&mut out, &mut chords, &mut lyrics);
    out
}
