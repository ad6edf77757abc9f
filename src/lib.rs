pub mod audio_decode;
pub mod chord;
pub mod chord_scan;
pub mod chroma;
pub mod classifier;
pub mod config;
pub mod error;
pub mod hpss;
pub mod pipeline;
pub mod templates;
pub mod timeline;
pub mod transcription;
pub mod waveform;

pub use audio_decode::{AudioDecoder, AudioUpload, DecodedAudio, SymphoniaDecoder};
pub use chord::{ChordLabel, ChordQuality, NoteNaming, PitchClass};
pub use chord_scan::{scan_chords, WindowChord};
pub use chroma::{ChromaExtractor, ChromaMethod, ChromaVector, Chromagram};
pub use classifier::{ChordStrategy, RootThirdHeuristic, StrategyKind, TemplateCorrelation};
pub use config::{AnalysisOptions, Config};
pub use error::{AnalysisError, ConfigError, DecodeError, TranscriptionError};
pub use hpss::HarmonicSeparator;
pub use pipeline::{AnalysisResult, ChordSheetPipeline};
pub use templates::ChordTemplateBank;
pub use timeline::{
    build_timeline, ChordSource, ChromagramChords, GapPolicy, MarkerKind, TimelineBuilder,
    TimelineConfig, TimelineEvent, WaveformChords,
};
pub use transcription::{
    parse_transcript, LyricSpan, Transcript, TranscriptFile, TranscriptSegment, TranscriptWord,
    TranscriptionQuality, TranscriptionService, WhisperHttpClient,
};
pub use waveform::Waveform;
