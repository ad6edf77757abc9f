//! One analysis request: decode, then transcribe and extract chroma in
//! parallel, then build the timeline.
//!
//! The decoder and transcription service are injected at construction and
//! reused for every request. Nothing mutable is shared between requests.

use crate::audio_decode::{AudioDecoder, AudioUpload, DecodedAudio};
use crate::chroma::{ChromaExtractor, Chromagram};
use crate::classifier::ChordStrategy;
use crate::config::AnalysisOptions;
use crate::error::{AnalysisError, Result};
use crate::hpss::HarmonicSeparator;
use crate::timeline::{ChromagramChords, TimelineBuilder, TimelineEvent};
use crate::transcription::{Transcript, TranscriptionService};
use crate::waveform::Waveform;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;
use std::thread;
use std::time::Instant;

/// Output of one request.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub events: Vec<TimelineEvent>,
    /// Analysed duration in seconds (after any duration cap).
    pub duration: f64,
    pub sample_rate: u32,
    pub transcript: Transcript,
}

pub struct ChordSheetPipeline {
    decoder: Box<dyn AudioDecoder>,
    transcriber: Box<dyn TranscriptionService>,
    options: AnalysisOptions,
    strategy: Box<dyn ChordStrategy>,
    extractor: ChromaExtractor,
    separator: HarmonicSeparator,
}

impl ChordSheetPipeline {
    pub fn new(
        decoder: Box<dyn AudioDecoder>,
        transcriber: Box<dyn TranscriptionService>,
        options: AnalysisOptions,
    ) -> Result<Self> {
        options.validate()?;
        let strategy = options.strategy.build(options.minor_sensitivity);
        let extractor = ChromaExtractor::new(options.chroma_method);
        Ok(Self {
            decoder,
            transcriber,
            options,
            strategy,
            extractor,
            separator: HarmonicSeparator::default(),
        })
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Analyse uploaded bytes. The spooled copy is removed however the
    /// request ends.
    pub fn analyze_upload(&self, bytes: &[u8], extension: Option<&str>) -> Result<AnalysisResult> {
        let upload = AudioUpload::from_bytes(bytes, extension)?;
        self.analyze_file(upload.path())
    }

    pub fn analyze_file(&self, path: &Path) -> Result<AnalysisResult> {
        let started = Instant::now();
        let decoded = self.decoder.decode_file(path)?;
        let sample_rate = decoded.waveform.sample_rate();

        let (mut transcript, chromagram) = thread::scope(|s| {
            let transcription = s.spawn(|| self.transcriber.transcribe(path));
            let chromagram = self.extract(decoded);
            let transcript = transcription
                .join()
                .map_err(|_| AnalysisError::Worker("transcription thread panicked".to_string()))?;
            Ok::<_, AnalysisError>((transcript?, chromagram))
        })?;
        info!(
            "Transcript from {}: {} segments, {} timed words",
            self.transcriber.name(),
            transcript.segments.len(),
            transcript.word_count()
        );
        let dropped = transcript.clip_to(chromagram.duration);
        if dropped > 0 {
            warn!(
                "{} transcript segments start after the analysed {:.2}s of audio; dropped",
                dropped, chromagram.duration
            );
        }

        let source = ChromagramChords::new(&chromagram, self.strategy.as_ref());
        let events =
            TimelineBuilder::new(&source, self.options.timeline_config()).build(&transcript);
        info!(
            "Timeline with {} events in {:.2}s ({} strategy)",
            events.len(),
            started.elapsed().as_secs_f64(),
            self.strategy.name()
        );

        Ok(AnalysisResult {
            events,
            duration: chromagram.duration,
            sample_rate,
            transcript,
        })
    }

    /// Chroma for the whole request, on the harmonic part when enabled.
    fn extract(&self, decoded: DecodedAudio) -> Chromagram {
        let waveform = self.analysis_waveform(decoded);
        let chromagram = self.extractor.chromagram(&waveform);
        debug!(
            "Extracted {} chroma frames over {:.2}s",
            chromagram.frames.len(),
            chromagram.duration
        );
        chromagram
    }

    fn analysis_waveform(&self, decoded: DecodedAudio) -> Waveform {
        if !self.options.harmonic_separation {
            return decoded.waveform;
        }
        match decoded.harmonic {
            Some(harmonic) => {
                debug!("Using decoder-provided harmonic signal");
                harmonic
            }
            None => {
                info!("Separating harmonic signal");
                self.separator.harmonic(&decoded.waveform)
            }
        }
    }
}
