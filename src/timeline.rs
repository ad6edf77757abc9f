//! Chord-over-lyrics timeline.
//!
//! A single time-ordered pass over the lyric spans that:
//! 1. Emits an instrumental marker when the uncovered time before a span
//!    reaches the gap threshold (`Intro` at the start, `Music` between
//!    spans, `Outro` after the last span)
//! 2. Classifies the chord under each span
//! 3. Suppresses a label that repeats the previously emitted chord, so only
//!    chord changes are shown
//!
//! Granularity: with word timings each word gets its own chord decision.
//! Without them a phrase gets one decision, carried by its first token;
//! later tokens of the phrase are continuations even if the harmony moves
//! underneath them.
//!
//! An empty classification (silence, no samples) is shown as no chord and
//! never counts as the previous chord.

use crate::chord::{chord_name, ChordLabel, NoteNaming};
use crate::chroma::{ChromaExtractor, Chromagram};
use crate::classifier::ChordStrategy;
use crate::transcription::{LyricSpan, Transcript};
use crate::waveform::Waveform;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const EPS: f64 = 1e-9;

/// Something that can name the chord sounding in a time range.
pub trait ChordSource {
    /// Chord for `[start, end)` seconds; `None` when the range holds no
    /// usable energy.
    fn chord_between(&self, start: f64, end: f64) -> Option<ChordLabel>;

    /// Length of the underlying audio in seconds.
    fn duration(&self) -> f64;

    /// Shortest range worth classifying: one sample.
    fn min_window(&self) -> f64;
}

/// Classifies each requested range straight from the waveform.
pub struct WaveformChords<'a> {
    waveform: &'a Waveform,
    extractor: &'a ChromaExtractor,
    strategy: &'a dyn ChordStrategy,
}

impl<'a> WaveformChords<'a> {
    pub fn new(
        waveform: &'a Waveform,
        extractor: &'a ChromaExtractor,
        strategy: &'a dyn ChordStrategy,
    ) -> Self {
        Self {
            waveform,
            extractor,
            strategy,
        }
    }
}

impl ChordSource for WaveformChords<'_> {
    fn chord_between(&self, start: f64, end: f64) -> Option<ChordLabel> {
        let chroma = self.extractor.segment_between(self.waveform, start, end);
        self.strategy.classify(&chroma)
    }

    fn duration(&self) -> f64 {
        self.waveform.duration()
    }

    fn min_window(&self) -> f64 {
        1.0 / self.waveform.sample_rate().max(1) as f64
    }
}

/// Classifies ranges from a chromagram computed ahead of time.
pub struct ChromagramChords<'a> {
    chromagram: &'a Chromagram,
    strategy: &'a dyn ChordStrategy,
}

impl<'a> ChromagramChords<'a> {
    pub fn new(chromagram: &'a Chromagram, strategy: &'a dyn ChordStrategy) -> Self {
        Self {
            chromagram,
            strategy,
        }
    }
}

impl ChordSource for ChromagramChords<'_> {
    fn chord_between(&self, start: f64, end: f64) -> Option<ChordLabel> {
        let chroma = self.chromagram.mean_between(start, end);
        self.strategy.classify(&chroma)
    }

    fn duration(&self) -> f64 {
        self.chromagram.duration
    }

    fn min_window(&self) -> f64 {
        1.0 / self.chromagram.sample_rate.max(1) as f64
    }
}

/// What an instrumental marker stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    /// Before the first lyric.
    Intro,
    /// Between two lyrics.
    Music,
    /// After the last lyric.
    Outro,
}

impl MarkerKind {
    pub fn label(self) -> &'static str {
        match self {
            MarkerKind::Intro => "Intro",
            MarkerKind::Music => "Music",
            MarkerKind::Outro => "Outro",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of the rendered chord sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEvent {
    /// A sung word or phrase token. `chord` is `None` for a continuation.
    SungToken {
        text: String,
        chord: Option<ChordLabel>,
        start: f64,
        end: f64,
    },
    /// A stretch without lyrics, labelled with its dominant chord.
    InstrumentalMarker {
        marker: MarkerKind,
        chord: Option<ChordLabel>,
        start: f64,
        end: f64,
    },
}

impl TimelineEvent {
    pub fn chord(&self) -> Option<ChordLabel> {
        match self {
            TimelineEvent::SungToken { chord, .. } => *chord,
            TimelineEvent::InstrumentalMarker { chord, .. } => *chord,
        }
    }

    /// Lyric text, or the marker label for instrumental events.
    pub fn text(&self) -> &str {
        match self {
            TimelineEvent::SungToken { text, .. } => text,
            TimelineEvent::InstrumentalMarker { marker, .. } => marker.label(),
        }
    }

    pub fn start(&self) -> f64 {
        match self {
            TimelineEvent::SungToken { start, .. } => *start,
            TimelineEvent::InstrumentalMarker { start, .. } => *start,
        }
    }

    pub fn end(&self) -> f64 {
        match self {
            TimelineEvent::SungToken { end, .. } => *end,
            TimelineEvent::InstrumentalMarker { end, .. } => *end,
        }
    }

    pub fn is_instrumental(&self) -> bool {
        matches!(self, TimelineEvent::InstrumentalMarker { .. })
    }

    /// Chord display name, empty for continuations and silence.
    pub fn chord_name(&self, naming: NoteNaming) -> String {
        chord_name(self.chord(), naming)
    }
}

/// How a long instrumental gap is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// One marker per gap, whatever its length.
    #[default]
    Single,
    /// One marker per fixed-size window of the gap.
    Windowed,
}

impl fmt::Display for GapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapPolicy::Single => write!(f, "single"),
            GapPolicy::Windowed => write!(f, "windowed"),
        }
    }
}

impl FromStr for GapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(GapPolicy::Single),
            "windowed" => Ok(GapPolicy::Windowed),
            other => Err(format!("unknown gap policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineConfig {
    /// Uncovered seconds that make a gap instrumental.
    pub gap_threshold: f64,
    pub gap_policy: GapPolicy,
    /// Window length for [`GapPolicy::Windowed`].
    pub gap_window: f64,
    /// Use word timings when the transcript has them.
    pub word_level: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            gap_threshold: 2.0,
            gap_policy: GapPolicy::Single,
            gap_window: 2.0,
            word_level: true,
        }
    }
}

/// A span plus the granularity it was taken at.
#[derive(Debug, Clone)]
enum Unit {
    Word(LyricSpan),
    Phrase(LyricSpan),
}

impl Unit {
    fn span(&self) -> &LyricSpan {
        match self {
            Unit::Word(span) | Unit::Phrase(span) => span,
        }
    }
}

/// Single-pass timeline state machine.
pub struct TimelineBuilder<'a> {
    source: &'a dyn ChordSource,
    config: TimelineConfig,
    cursor: f64,
    previous: Option<ChordLabel>,
    events: Vec<TimelineEvent>,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(source: &'a dyn ChordSource, config: TimelineConfig) -> Self {
        Self {
            source,
            config,
            cursor: 0.0,
            previous: None,
            events: Vec::new(),
        }
    }

    /// Build the timeline for a transcript, choosing word or phrase
    /// granularity per segment.
    pub fn build(self, transcript: &Transcript) -> Vec<TimelineEvent> {
        let mut units = Vec::new();
        let mut fallbacks = 0usize;
        for segment in &transcript.segments {
            if self.config.word_level && segment.has_words() {
                units.extend(segment.word_spans().into_iter().map(Unit::Word));
            } else {
                if self.config.word_level {
                    fallbacks += 1;
                }
                units.push(Unit::Phrase(segment.phrase_span()));
            }
        }
        if fallbacks > 0 {
            warn!(
                "{} of {} segments have no word timings; using phrase level for them",
                fallbacks,
                transcript.segments.len()
            );
        }
        self.run(units)
    }

    /// Build the timeline treating every span as a word.
    pub fn build_from_words(self, spans: &[LyricSpan]) -> Vec<TimelineEvent> {
        self.run(spans.iter().cloned().map(Unit::Word).collect())
    }

    /// Build the timeline treating every span as a phrase.
    pub fn build_from_phrases(self, spans: &[LyricSpan]) -> Vec<TimelineEvent> {
        self.run(spans.iter().cloned().map(Unit::Phrase).collect())
    }

    fn run(mut self, mut units: Vec<Unit>) -> Vec<TimelineEvent> {
        units.sort_by(|a, b| a.span().start.total_cmp(&b.span().start));
        for unit in &units {
            self.step(unit);
        }
        self.finish()
    }

    fn step(&mut self, unit: &Unit) {
        let span = unit.span();
        let (start, end) = self.clamp(span);

        if start - self.cursor + EPS >= self.config.gap_threshold {
            let kind = if self.cursor <= EPS {
                MarkerKind::Intro
            } else {
                MarkerKind::Music
            };
            self.emit_gap(kind, self.cursor, start);
        }

        let detected = self.source.chord_between(start, end);
        let chord = self.decide(detected);
        debug!(
            "[{:.2}, {:.2}) {:?}: detected {:?}, shown {:?}",
            start,
            end,
            span.text,
            detected.map(|c| c.to_string()),
            chord.map(|c| c.to_string())
        );

        match unit {
            Unit::Word(span) => self.events.push(TimelineEvent::SungToken {
                text: span.text.clone(),
                chord,
                start,
                end,
            }),
            Unit::Phrase(span) => self.emit_phrase(&span.text, chord, start, end),
        }

        self.cursor = self.cursor.max(end);
    }

    fn finish(mut self) -> Vec<TimelineEvent> {
        let total = self.source.duration();
        if total - self.cursor + EPS >= self.config.gap_threshold {
            self.emit_gap(MarkerKind::Outro, self.cursor, total);
        }
        self.events
    }

    /// Span times with inverted or zero-width spans widened to one sample.
    fn clamp(&self, span: &LyricSpan) -> (f64, f64) {
        let start = span.start.max(0.0);
        let min_end = start + self.source.min_window();
        if span.end < min_end {
            warn!(
                "Span {:?} [{:.3}, {:.3}] is empty or inverted; using one sample",
                span.text, span.start, span.end
            );
            (start, min_end)
        } else {
            (start, span.end)
        }
    }

    /// Repeat suppression: show a chord only when it differs from the last
    /// one shown.
    fn decide(&mut self, detected: Option<ChordLabel>) -> Option<ChordLabel> {
        match detected {
            None => None,
            Some(chord) if Some(chord) == self.previous => None,
            Some(chord) => {
                self.previous = Some(chord);
                Some(chord)
            }
        }
    }

    fn emit_gap(&mut self, marker: MarkerKind, start: f64, end: f64) {
        let windows = match self.config.gap_policy {
            GapPolicy::Single => vec![(start, end)],
            GapPolicy::Windowed => split_windows(start, end, self.config.gap_window),
        };
        for (a, b) in windows {
            let chord = self.source.chord_between(a, b);
            if chord.is_some() {
                self.previous = chord;
            }
            debug!(
                "{} [{:.2}, {:.2}): {:?}",
                marker,
                a,
                b,
                chord.map(|c| c.to_string())
            );
            self.events.push(TimelineEvent::InstrumentalMarker {
                marker,
                chord,
                start: a,
                end: b,
            });
        }
    }

    /// Whitespace tokens of a phrase; the first carries the chord. Token
    /// times split the phrase evenly.
    fn emit_phrase(&mut self, text: &str, chord: Option<ChordLabel>, start: f64, end: f64) {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            self.events.push(TimelineEvent::SungToken {
                text: String::new(),
                chord,
                start,
                end,
            });
            return;
        }
        let step = (end - start) / tokens.len() as f64;
        for (i, token) in tokens.iter().enumerate() {
            self.events.push(TimelineEvent::SungToken {
                text: token.to_string(),
                chord: if i == 0 { chord } else { None },
                start: start + step * i as f64,
                end: start + step * (i + 1) as f64,
            });
        }
    }
}

/// Consecutive windows of `size` seconds covering `[start, end)`. A
/// remainder shorter than half a window joins the window before it.
fn split_windows(start: f64, end: f64, size: f64) -> Vec<(f64, f64)> {
    if !(size.is_finite() && size > 0.0) {
        return vec![(start, end)];
    }
    let mut windows: Vec<(f64, f64)> = Vec::new();
    let mut t = start;
    while t < end - EPS {
        let next = (t + size).min(end);
        windows.push((t, next));
        t = next;
    }
    if windows.len() >= 2 {
        if let Some(&(a, b)) = windows.last() {
            if b - a < size / 2.0 {
                windows.pop();
                if let Some(prev) = windows.last_mut() {
                    prev.1 = b;
                }
            }
        }
    }
    windows
}

/// Convenience wrapper: build a timeline for `transcript` over `source`.
pub fn build_timeline(
    source: &dyn ChordSource,
    transcript: &Transcript,
    config: &TimelineConfig,
) -> Vec<TimelineEvent> {
    TimelineBuilder::new(source, config.clone()).build(transcript)
}
