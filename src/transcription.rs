//! Lyric transcription: timed segments and words from a speech-to-text
//! service.
//!
//! The service itself is external. This module defines the transcript
//! shape, the [`TranscriptionService`] seam the pipeline is built on, and
//! two implementations:
//! - [`TranscriptFile`]: a Whisper-style JSON transcript prepared earlier
//! - [`WhisperHttpClient`]: an OpenAI-compatible transcription server
//!
//! Both accept Whisper's `verbose_json` layout. Word timings may sit on
//! each segment or in a top-level `words` list; top-level words are moved
//! into the segment whose time range contains them.

use crate::error::TranscriptionError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// A timed piece of lyric text, either one word or a whole phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricSpan {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl LyricSpan {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<TranscriptWord>,
}

impl TranscriptSegment {
    /// The whole segment as one span, text trimmed.
    pub fn phrase_span(&self) -> LyricSpan {
        LyricSpan::new(self.text.trim(), self.start, self.end)
    }

    /// One span per timed word; empty when the service gave no word timings.
    pub fn word_spans(&self) -> Vec<LyricSpan> {
        self.words
            .iter()
            .map(|w| LyricSpan::new(w.word.trim(), w.start, w.end))
            .collect()
    }

    pub fn has_words(&self) -> bool {
        !self.words.is_empty()
    }
}

/// Ordered transcript segments for one recording.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            segments,
            language: None,
        }
    }

    /// Reject non-finite timestamps. Inverted or zero-width spans are left
    /// alone; the timeline builder clamps those.
    pub fn validate(&self) -> Result<(), TranscriptionError> {
        for (i, seg) in self.segments.iter().enumerate() {
            if !(seg.start.is_finite() && seg.end.is_finite()) {
                return Err(TranscriptionError::Malformed(format!(
                    "segment {} has non-finite time [{}, {}]",
                    i, seg.start, seg.end
                )));
            }
            for w in &seg.words {
                if !(w.start.is_finite() && w.end.is_finite()) {
                    return Err(TranscriptionError::Malformed(format!(
                        "word {:?} in segment {} has non-finite time [{}, {}]",
                        w.word, i, w.start, w.end
                    )));
                }
            }
        }
        Ok(())
    }

    /// Drop segments and words that start at or after `duration` seconds
    /// and pull the remaining ends back to it. Returns how many segments
    /// were dropped.
    pub fn clip_to(&mut self, duration: f64) -> usize {
        let before = self.segments.len();
        self.segments.retain(|seg| seg.start < duration);
        for seg in &mut self.segments {
            seg.end = seg.end.min(duration);
            seg.words.retain(|w| w.start < duration);
            for w in &mut seg.words {
                w.end = w.end.min(duration);
            }
        }
        before - self.segments.len()
    }

    /// Total number of timed words across all segments.
    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTranscript {
    Verbose {
        #[serde(default)]
        segments: Vec<TranscriptSegment>,
        #[serde(default)]
        words: Vec<TranscriptWord>,
        #[serde(default)]
        language: Option<String>,
    },
    Segments(Vec<TranscriptSegment>),
}

/// Parse a Whisper-style JSON transcript (object with `segments`, or a bare
/// array of segments).
pub fn parse_transcript(json: &str) -> Result<Transcript, TranscriptionError> {
    let raw: RawTranscript = serde_json::from_str(json)?;
    let transcript = match raw {
        RawTranscript::Segments(segments) => Transcript::new(segments),
        RawTranscript::Verbose {
            mut segments,
            words,
            language,
        } => {
            attach_words(&mut segments, words);
            Transcript { segments, language }
        }
    };
    transcript.validate()?;
    Ok(transcript)
}

/// Move top-level words into the segment containing their start time.
/// Segments that already carry words are left untouched.
fn attach_words(segments: &mut [TranscriptSegment], words: Vec<TranscriptWord>) {
    if words.is_empty() || segments.iter().any(|s| s.has_words()) {
        return;
    }
    let last = segments.len().saturating_sub(1);
    for word in words {
        let target = segments
            .iter()
            .position(|s| word.start < s.end)
            .unwrap_or(last);
        if let Some(seg) = segments.get_mut(target) {
            seg.words.push(word);
        }
    }
}

/// Speech-to-text seam. Implementations are created once and shared by
/// every request.
pub trait TranscriptionService: Send + Sync {
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript, TranscriptionError>;

    fn name(&self) -> &str;
}

/// Transcript read from a JSON file; the audio path is ignored.
#[derive(Debug, Clone)]
pub struct TranscriptFile {
    path: PathBuf,
}

impl TranscriptFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TranscriptionService for TranscriptFile {
    fn transcribe(&self, _audio_path: &Path) -> Result<Transcript, TranscriptionError> {
        let content = fs::read_to_string(&self.path)?;
        let transcript = parse_transcript(&content)?;
        info!(
            "Loaded transcript with {} segments ({} timed words) from {}",
            transcript.segments.len(),
            transcript.word_count(),
            self.path.display()
        );
        Ok(transcript)
    }

    fn name(&self) -> &str {
        "transcript file"
    }
}

/// Transcription model size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionQuality {
    Tiny,
    #[default]
    Base,
    Small,
}

impl TranscriptionQuality {
    pub fn model_name(self) -> &'static str {
        match self {
            TranscriptionQuality::Tiny => "tiny",
            TranscriptionQuality::Base => "base",
            TranscriptionQuality::Small => "small",
        }
    }
}

impl fmt::Display for TranscriptionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

impl FromStr for TranscriptionQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(TranscriptionQuality::Tiny),
            "base" => Ok(TranscriptionQuality::Base),
            "small" => Ok(TranscriptionQuality::Small),
            other => Err(format!("unknown transcription quality: {}", other)),
        }
    }
}

const TRANSCRIPTIONS_PATH: &str = "/v1/audio/transcriptions";

/// Client for an OpenAI-compatible transcription server (faster-whisper,
/// whisper.cpp server and friends).
pub struct WhisperHttpClient {
    base_url: String,
    quality: TranscriptionQuality,
    language: Option<String>,
    agent: ureq::Agent,
}

impl WhisperHttpClient {
    pub fn new(base_url: &str, quality: TranscriptionQuality) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            quality,
            language: None,
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(600))
                .build(),
        }
    }

    /// Ask the server to transcribe in a fixed language instead of
    /// detecting it.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, TRANSCRIPTIONS_PATH)
    }

    /// Build a `multipart/form-data` body. Returns the boundary and body.
    fn multipart_body(&self, file_name: &str, audio: &[u8]) -> (String, Vec<u8>) {
        let boundary = format!("chordsheet-{}", uuid::Uuid::new_v4().simple());
        let mut fields: Vec<(&str, &str)> = vec![
            ("model", self.quality.model_name()),
            ("response_format", "verbose_json"),
            ("timestamp_granularities[]", "segment"),
            ("timestamp_granularities[]", "word"),
        ];
        if let Some(lang) = &self.language {
            fields.push(("language", lang.as_str()));
        }

        let mut body = Vec::with_capacity(audio.len() + 1024);
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    boundary, name, value
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                boundary, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(audio);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        (boundary, body)
    }
}

impl TranscriptionService for WhisperHttpClient {
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript, TranscriptionError> {
        let audio = fs::read(audio_path)?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio");
        let (boundary, body) = self.multipart_body(file_name, &audio);

        debug!(
            "POST {} ({} bytes, model {})",
            self.endpoint(),
            body.len(),
            self.quality
        );
        let response = self
            .agent
            .post(&self.endpoint())
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .set("Accept", "application/json")
            .send_bytes(&body)?;
        let text = response
            .into_string()
            .map_err(|e| TranscriptionError::Malformed(e.to_string()))?;

        let transcript = parse_transcript(&text)?;
        info!(
            "Transcribed {} segments ({} timed words) with model {}",
            transcript.segments.len(),
            transcript.word_count(),
            self.quality
        );
        Ok(transcript)
    }

    fn name(&self) -> &str {
        "whisper server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VERBOSE: &str = r#"{
        "text": "hola mundo",
        "language": "es",
        "segments": [
            {"id": 0, "start": 0.0, "end": 4.0, "text": " hola", "words": [
                {"word": " hola", "start": 0.0, "end": 4.0}
            ]},
            {"id": 1, "start": 6.0, "end": 10.0, "text": " mundo"}
        ]
    }"#;

    #[test]
    fn test_parse_verbose_json() {
        let t = parse_transcript(VERBOSE).unwrap();
        assert_eq!(t.language.as_deref(), Some("es"));
        assert_eq!(t.segments.len(), 2);
        assert_eq!(t.segments[0].word_spans(), vec![LyricSpan::new("hola", 0.0, 4.0)]);
        assert!(!t.segments[1].has_words());
        assert_eq!(t.segments[1].phrase_span(), LyricSpan::new("mundo", 6.0, 10.0));
    }

    #[test]
    fn test_parse_bare_segment_array() {
        let t = parse_transcript(r#"[{"start": 1.0, "end": 2.0, "text": "a"}]"#).unwrap();
        assert_eq!(t.segments.len(), 1);
        assert_eq!(t.language, None);
    }

    #[test]
    fn test_top_level_words_are_attached() {
        let json = r#"{
            "segments": [
                {"start": 0.0, "end": 2.0, "text": "one two"},
                {"start": 3.0, "end": 5.0, "text": "three"}
            ],
            "words": [
                {"word": "one", "start": 0.0, "end": 0.8},
                {"word": "two", "start": 1.0, "end": 1.9},
                {"word": "three", "start": 3.1, "end": 4.0}
            ]
        }"#;
        let t = parse_transcript(json).unwrap();
        assert_eq!(t.segments[0].words.len(), 2);
        assert_eq!(t.segments[1].words.len(), 1);
        assert_eq!(t.word_count(), 3);
    }

    #[test]
    fn test_malformed_transcripts() {
        assert!(matches!(
            parse_transcript("not json"),
            Err(TranscriptionError::Malformed(_))
        ));
        assert!(matches!(
            parse_transcript(r#"[{"start": 1.0, "text": "missing end"}]"#),
            Err(TranscriptionError::Malformed(_))
        ));
        let t = Transcript::new(vec![TranscriptSegment {
            start: f64::NAN,
            end: 1.0,
            text: "x".into(),
            words: vec![],
        }]);
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_clip_to_duration() {
        let mut t = parse_transcript(VERBOSE).unwrap();
        assert_eq!(t.clip_to(8.0), 0);
        assert_eq!(t.segments[1].end, 8.0);

        assert_eq!(t.clip_to(5.0), 1);
        assert_eq!(t.segments.len(), 1);
        assert_eq!(t.segments[0].end, 4.0);

        assert_eq!(t.clip_to(2.0), 0);
        assert_eq!(t.segments[0].end, 2.0);
        assert_eq!(t.segments[0].words[0].end, 2.0);
    }

    #[test]
    fn test_transcript_file_service() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VERBOSE.as_bytes()).unwrap();
        let service = TranscriptFile::new(file.path());
        let t = service.transcribe(Path::new("ignored.mp3")).unwrap();
        assert_eq!(t.segments.len(), 2);

        let missing = TranscriptFile::new("/nonexistent/transcript.json");
        assert!(matches!(
            missing.transcribe(Path::new("x")),
            Err(TranscriptionError::Io(_))
        ));
    }

    #[test]
    fn test_multipart_body() {
        let client = WhisperHttpClient::new("http://localhost:8000/", TranscriptionQuality::Small)
            .with_language("es");
        assert_eq!(client.endpoint(), "http://localhost:8000/v1/audio/transcriptions");

        let (boundary, body) = client.multipart_body("song.mp3", b"AUDIO");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with(&format!("--{}\r\n", boundary)));
        assert!(text.contains("name=\"model\"\r\n\r\nsmall\r\n"));
        assert!(text.contains("name=\"language\"\r\n\r\nes\r\n"));
        assert!(text.contains("filename=\"song.mp3\""));
        assert!(text.contains("\r\n\r\nAUDIO\r\n"));
        assert!(text.ends_with(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn test_quality_parsing() {
        assert_eq!("Tiny".parse::<TranscriptionQuality>().unwrap(), TranscriptionQuality::Tiny);
        assert!("large".parse::<TranscriptionQuality>().is_err());
        assert_eq!(TranscriptionQuality::default().model_name(), "base");
    }
}
