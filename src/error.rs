//! Error types for decoding, transcription and configuration.
//!
//! Only failures that end a request live here. Empty or silent analysis
//! windows and out-of-range sample indices are handled where they occur
//! and never surface as errors.

use std::io;
use thiserror::Error;

/// The source audio could not be turned into samples.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("audio file not found: {0}")]
    NotFound(String),

    #[error("failed to read audio: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported or unreadable audio format: {0}")]
    Unsupported(String),

    #[error("no audio track found")]
    NoAudioTrack,

    #[error("sample rate not specified in file")]
    MissingSampleRate,

    #[error("decode error: {0}")]
    Codec(String),
}

/// The transcription service failed or returned unusable data.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("transcription service failed: {0}")]
    Service(String),

    #[error("transcription request failed: {0}")]
    Http(String),

    #[error("malformed transcript: {0}")]
    Malformed(String),

    #[error("failed to read transcript: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for TranscriptionError {
    fn from(e: serde_json::Error) -> Self {
        TranscriptionError::Malformed(e.to_string())
    }
}

impl From<ureq::Error> for TranscriptionError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, response) => TranscriptionError::Http(format!(
                "HTTP {} from {}",
                code,
                response.get_url()
            )),
            other => TranscriptionError::Http(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HOME environment variable not set")]
    NoHome,

    #[error("config I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Any failure that aborts one analysis request.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("analysis worker panicked: {0}")]
    Worker(String),
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
