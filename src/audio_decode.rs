//! Audio decoding to a mono sample buffer.
//!
//! Files are format-detected and decoded with symphonia (WAV, MP3, FLAC), down-mixed
//! to mono `f32` in `[-1, 1]` and optionally cut to a maximum duration.
//! Uploaded bytes are first spooled to a temporary file that is removed
//! when the [`AudioUpload`] is dropped, whichever way the request ends.

use crate::error::DecodeError;
use crate::waveform::Waveform;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tempfile::NamedTempFile;

/// Output of an audio decode: the full mix and, if the decoder provides
/// one, a harmonic-only version of the same length and rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub waveform: Waveform,
    pub harmonic: Option<Waveform>,
}

impl From<Waveform> for DecodedAudio {
    fn from(waveform: Waveform) -> Self {
        Self {
            waveform,
            harmonic: None,
        }
    }
}

/// Turns an audio file into samples.
pub trait AudioDecoder: Send + Sync {
    fn decode_file(&self, path: &Path) -> Result<DecodedAudio, DecodeError>;
}

/// File decoder backed by symphonia.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder {
    /// Stop after this many seconds; `None` decodes everything.
    max_duration: Option<f64>,
}

impl SymphoniaDecoder {
    pub fn new(max_duration: Option<f64>) -> Self {
        Self {
            max_duration: max_duration.filter(|d| d.is_finite() && *d > 0.0),
        }
    }

    pub fn max_duration(&self) -> Option<f64> {
        self.max_duration
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode_file(&self, path: &Path) -> Result<DecodedAudio, DecodeError> {
        if !path.exists() {
            return Err(DecodeError::NotFound(path.display().to_string()));
        }
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let detected = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
        let mut format_reader = detected.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or(DecodeError::MissingSampleRate)?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

        let max_samples = self
            .max_duration
            .map(|d| (d * sample_rate as f64).round() as usize);

        let mut samples: Vec<f32> = Vec::new();
        let mut truncated = false;
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(DecodeError::Codec(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => append_mono(&decoded, &mut samples),
                Err(SymphoniaError::DecodeError(msg)) => {
                    warn!("Skipping undecodable packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(DecodeError::Codec(e.to_string())),
            }

            if let Some(max) = max_samples {
                if samples.len() >= max {
                    truncated = samples.len() > max;
                    samples.truncate(max);
                    break;
                }
            }
        }

        if truncated {
            warn!(
                "Audio truncated to the first {:.1}s",
                self.max_duration.unwrap_or_default()
            );
        }
        let waveform = Waveform::new(samples, sample_rate);
        info!(
            "Decoded {} samples at {} Hz ({:.2}s) from {}",
            waveform.len(),
            sample_rate,
            waveform.duration(),
            path.display()
        );
        Ok(waveform.into())
    }
}

/// Down-mix one decoded buffer to mono and append it as `f32` in `[-1, 1]`.
fn append_mono(audio_buf: &AudioBufferRef, out: &mut Vec<f32>) {
    let num_channels = audio_buf.spec().channels.count();
    let frames = audio_buf.frames();
    if num_channels == 0 || frames == 0 {
        return;
    }

    let mut mix = vec![0.0_f32; frames];
    match audio_buf {
        AudioBufferRef::U8(buf) => {
            for ch in 0..num_channels {
                accumulate(&mut mix, buf.chan(ch).iter().map(|&s| (s as f32 - 128.0) / 128.0));
            }
        }
        AudioBufferRef::U16(buf) => {
            for ch in 0..num_channels {
                accumulate(&mut mix, buf.chan(ch).iter().map(|&s| (s as f32 - 32768.0) / 32768.0));
            }
        }
        AudioBufferRef::U24(buf) => {
            for ch in 0..num_channels {
                accumulate(
                    &mut mix,
                    buf.chan(ch).iter().map(|&s| (s.inner() as f32 - 8388608.0) / 8388608.0),
                );
            }
        }
        AudioBufferRef::U32(buf) => {
            for ch in 0..num_channels {
                accumulate(
                    &mut mix,
                    buf.chan(ch)
                        .iter()
                        .map(|&s| ((s as f64 - 2147483648.0) / 2147483648.0) as f32),
                );
            }
        }
        AudioBufferRef::S8(buf) => {
            for ch in 0..num_channels {
                accumulate(&mut mix, buf.chan(ch).iter().map(|&s| s as f32 / 128.0));
            }
        }
        AudioBufferRef::S16(buf) => {
            for ch in 0..num_channels {
                accumulate(&mut mix, buf.chan(ch).iter().map(|&s| s as f32 / 32768.0));
            }
        }
        AudioBufferRef::S24(buf) => {
            for ch in 0..num_channels {
                accumulate(&mut mix, buf.chan(ch).iter().map(|&s| s.inner() as f32 / 8388608.0));
            }
        }
        AudioBufferRef::S32(buf) => {
            for ch in 0..num_channels {
                accumulate(
                    &mut mix,
                    buf.chan(ch).iter().map(|&s| (s as f64 / 2147483648.0) as f32),
                );
            }
        }
        AudioBufferRef::F32(buf) => {
            for ch in 0..num_channels {
                accumulate(&mut mix, buf.chan(ch).iter().map(|&s| s.clamp(-1.0, 1.0)));
            }
        }
        AudioBufferRef::F64(buf) => {
            for ch in 0..num_channels {
                accumulate(&mut mix, buf.chan(ch).iter().map(|&s| s.clamp(-1.0, 1.0) as f32));
            }
        }
    }

    let scale = 1.0 / num_channels as f32;
    out.extend(mix.into_iter().map(|s| s * scale));
}

fn accumulate(mix: &mut [f32], channel: impl Iterator<Item = f32>) {
    for (m, s) in mix.iter_mut().zip(channel) {
        *m += s;
    }
}

/// Uploaded audio spooled to a named temporary file.
///
/// The file keeps the upload's extension as a format hint and is deleted
/// on drop.
#[derive(Debug)]
pub struct AudioUpload {
    file: NamedTempFile,
}

impl AudioUpload {
    pub fn from_bytes(bytes: &[u8], extension: Option<&str>) -> io::Result<Self> {
        let suffix = extension
            .map(|ext| format!(".{}", ext.trim_start_matches('.')))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("chordsheet-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        debug!("Spooled {} bytes to {}", bytes.len(), file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let decoder = SymphoniaDecoder::default();
        let err = decoder
            .decode_file(Path::new("/nonexistent/chordsheet/song.mp3"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::NotFound(_)));
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let upload = AudioUpload::from_bytes(b"definitely not audio", Some("wav")).unwrap();
        let err = SymphoniaDecoder::default().decode_file(upload.path()).unwrap_err();
        assert!(matches!(err, DecodeError::Unsupported(_)), "got {:?}", err);
    }

    #[test]
    fn test_upload_is_removed_on_drop() {
        let upload = AudioUpload::from_bytes(&[1, 2, 3], Some(".mp3")).unwrap();
        let path = upload.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp3"));
        drop(upload);
        assert!(!path.exists());
    }

    #[test]
    fn test_max_duration_ignores_nonsense() {
        assert_eq!(SymphoniaDecoder::new(Some(0.0)).max_duration(), None);
        assert_eq!(SymphoniaDecoder::new(Some(-5.0)).max_duration(), None);
        assert_eq!(SymphoniaDecoder::new(Some(60.0)).max_duration(), Some(60.0));
    }
}
