//! Chroma extraction: fold short-time spectral energy into 12 pitch classes.
//!
//! Frames are Hann-windowed STFT frames. Every FFT bin inside the analysed
//! frequency band adds its power to the pitch class nearest its centre
//! frequency. Two flavours:
//! - [`ChromaMethod::Stft`]: power chroma, each frame scaled to a peak of 1
//! - [`ChromaMethod::EnergyNormalized`]: L1-normalised and quantised per
//!   frame, so loud and soft passages land on the same scale
//!
//! Silent frames stay all-zero under both methods.

use crate::chord::{PitchClass, SEMITONES};
use crate::waveform::Waveform;
use chfft::RFft1D;
use log::debug;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Energy per pitch class, index 0 = C.
pub type ChromaVector = [f32; SEMITONES];

/// Raw frame power below this counts as silence.
const POWER_FLOOR: f32 = 1e-10;

const QUANT_STEPS: [f32; 4] = [0.4, 0.2, 0.1, 0.05];
const QUANT_WEIGHT: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChromaMethod {
    #[default]
    Stft,
    EnergyNormalized,
}

impl fmt::Display for ChromaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChromaMethod::Stft => write!(f, "stft"),
            ChromaMethod::EnergyNormalized => write!(f, "energy-normalized"),
        }
    }
}

impl FromStr for ChromaMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stft" => Ok(ChromaMethod::Stft),
            "energy-normalized" | "energy" | "cens" => Ok(ChromaMethod::EnergyNormalized),
            other => Err(format!("unknown chroma method: {}", other)),
        }
    }
}

/// One chroma vector and the time span its analysis window covers.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaFrame {
    /// Window start in seconds.
    pub start: f64,
    /// Window end in seconds, clamped to the end of the signal.
    pub end: f64,
    pub chroma: ChromaVector,
}

/// Frame-resolution chroma for a whole waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct Chromagram {
    pub frames: Vec<ChromaFrame>,
    /// Duration of the analysed signal in seconds.
    pub duration: f64,
    pub sample_rate: u32,
}

impl Chromagram {
    /// Mean chroma over the frames whose window lies inside `[start, end)`.
    ///
    /// When no window fits (spans shorter than one window), the frame with
    /// the largest overlap is used instead; with no overlap at all the
    /// result is all zero.
    pub fn mean_between(&self, start: f64, end: f64) -> ChromaVector {
        const EPS: f64 = 1e-9;
        let inside: Vec<&ChromaFrame> = self
            .frames
            .iter()
            .filter(|f| f.start >= start - EPS && f.end <= end + EPS)
            .collect();
        if !inside.is_empty() {
            return mean(inside.iter().map(|f| &f.chroma));
        }

        let mut best: Option<(&ChromaFrame, f64)> = None;
        for frame in &self.frames {
            let overlap = frame.end.min(end) - frame.start.max(start);
            if overlap <= 0.0 {
                continue;
            }
            match best {
                Some((_, best_overlap)) if overlap <= best_overlap => {}
                _ => best = Some((frame, overlap)),
            }
        }
        best.map(|(f, _)| f.chroma).unwrap_or([0.0; SEMITONES])
    }
}

/// Short-time chroma analyser.
#[derive(Debug, Clone)]
pub struct ChromaExtractor {
    method: ChromaMethod,
    n_fft: usize,
    hop_length: usize,
    min_freq: f32,
    max_freq: f32,
    window: Vec<f32>,
}

impl ChromaExtractor {
    pub const DEFAULT_N_FFT: usize = 4096;
    pub const DEFAULT_HOP: usize = 2048;

    pub fn new(method: ChromaMethod) -> Self {
        Self::with_params(method, Self::DEFAULT_N_FFT, Self::DEFAULT_HOP)
    }

    /// `n_fft` is rounded up to an even length; `hop_length` is at least 1.
    pub fn with_params(method: ChromaMethod, n_fft: usize, hop_length: usize) -> Self {
        let n_fft = (n_fft.max(2) + 1) & !1;
        Self {
            method,
            n_fft,
            hop_length: hop_length.max(1),
            min_freq: 50.0,
            max_freq: 5000.0,
            window: hann_window(n_fft),
        }
    }

    /// Per-frame chroma for a run of samples. A run shorter than one window
    /// is zero-padded into a single frame; an empty run has no frames.
    pub fn frames(&self, samples: &[f32], sample_rate: u32) -> Vec<ChromaFrame> {
        if samples.is_empty() || sample_rate == 0 {
            return Vec::new();
        }

        let rate = sample_rate as f64;
        let duration = samples.len() as f64 / rate;
        let mut fft = RFft1D::<f32>::new(self.n_fft);
        let mut buffer = vec![0.0_f32; self.n_fft];

        let mut num_frames = if samples.len() <= self.n_fft {
            1
        } else {
            1 + (samples.len() - self.n_fft) / self.hop_length
        };
        // Zero-padded frame for the tail left over after the last full window.
        let covered = (num_frames - 1) * self.hop_length + self.n_fft;
        if covered < samples.len() && num_frames * self.hop_length < samples.len() {
            num_frames += 1;
        }

        let mut frames = Vec::with_capacity(num_frames);
        for i in 0..num_frames {
            let offset = i * self.hop_length;
            let available = (samples.len() - offset).min(self.n_fft);
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k < available {
                    samples[offset + k] * self.window[k]
                } else {
                    0.0
                };
            }

            let spectrum = fft.forward(&buffer);
            let power: Vec<f32> = spectrum.iter().map(|c| c.norm_sqr()).collect();
            let chroma = self.normalize(self.fold(&power, sample_rate));

            let start = offset as f64 / rate;
            frames.push(ChromaFrame {
                start,
                end: ((offset + self.n_fft) as f64 / rate).min(duration),
                chroma,
            });
        }
        frames
    }

    /// Frame-resolution chroma for a whole waveform.
    pub fn chromagram(&self, waveform: &Waveform) -> Chromagram {
        let frames = self.frames(waveform.samples(), waveform.sample_rate());
        debug!(
            "Chromagram: {} frames ({} method, n_fft {}, hop {})",
            frames.len(),
            self.method,
            self.n_fft,
            self.hop_length
        );
        Chromagram {
            frames,
            duration: waveform.duration(),
            sample_rate: waveform.sample_rate(),
        }
    }

    /// Single chroma vector summarising a run of samples: the mean over all
    /// frames, scaled to a peak of 1. Empty or silent input gives all zeros.
    pub fn segment(&self, samples: &[f32], sample_rate: u32) -> ChromaVector {
        let frames = self.frames(samples, sample_rate);
        let mut summary = mean(frames.iter().map(|f| &f.chroma));
        scale_to_peak(&mut summary);
        summary
    }

    /// Segment chroma for `[start, end)` seconds of a waveform, clamped to
    /// the buffer.
    pub fn segment_between(&self, waveform: &Waveform, start: f64, end: f64) -> ChromaVector {
        self.segment(waveform.slice(start, end), waveform.sample_rate())
    }

    fn fold(&self, power: &[f32], sample_rate: u32) -> ChromaVector {
        let mut chroma = [0.0_f32; SEMITONES];
        let bin_width = sample_rate as f32 / self.n_fft as f32;
        for (k, &p) in power.iter().enumerate().skip(1) {
            let freq = k as f32 * bin_width;
            if freq < self.min_freq {
                continue;
            }
            if freq > self.max_freq {
                break;
            }
            if let Some(pc) = PitchClass::from_frequency(freq) {
                chroma[pc.index()] += p;
            }
        }
        chroma
    }

    fn normalize(&self, mut chroma: ChromaVector) -> ChromaVector {
        let peak = chroma.iter().copied().fold(0.0_f32, f32::max);
        if peak <= POWER_FLOOR {
            return [0.0; SEMITONES];
        }
        match self.method {
            ChromaMethod::Stft => {
                for c in chroma.iter_mut() {
                    *c /= peak;
                }
            }
            ChromaMethod::EnergyNormalized => {
                let total: f32 = chroma.iter().sum();
                for c in chroma.iter_mut() {
                    let share = *c / total;
                    *c = QUANT_STEPS.iter().filter(|&&step| share > step).count() as f32
                        * QUANT_WEIGHT;
                }
            }
        }
        chroma
    }
}

impl Default for ChromaExtractor {
    fn default() -> Self {
        Self::new(ChromaMethod::default())
    }
}

/// Periodic Hann window.
pub(crate) fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

fn mean<'a>(vectors: impl Iterator<Item = &'a ChromaVector>) -> ChromaVector {
    let mut sum = [0.0_f32; SEMITONES];
    let mut count = 0usize;
    for v in vectors {
        for (s, x) in sum.iter_mut().zip(v.iter()) {
            *s += x;
        }
        count += 1;
    }
    if count > 0 {
        for s in sum.iter_mut() {
            *s /= count as f32;
        }
    }
    sum
}

fn scale_to_peak(chroma: &mut ChromaVector) {
    let peak = chroma.iter().copied().fold(0.0_f32, f32::max);
    if peak > 0.0 {
        for c in chroma.iter_mut() {
            *c /= peak;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::ChordLabel;
    use crate::classifier::{argmax, ChordStrategy, TemplateCorrelation};

    const RATE: u32 = 22050;

    fn tones(freqs: &[f32], seconds: f32) -> Vec<f32> {
        let n = (seconds * RATE as f32) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / RATE as f32;
                freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() / freqs.len() as f32
            })
            .collect()
    }

    fn strongest(chroma: &ChromaVector, n: usize) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..12).collect();
        idx.sort_by(|&a, &b| chroma[b].total_cmp(&chroma[a]));
        let mut top: Vec<usize> = idx.into_iter().take(n).collect();
        top.sort();
        top
    }

    #[test]
    fn test_a440_lands_in_a() {
        let extractor = ChromaExtractor::default();
        let chroma = extractor.segment(&tones(&[440.0], 1.0), RATE);
        assert_eq!(argmax(&chroma), 9);
        assert!((chroma[9] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_c_major_triad_bins() {
        for method in [ChromaMethod::Stft, ChromaMethod::EnergyNormalized] {
            let extractor = ChromaExtractor::new(method);
            let chroma = extractor.segment(&tones(&[261.63, 329.63, 392.0], 1.0), RATE);
            assert_eq!(strongest(&chroma, 3), vec![0, 4, 7], "method {}", method);
            assert!(chroma.iter().all(|&c| c >= 0.0));
        }
    }

    #[test]
    fn test_empty_and_silent_input() {
        let extractor = ChromaExtractor::default();
        assert!(extractor.frames(&[], RATE).is_empty());
        assert_eq!(extractor.segment(&[], RATE), [0.0; 12]);
        assert_eq!(extractor.segment(&vec![0.0; 10000], RATE), [0.0; 12]);
        // A single sample never panics.
        let one = extractor.segment(&[0.5], RATE);
        assert!(one.iter().all(|c| c.is_finite() && *c >= 0.0));
    }

    #[test]
    fn test_frame_timing() {
        let extractor = ChromaExtractor::with_params(ChromaMethod::Stft, 1024, 512);
        let frames = extractor.frames(&vec![0.1; 4096], 1024);
        assert_eq!(frames.len(), 7);
        assert_eq!(frames[1].start, 0.5);
        assert_eq!(frames[1].end, 1.5);

        let short = extractor.frames(&vec![0.1; 100], 1024);
        assert_eq!(short.len(), 1);
        assert!((short[0].end - 100.0 / 1024.0).abs() < 1e-12);
    }

    #[test]
    fn test_tail_after_last_full_window_is_analysed() {
        let waveform = Waveform::new(tones(&[261.63, 329.63, 392.0], 2.1), RATE);
        let extractor = ChromaExtractor::default();
        let chromagram = extractor.chromagram(&waveform);

        let last = chromagram.frames.last().unwrap();
        assert!((last.end - waveform.duration()).abs() < 1e-9);

        let duration = waveform.duration();
        let tail = chromagram.mean_between(duration - 0.05, duration);
        assert!(tail.iter().any(|&c| c > 0.0));
        assert_eq!(
            TemplateCorrelation::new().classify(&tail),
            Some(ChordLabel::major(0))
        );
    }

    #[test]
    fn test_chromagram_mean_between() {
        let mut samples = tones(&[440.0], 2.0);
        samples.extend(vec![0.0; RATE as usize * 2]);
        let waveform = Waveform::new(samples, RATE);
        let chromagram = ChromaExtractor::default().chromagram(&waveform);

        assert_eq!(argmax(&chromagram.mean_between(0.0, 2.0)), 9);
        assert_eq!(chromagram.mean_between(2.0, 4.0), [0.0; 12]);
        // Shorter than a window: nearest overlapping frame.
        assert_eq!(argmax(&chromagram.mean_between(1.0, 1.01)), 9);
        assert_eq!(chromagram.mean_between(10.0, 11.0), [0.0; 12]);
    }
}
