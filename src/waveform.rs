//! Decoded mono audio and clamped time-range access.

use log::warn;
use std::ops::Range;

/// Mono samples plus their sample rate. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Sample index for a time, clamped to `0..=len`.
    pub fn time_to_index(&self, seconds: f64) -> usize {
        if seconds.is_nan() || seconds <= 0.0 {
            return 0;
        }
        let index = (seconds * self.sample_rate as f64).round();
        if index >= self.samples.len() as f64 {
            self.samples.len()
        } else {
            index as usize
        }
    }

    /// Sample range covering `[start, end)` seconds, clamped to the buffer.
    ///
    /// A zero-width or inverted request is widened to one sample starting at
    /// `start`, so it still yields data unless `start` lies past the end of
    /// the buffer.
    pub fn range(&self, start: f64, end: f64) -> Range<usize> {
        let lo = self.time_to_index(start);
        let mut hi = self.time_to_index(end);
        if hi <= lo {
            hi = (lo + 1).min(self.samples.len());
        }
        lo..hi
    }

    /// Samples covering `[start, end)` seconds; empty when the request lies
    /// entirely outside the buffer.
    pub fn slice(&self, start: f64, end: f64) -> &[f32] {
        let range = self.range(start, end);
        if range.is_empty() && start < self.duration() {
            warn!(
                "Empty sample range for [{:.3}, {:.3}) in {:.3}s of audio",
                start,
                end,
                self.duration()
            );
        }
        &self.samples[range]
    }

    /// Keep only the first `seconds` of audio. Returns true if anything was
    /// dropped.
    pub fn truncate(&mut self, seconds: f64) -> bool {
        let keep = self.time_to_index(seconds);
        if keep < self.samples.len() {
            self.samples.truncate(keep);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(len: usize, rate: u32) -> Waveform {
        Waveform::new((0..len).map(|i| i as f32).collect(), rate)
    }

    #[test]
    fn test_duration() {
        assert_eq!(wave(44100, 22050).duration(), 2.0);
        assert_eq!(Waveform::new(vec![], 0).duration(), 0.0);
    }

    #[test]
    fn test_range_clamps_to_buffer() {
        let w = wave(100, 10);
        assert_eq!(w.range(0.0, 2.0), 0..20);
        assert_eq!(w.range(5.0, 50.0), 50..100);
        assert_eq!(w.range(-3.0, 1.0), 0..10);
        assert_eq!(w.range(20.0, 30.0), 100..100);
        assert!(w.slice(20.0, 30.0).is_empty());
    }

    #[test]
    fn test_zero_width_and_inverted_ranges() {
        let w = wave(100, 10);
        assert_eq!(w.range(3.0, 3.0), 30..31);
        assert_eq!(w.range(4.0, 2.0), 40..41);
        assert_eq!(w.slice(4.0, 2.0), &[40.0]);
        assert_eq!(w.range(10.0, 10.0), 100..100);
    }

    #[test]
    fn test_non_finite_times() {
        let w = wave(100, 10);
        assert_eq!(w.range(f64::NAN, f64::INFINITY), 0..100);
    }

    #[test]
    fn test_truncate() {
        let mut w = wave(100, 10);
        assert!(w.truncate(6.0));
        assert_eq!(w.len(), 60);
        assert!(!w.truncate(60.0));
        assert_eq!(w.len(), 60);
    }
}
