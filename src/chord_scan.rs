//! Lyric-independent chord scan: one chord per fixed window.

use crate::chord::{chord_name, ChordLabel, NoteNaming, PitchClass};
use crate::chroma::ChromaExtractor;
use crate::classifier::{argmax, sanitize, ChordStrategy};
use crate::waveform::Waveform;
use log::{debug, warn};
use serde::Serialize;

pub const DEFAULT_WINDOW_SECONDS: f64 = 2.0;

/// Chord estimate for one window of audio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowChord {
    pub start: f64,
    pub end: f64,
    pub chord: Option<ChordLabel>,
    /// Strongest pitch class in the window; `None` when it is silent.
    pub dominant: Option<PitchClass>,
}

impl WindowChord {
    /// `MM:SS.ss-MM:SS.ss  Am  (La)`
    pub fn describe(&self, naming: NoteNaming) -> String {
        let chord = match self.chord {
            Some(_) => chord_name(self.chord, naming),
            None => "-".to_string(),
        };
        let dominant = self.dominant.map(|pc| pc.name(naming)).unwrap_or("-");
        format!(
            "{}-{}  {:<5} ({})",
            format_timestamp(self.start),
            format_timestamp(self.end),
            chord,
            dominant
        )
    }
}

/// Window length actually used for a requested one: non-positive or
/// non-finite requests fall back to [`DEFAULT_WINDOW_SECONDS`].
pub fn effective_window(requested: f64) -> f64 {
    if requested.is_finite() && requested > 0.0 {
        requested
    } else {
        warn!(
            "Invalid scan window {}s; using {}s",
            requested, DEFAULT_WINDOW_SECONDS
        );
        DEFAULT_WINDOW_SECONDS
    }
}

/// Walk the waveform in consecutive windows of `window` seconds; the last
/// window may be shorter.
pub fn scan_chords(
    waveform: &Waveform,
    extractor: &ChromaExtractor,
    strategy: &dyn ChordStrategy,
    window: f64,
) -> Vec<WindowChord> {
    let window = effective_window(window);
    let duration = waveform.duration();

    let mut results = Vec::new();
    let mut index = 0usize;
    loop {
        let start = index as f64 * window;
        if start >= duration {
            break;
        }
        let end = (start + window).min(duration);
        let chroma = extractor.segment_between(waveform, start, end);
        let chord = strategy.classify(&chroma);
        let dominant = sanitize(&chroma).map(|clean| PitchClass::new(argmax(&clean)));
        debug!(
            "Window [{:.2}, {:.2}): {:?} via {}",
            start,
            end,
            chord.map(|c| c.to_string()),
            strategy.name()
        );
        results.push(WindowChord {
            start,
            end,
            chord,
            dominant,
        });
        index += 1;
    }
    results
}

/// Seconds as `MM:SS.ss`.
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor();
    format!("{:02}:{:05.2}", minutes as u64, seconds - minutes * 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{RootThirdHeuristic, TemplateCorrelation};
    use std::f32::consts::PI;

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

    #[test]
    fn test_scan_windows() {
        let mut samples = tones(&[261.63, 329.63, 392.0], 2.0);
        samples.extend(vec![0.0; RATE as usize * 2]);
        samples.extend(tones(&[220.0, 261.63, 329.63], 1.0));
        let waveform = Waveform::new(samples, RATE);

        let windows = scan_chords(
            &waveform,
            &ChromaExtractor::default(),
            &TemplateCorrelation::new(),
            2.0,
        );
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].chord, Some(ChordLabel::major(0)));
        assert!(windows[0].dominant.is_some());
        assert_eq!(windows[1].chord, None);
        assert_eq!(windows[1].dominant, None);
        assert_eq!(windows[2].chord, Some(ChordLabel::minor(9)));
        assert_eq!(windows[2].start, 4.0);
        assert_eq!(windows[2].end, 5.0);
    }

    #[test]
    fn test_scan_empty_waveform() {
        let waveform = Waveform::new(Vec::new(), RATE);
        let windows = scan_chords(
            &waveform,
            &ChromaExtractor::default(),
            &RootThirdHeuristic::default(),
            2.0,
        );
        assert!(windows.is_empty());
    }

    #[test]
    fn test_nonsense_window_uses_default() {
        let waveform = Waveform::new(vec![0.0; RATE as usize * 3], RATE);
        let windows = scan_chords(
            &waveform,
            &ChromaExtractor::default(),
            &TemplateCorrelation::new(),
            0.0,
        );
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_effective_window() {
        assert_eq!(effective_window(0.5), 0.5);
        assert_eq!(effective_window(0.0), DEFAULT_WINDOW_SECONDS);
        assert_eq!(effective_window(-3.0), DEFAULT_WINDOW_SECONDS);
        assert_eq!(effective_window(f64::NAN), DEFAULT_WINDOW_SECONDS);
    }

    #[test]
    fn test_describe() {
        let row = WindowChord {
            start: 62.5,
            end: 64.5,
            chord: Some(ChordLabel::minor(9)),
            dominant: Some(PitchClass::new(9)),
        };
        assert_eq!(format_timestamp(62.5), "01:02.50");
        assert_eq!(row.describe(NoteNaming::Letter), "01:02.50-01:04.50  Am    (A)");
        assert_eq!(row.describe(NoteNaming::Solfege), "01:02.50-01:04.50  Lam   (La)");

        let silent = WindowChord {
            start: 0.0,
            end: 2.0,
            chord: None,
            dominant: None,
        };
        assert_eq!(silent.describe(NoteNaming::Letter), "00:00.00-00:02.00  -     (-)");
    }
}
