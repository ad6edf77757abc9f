//! Pitch classes and chord labels.
//!
//! A chord label is a (root, quality) pair. Equality is on the pair itself;
//! the display name depends on the chosen [`NoteNaming`] and is never used
//! for comparison.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of pitch classes in an octave.
pub const SEMITONES: usize = 12;

const LETTER_NAMES: [&str; SEMITONES] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const SOLFEGE_NAMES: [&str; SEMITONES] = [
    "Do", "Do#", "Re", "Re#", "Mi", "Fa", "Fa#", "Sol", "Sol#", "La", "La#", "Si",
];

/// One of the twelve pitch classes, 0 = C up to 11 = B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct PitchClass(u8);

impl PitchClass {
    /// Pitch class for `index`, folded into the octave.
    pub fn new(index: usize) -> Self {
        PitchClass((index % SEMITONES) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Pitch class `semitones` above this one.
    pub fn transpose(self, semitones: usize) -> Self {
        Self::new(self.index() + semitones)
    }

    /// All twelve pitch classes in semitone order.
    pub fn all() -> impl Iterator<Item = PitchClass> {
        (0..SEMITONES).map(PitchClass::new)
    }

    pub fn name(self, naming: NoteNaming) -> &'static str {
        match naming {
            NoteNaming::Letter => LETTER_NAMES[self.index()],
            NoteNaming::Solfege => SOLFEGE_NAMES[self.index()],
        }
    }

    /// Nearest pitch class to a frequency, with A4 = 440 Hz.
    ///
    /// Returns `None` for non-positive or non-finite frequencies.
    pub fn from_frequency(freq: f32) -> Option<Self> {
        if !(freq.is_finite() && freq > 0.0) {
            return None;
        }
        let midi = 69.0 + 12.0 * (freq / 440.0).log2();
        let note = midi.round() as i64;
        Some(Self::new(note.rem_euclid(SEMITONES as i64) as usize))
    }
}

impl From<PitchClass> for u8 {
    fn from(pc: PitchClass) -> u8 {
        pc.0
    }
}

impl TryFrom<u8> for PitchClass {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (value as usize) < SEMITONES {
            Ok(PitchClass(value))
        } else {
            Err(format!("pitch class out of range: {}", value))
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name(NoteNaming::Letter))
    }
}

/// Triad quality. Only major and minor triads are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChordQuality {
    Major,
    Minor,
}

impl ChordQuality {
    /// Iteration order used everywhere a deterministic order matters.
    pub const ALL: [ChordQuality; 2] = [ChordQuality::Major, ChordQuality::Minor];

    /// Semitone offsets of the triad above its root.
    pub fn intervals(self) -> [usize; 3] {
        match self {
            ChordQuality::Major => [0, 4, 7],
            ChordQuality::Minor => [0, 3, 7],
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
        }
    }
}

/// How note names are spelled when a label is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteNaming {
    /// C, C#, D ...
    #[default]
    Letter,
    /// Do, Do#, Re ...
    Solfege,
}

/// A detected chord: root pitch class plus triad quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChordLabel {
    pub root: PitchClass,
    pub quality: ChordQuality,
}

impl ChordLabel {
    pub fn new(root: PitchClass, quality: ChordQuality) -> Self {
        Self { root, quality }
    }

    pub fn major(root: usize) -> Self {
        Self::new(PitchClass::new(root), ChordQuality::Major)
    }

    pub fn minor(root: usize) -> Self {
        Self::new(PitchClass::new(root), ChordQuality::Minor)
    }

    /// Pitch classes sounding in this triad, root first.
    pub fn pitch_classes(&self) -> [PitchClass; 3] {
        self.quality.intervals().map(|i| self.root.transpose(i))
    }

    /// Display name, e.g. `"Am"` or `"Lam"` depending on `naming`.
    pub fn name(&self, naming: NoteNaming) -> String {
        format!("{}{}", self.root.name(naming), self.quality.suffix())
    }
}

impl fmt::Display for ChordLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name(NoteNaming::Letter))
    }
}

/// Display name for an optional chord; the no-chord sentinel renders empty.
pub fn chord_name(chord: Option<ChordLabel>, naming: NoteNaming) -> String {
    chord.map(|c| c.name(naming)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_names() {
        assert_eq!(ChordLabel::major(0).to_string(), "C");
        assert_eq!(ChordLabel::minor(9).to_string(), "Am");
        assert_eq!(ChordLabel::minor(1).to_string(), "C#m");
        assert_eq!(ChordLabel::major(7).name(NoteNaming::Solfege), "Sol");
        assert_eq!(ChordLabel::minor(9).name(NoteNaming::Solfege), "Lam");
    }

    #[test]
    fn test_equality_is_by_root_and_quality() {
        assert_eq!(ChordLabel::major(12), ChordLabel::major(0));
        assert_ne!(ChordLabel::major(0), ChordLabel::minor(0));
        assert_eq!(chord_name(None, NoteNaming::Letter), "");
    }

    #[test]
    fn test_pitch_class_from_frequency() {
        assert_eq!(PitchClass::from_frequency(440.0), Some(PitchClass::new(9)));
        assert_eq!(PitchClass::from_frequency(261.63), Some(PitchClass::new(0)));
        assert_eq!(PitchClass::from_frequency(55.0), Some(PitchClass::new(9)));
        assert_eq!(PitchClass::from_frequency(0.0), None);
        assert_eq!(PitchClass::from_frequency(f32::NAN), None);
    }

    #[test]
    fn test_triad_pitch_classes() {
        let am = ChordLabel::minor(9);
        let pcs: Vec<usize> = am.pitch_classes().iter().map(|p| p.index()).collect();
        assert_eq!(pcs, vec![9, 0, 4]);
    }
}
