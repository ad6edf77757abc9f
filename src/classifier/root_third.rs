//! Root/third heuristic - the strongest pitch class is taken as the root and
//! the quality is decided by comparing the minor and major third above it.

use super::{argmax, sanitize, ChordStrategy};
use crate::chord::{ChordLabel, ChordQuality, PitchClass};
use crate::chroma::ChromaVector;

/// Default minor-third sensitivity.
pub const DEFAULT_MINOR_SENSITIVITY: f32 = 1.1;

pub struct RootThirdHeuristic {
    /// Minor when minor-third energy exceeds major-third energy times this.
    minor_sensitivity: f32,
}

impl RootThirdHeuristic {
    pub fn new(minor_sensitivity: f32) -> Self {
        Self { minor_sensitivity }
    }
}

impl Default for RootThirdHeuristic {
    fn default() -> Self {
        Self::new(DEFAULT_MINOR_SENSITIVITY)
    }
}

impl ChordStrategy for RootThirdHeuristic {
    fn classify(&self, chroma: &ChromaVector) -> Option<ChordLabel> {
        let chroma = sanitize(chroma)?;
        let root = argmax(&chroma);

        let major_third = chroma[(root + 4) % 12];
        let minor_third = chroma[(root + 3) % 12];

        let quality = if minor_third > major_third * self.minor_sensitivity {
            ChordQuality::Minor
        } else {
            ChordQuality::Major
        };
        Some(ChordLabel::new(PitchClass::new(root), quality))
    }

    fn name(&self) -> &str {
        "Root/Third Heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(bins: &[(usize, f32)]) -> ChromaVector {
        let mut v = [0.0; 12];
        for &(i, e) in bins {
            v[i] = e;
        }
        v
    }

    #[test]
    fn test_c_minor_and_c_major() {
        let heuristic = RootThirdHeuristic::default();
        let c_minor = vector(&[(0, 1.0), (3, 1.0), (7, 1.0)]);
        let c_major = vector(&[(0, 1.0), (4, 1.0), (7, 1.0)]);

        assert_eq!(heuristic.classify(&c_minor).unwrap().to_string(), "Cm");
        assert_eq!(heuristic.classify(&c_major).unwrap().to_string(), "C");
    }

    #[test]
    fn test_sensitivity_threshold() {
        // Minor third is 8% stronger than the major third.
        let v = vector(&[(9, 1.0), (0, 0.54), (1, 0.5)]);
        assert_eq!(RootThirdHeuristic::new(1.05).classify(&v), Some(ChordLabel::minor(9)));
        assert_eq!(RootThirdHeuristic::new(1.1).classify(&v), Some(ChordLabel::major(9)));
    }

    #[test]
    fn test_equal_thirds_are_major() {
        let v = vector(&[(2, 1.0), (5, 0.5), (6, 0.5)]);
        assert_eq!(RootThirdHeuristic::new(1.0).classify(&v), Some(ChordLabel::major(2)));
    }

    #[test]
    fn test_root_wraps_around_octave() {
        // B minor: B D F#
        let v = vector(&[(11, 1.0), (2, 0.8), (6, 0.6)]);
        assert_eq!(RootThirdHeuristic::default().classify(&v), Some(ChordLabel::minor(11)));
    }

    #[test]
    fn test_silence_is_no_chord() {
        assert_eq!(RootThirdHeuristic::default().classify(&[0.0; 12]), None);
    }
}
