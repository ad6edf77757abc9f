//! Reference pitch-class patterns for the 24 major and minor triads.

use crate::chord::{ChordLabel, ChordQuality, PitchClass, SEMITONES};

/// A 12-bin binary template over pitch classes.
pub type Template = [f32; SEMITONES];

/// Canonical C major shape: root, major third, fifth.
const MAJOR_SHAPE: Template = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];

/// Canonical C minor shape: root, minor third, fifth.
const MINOR_SHAPE: Template = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];

/// Rotate a template so that index 0 moves to `shift`.
fn roll(template: &Template, shift: usize) -> Template {
    let mut out = [0.0; SEMITONES];
    for (i, &value) in template.iter().enumerate() {
        out[(i + shift) % SEMITONES] = value;
    }
    out
}

fn canonical_shape(quality: ChordQuality) -> &'static Template {
    match quality {
        ChordQuality::Major => &MAJOR_SHAPE,
        ChordQuality::Minor => &MINOR_SHAPE,
    }
}

/// Read-only bank of the 24 triad templates.
///
/// Entries are ordered by root (C..B) and, within a root, major before
/// minor. Classification relies on this order for tie-breaking.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordTemplateBank {
    entries: Vec<(ChordLabel, Template)>,
}

impl ChordTemplateBank {
    pub fn new() -> Self {
        let mut entries = Vec::with_capacity(SEMITONES * ChordQuality::ALL.len());
        for root in PitchClass::all() {
            for quality in ChordQuality::ALL {
                let template = roll(canonical_shape(quality), root.index());
                entries.push((ChordLabel::new(root, quality), template));
            }
        }
        Self { entries }
    }

    /// Templates in root-then-quality order.
    pub fn iter(&self) -> impl Iterator<Item = &(ChordLabel, Template)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, label: ChordLabel) -> &Template {
        let index = label.root.index() * ChordQuality::ALL.len()
            + match label.quality {
                ChordQuality::Major => 0,
                ChordQuality::Minor => 1,
            };
        &self.entries[index].1
    }

    pub fn major_template(&self, root: usize) -> &Template {
        self.get(ChordLabel::major(root))
    }

    pub fn minor_template(&self, root: usize) -> &Template {
        self.get(ChordLabel::minor(root))
    }
}

impl Default for ChordTemplateBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ones(template: &Template) -> Vec<usize> {
        template
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_bank_has_24_distinct_entries() {
        let bank = ChordTemplateBank::new();
        assert_eq!(bank.len(), 24);

        let labels: HashSet<ChordLabel> = bank.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels.len(), 24);

        let shapes: HashSet<Vec<usize>> = bank.iter().map(|(_, t)| ones(t)).collect();
        assert_eq!(shapes.len(), 24);
    }

    #[test]
    fn test_templates_are_rotated_triads() {
        let bank = ChordTemplateBank::new();
        for root in 0..12 {
            let mut major: Vec<usize> = [0, 4, 7].iter().map(|o| (o + root) % 12).collect();
            major.sort();
            let mut minor: Vec<usize> = [0, 3, 7].iter().map(|o| (o + root) % 12).collect();
            minor.sort();

            assert_eq!(ones(bank.major_template(root)), major);
            assert_eq!(ones(bank.minor_template(root)), minor);
            assert!(bank.major_template(root).iter().all(|&v| v == 0.0 || v == 1.0));
        }
    }

    #[test]
    fn test_rebuild_is_identical() {
        assert_eq!(ChordTemplateBank::new(), ChordTemplateBank::new());
    }

    #[test]
    fn test_iteration_order() {
        let bank = ChordTemplateBank::new();
        let first: Vec<String> = bank.iter().take(4).map(|(l, _)| l.to_string()).collect();
        assert_eq!(first, vec!["C", "Cm", "C#", "C#m"]);
    }
}
