//! Template correlation - dot product of the chroma vector with every triad
//! template, highest score wins.

use super::{sanitize, ChordStrategy};
use crate::chord::ChordLabel;
use crate::chroma::ChromaVector;
use crate::templates::{ChordTemplateBank, Template};

pub struct TemplateCorrelation {
    bank: ChordTemplateBank,
}

impl TemplateCorrelation {
    pub fn new() -> Self {
        Self::with_bank(ChordTemplateBank::new())
    }

    pub fn with_bank(bank: ChordTemplateBank) -> Self {
        Self { bank }
    }

    fn dot(a: &ChromaVector, b: &Template) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    /// Similarity of `chroma` to every template, in bank order.
    pub fn scores(&self, chroma: &ChromaVector) -> Vec<(ChordLabel, f32)> {
        self.bank
            .iter()
            .map(|(label, template)| (*label, Self::dot(chroma, template)))
            .collect()
    }
}

impl Default for TemplateCorrelation {
    fn default() -> Self {
        Self::new()
    }
}

impl ChordStrategy for TemplateCorrelation {
    fn classify(&self, chroma: &ChromaVector) -> Option<ChordLabel> {
        let chroma = sanitize(chroma)?;

        // Strictly greater keeps the first template in root order on ties.
        let mut best: Option<(ChordLabel, f32)> = None;
        for (label, template) in self.bank.iter() {
            let score = Self::dot(&chroma, template);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((*label, score)),
            }
        }
        best.map(|(label, _)| label)
    }

    fn name(&self) -> &str {
        "Template Correlation"
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
    fn test_pure_triads() {
        let classifier = TemplateCorrelation::new();
        for root in 0..12 {
            let major = vector(&[(root, 1.0), ((root + 4) % 12, 1.0), ((root + 7) % 12, 1.0)]);
            assert_eq!(classifier.classify(&major), Some(ChordLabel::major(root)));

            let minor = vector(&[(root, 1.0), ((root + 3) % 12, 1.0), ((root + 7) % 12, 1.0)]);
            assert_eq!(classifier.classify(&minor), Some(ChordLabel::minor(root)));
        }
    }

    #[test]
    fn test_tie_break_is_root_order() {
        // A lone C matches C, Cm, F, Fm, Ab and Am equally; C comes first.
        let classifier = TemplateCorrelation::new();
        assert_eq!(classifier.classify(&vector(&[(0, 1.0)])), Some(ChordLabel::major(0)));
        // A lone A: first templates containing A in root order are D, F#m... D major (D F# A).
        assert_eq!(classifier.classify(&vector(&[(9, 1.0)])), Some(ChordLabel::major(2)));
    }

    #[test]
    fn test_deterministic() {
        let classifier = TemplateCorrelation::new();
        let v = vector(&[(2, 0.3), (5, 0.9), (9, 0.7), (11, 0.1)]);
        let first = classifier.classify(&v);
        for _ in 0..10 {
            assert_eq!(classifier.classify(&v), first);
        }
        assert_eq!(first, Some(ChordLabel::minor(2)));
    }

    #[test]
    fn test_scores_cover_bank() {
        let classifier = TemplateCorrelation::new();
        let scores = classifier.scores(&vector(&[(0, 1.0), (4, 1.0), (7, 1.0)]));
        assert_eq!(scores.len(), 24);
        assert_eq!(scores[0], (ChordLabel::major(0), 3.0));
    }

    #[test]
    fn test_silence_is_no_chord() {
        assert_eq!(TemplateCorrelation::new().classify(&[0.0; 12]), None);
    }
}
