//! Chord classification strategies.
//!
//! Two interchangeable approaches map a 12-bin chroma vector to a chord:
//! - Template correlation against the 24-entry triad bank
//! - Root/third heuristic (strongest bin is the root, compare the thirds)
//!
//! Both return `None` for a vector with no usable energy.

pub mod root_third;
pub mod template_correlation;

pub use root_third::RootThirdHeuristic;
pub use template_correlation::TemplateCorrelation;

use crate::chord::{ChordLabel, SEMITONES};
use crate::chroma::ChromaVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Total energy below which a chroma vector carries no information.
const MIN_TOTAL_ENERGY: f32 = 1e-9;

/// Common trait for chord classification strategies.
pub trait ChordStrategy: Send + Sync {
    /// Best chord for an observed chroma vector, or `None` when the vector
    /// is all zero (or otherwise has no usable energy).
    fn classify(&self, chroma: &ChromaVector) -> Option<ChordLabel>;

    /// Strategy name for logs.
    fn name(&self) -> &str;
}

/// Selectable classification strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    Template,
    RootThird,
}

impl StrategyKind {
    /// Build the strategy. `minor_sensitivity` only affects the root/third
    /// heuristic.
    pub fn build(self, minor_sensitivity: f32) -> Box<dyn ChordStrategy> {
        match self {
            StrategyKind::Template => Box::new(TemplateCorrelation::new()),
            StrategyKind::RootThird => Box::new(RootThirdHeuristic::new(minor_sensitivity)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Template => write!(f, "template"),
            StrategyKind::RootThird => write!(f, "root-third"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "template" | "templates" => Ok(StrategyKind::Template),
            "root-third" | "root_third" | "heuristic" => Ok(StrategyKind::RootThird),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

/// Replace negative and non-finite bins with zero and report whether any
/// energy is left.
pub(crate) fn sanitize(chroma: &ChromaVector) -> Option<ChromaVector> {
    let mut clean = [0.0_f32; SEMITONES];
    for (dst, &src) in clean.iter_mut().zip(chroma.iter()) {
        *dst = if src.is_finite() && src > 0.0 { src } else { 0.0 };
    }
    let total: f32 = clean.iter().sum();
    if total > MIN_TOTAL_ENERGY {
        Some(clean)
    } else {
        None
    }
}

/// Index of the largest bin; the first one wins on ties.
pub(crate) fn argmax(chroma: &ChromaVector) -> usize {
    let mut best = 0;
    for (i, &value) in chroma.iter().enumerate().skip(1) {
        if value > chroma[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_rejects_silence() {
        assert!(sanitize(&[0.0; 12]).is_none());
        assert!(sanitize(&[f32::NAN; 12]).is_none());
        let mut v = [0.0; 12];
        v[3] = -1.0;
        assert!(sanitize(&v).is_none());
        v[5] = 0.5;
        let clean = sanitize(&v).unwrap();
        assert_eq!(clean[3], 0.0);
        assert_eq!(clean[5], 0.5);
    }

    #[test]
    fn test_argmax_first_wins() {
        let mut v = [0.0; 12];
        v[4] = 1.0;
        v[9] = 1.0;
        assert_eq!(argmax(&v), 4);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("template".parse::<StrategyKind>().unwrap(), StrategyKind::Template);
        assert_eq!("root-third".parse::<StrategyKind>().unwrap(), StrategyKind::RootThird);
        assert!("sevenths".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_all_strategies_total_on_nonzero_input() {
        for kind in [StrategyKind::Template, StrategyKind::RootThird] {
            let strategy = kind.build(1.1);
            for i in 0..12 {
                let mut v = [0.0; 12];
                v[i] = 0.25;
                assert!(strategy.classify(&v).is_some(), "{} failed on bin {}", strategy.name(), i);
            }
            assert!(strategy.classify(&[0.0; 12]).is_none());
        }
    }
}
