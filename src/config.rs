use crate::chord::NoteNaming;
use crate::chroma::ChromaMethod;
use crate::classifier::StrategyKind;
use crate::error::ConfigError;
use crate::timeline::{GapPolicy, TimelineConfig};
use crate::transcription::TranscriptionQuality;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Fully resolved analysis settings for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub transcription_quality: TranscriptionQuality,
    pub gap_threshold_seconds: f64,
    pub minor_sensitivity: f32,
    pub word_level: bool,
    pub harmonic_separation: bool,
    pub strategy: StrategyKind,
    pub gap_policy: GapPolicy,
    pub gap_window_seconds: f64,
    pub chroma_method: ChromaMethod,
    /// Only the first this-many seconds are analysed; `None` means all.
    pub max_duration_seconds: Option<f64>,
    pub note_naming: NoteNaming,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            transcription_quality: TranscriptionQuality::Base,
            gap_threshold_seconds: 2.0,
            minor_sensitivity: 1.1,
            word_level: true,
            harmonic_separation: false,
            strategy: StrategyKind::Template,
            gap_policy: GapPolicy::Single,
            gap_window_seconds: 2.0,
            chroma_method: ChromaMethod::Stft,
            max_duration_seconds: Some(60.0),
            note_naming: NoteNaming::Letter,
        }
    }
}

impl AnalysisOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("gap_threshold_seconds", self.gap_threshold_seconds)?;
        positive("gap_window_seconds", self.gap_window_seconds)?;
        if !(self.minor_sensitivity.is_finite() && self.minor_sensitivity >= 1.0) {
            return Err(ConfigError::Invalid {
                field: "minor_sensitivity",
                reason: format!("must be at least 1.0, got {}", self.minor_sensitivity),
            });
        }
        if let Some(max) = self.max_duration_seconds {
            if max.is_nan() || max < 0.0 {
                return Err(ConfigError::Invalid {
                    field: "max_duration_seconds",
                    reason: format!("must not be negative, got {}", max),
                });
            }
        }
        Ok(())
    }

    pub fn timeline_config(&self) -> TimelineConfig {
        TimelineConfig {
            gap_threshold: self.gap_threshold_seconds,
            gap_policy: self.gap_policy,
            gap_window: self.gap_window_seconds,
            word_level: self.word_level,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be a positive number of seconds, got {}", value),
        })
    }
}

/// Configuration defaults that can be saved to a file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_quality: Option<TranscriptionQuality>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_threshold: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minor_sensitivity: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_level: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub harmonic_separation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_policy: Option<GapPolicy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_window: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chroma_method: Option<ChromaMethod>,

    /// 0 analyses the whole file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_naming: Option<NoteNaming>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whisper_url: Option<String>,
}

impl Config {
    /// Create a new empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the config file path (~/.state/chordsheet/defaults.toml)
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;
        let config_dir = Path::new(&home).join(".state").join("chordsheet");
        Ok(config_dir.join("defaults.toml"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load config from a file; a missing file is an empty config
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::new());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Merge this config with another, preferring values from other
    pub fn merge(&mut self, other: &Config) {
        if other.transcription_quality.is_some() {
            self.transcription_quality = other.transcription_quality;
        }
        if other.gap_threshold.is_some() {
            self.gap_threshold = other.gap_threshold;
        }
        if other.minor_sensitivity.is_some() {
            self.minor_sensitivity = other.minor_sensitivity;
        }
        if other.word_level.is_some() {
            self.word_level = other.word_level;
        }
        if other.harmonic_separation.is_some() {
            self.harmonic_separation = other.harmonic_separation;
        }
        if other.strategy.is_some() {
            self.strategy = other.strategy;
        }
        if other.gap_policy.is_some() {
            self.gap_policy = other.gap_policy;
        }
        if other.gap_window.is_some() {
            self.gap_window = other.gap_window;
        }
        if other.chroma_method.is_some() {
            self.chroma_method = other.chroma_method;
        }
        if other.max_duration.is_some() {
            self.max_duration = other.max_duration;
        }
        if other.note_naming.is_some() {
            self.note_naming = other.note_naming;
        }
        if other.whisper_url.is_some() {
            self.whisper_url = other.whisper_url.clone();
        }
    }

    /// Fill unset fields from [`AnalysisOptions::default`] and validate.
    pub fn resolve(&self) -> Result<AnalysisOptions, ConfigError> {
        let defaults = AnalysisOptions::default();
        let options = AnalysisOptions {
            transcription_quality: self
                .transcription_quality
                .unwrap_or(defaults.transcription_quality),
            gap_threshold_seconds: self.gap_threshold.unwrap_or(defaults.gap_threshold_seconds),
            minor_sensitivity: self.minor_sensitivity.unwrap_or(defaults.minor_sensitivity),
            word_level: self.word_level.unwrap_or(defaults.word_level),
            harmonic_separation: self
                .harmonic_separation
                .unwrap_or(defaults.harmonic_separation),
            strategy: self.strategy.unwrap_or(defaults.strategy),
            gap_policy: self.gap_policy.unwrap_or(defaults.gap_policy),
            gap_window_seconds: self.gap_window.unwrap_or(defaults.gap_window_seconds),
            chroma_method: self.chroma_method.unwrap_or(defaults.chroma_method),
            max_duration_seconds: match self.max_duration {
                Some(d) if d == 0.0 => None,
                Some(d) => Some(d),
                None => defaults.max_duration_seconds,
            },
            note_naming: self.note_naming.unwrap_or(defaults.note_naming),
        };
        options.validate()?;
        Ok(options)
    }

    /// Print the config in a human-readable format
    pub fn print(&self, title: &str) {
        println!("{}:", title);

        if let Some(quality) = self.transcription_quality {
            println!("  Transcription model: {}", quality);
        }
        if let Some(url) = &self.whisper_url {
            println!("  Whisper server:      {}", url);
        }
        if let Some(gap) = self.gap_threshold {
            println!("  Gap threshold:       {} seconds", gap);
        }
        if let Some(policy) = self.gap_policy {
            println!("  Gap policy:          {}", policy);
        }
        if let Some(window) = self.gap_window {
            println!("  Gap window:          {} seconds", window);
        }
        if let Some(strategy) = self.strategy {
            println!("  Chord strategy:      {}", strategy);
        }
        if let Some(sensitivity) = self.minor_sensitivity {
            println!("  Minor sensitivity:   {}", sensitivity);
        }
        if let Some(method) = self.chroma_method {
            println!("  Chroma method:       {}", method);
        }
        if let Some(word_level) = self.word_level {
            println!("  Word level:          {}", if word_level { "enabled" } else { "disabled" });
        }
        if let Some(hpss) = self.harmonic_separation {
            println!("  Harmonic separation: {}", if hpss { "enabled" } else { "disabled" });
        }
        if let Some(max) = self.max_duration {
            if max == 0.0 {
                println!("  Max duration:        whole file");
            } else {
                println!("  Max duration:        {} seconds", max);
            }
        }
        if let Some(naming) = self.note_naming {
            println!(
                "  Note names:          {}",
                match naming {
                    NoteNaming::Letter => "letter",
                    NoteNaming::Solfege => "solfege",
                }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_resolves_to_defaults() {
        let options = Config::new().resolve().unwrap();
        assert_eq!(options, AnalysisOptions::default());
        assert_eq!(options.max_duration_seconds, Some(60.0));
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            gap_threshold: Some(3.0),
            strategy: Some(StrategyKind::RootThird),
            ..Config::default()
        };
        let overrides = Config {
            gap_threshold: Some(2.5),
            minor_sensitivity: Some(1.05),
            ..Config::default()
        };
        base.merge(&overrides);
        assert_eq!(base.gap_threshold, Some(2.5));
        assert_eq!(base.minor_sensitivity, Some(1.05));
        assert_eq!(base.strategy, Some(StrategyKind::RootThird));
    }

    #[test]
    fn test_resolve_validates() {
        let bad_gap = Config {
            gap_threshold: Some(-1.0),
            ..Config::default()
        };
        assert!(matches!(
            bad_gap.resolve(),
            Err(ConfigError::Invalid { field: "gap_threshold_seconds", .. })
        ));

        let bad_sensitivity = Config {
            minor_sensitivity: Some(0.9),
            ..Config::default()
        };
        assert!(matches!(
            bad_sensitivity.resolve(),
            Err(ConfigError::Invalid { field: "minor_sensitivity", .. })
        ));

        let whole_file = Config {
            max_duration: Some(0.0),
            ..Config::default()
        };
        assert_eq!(whole_file.resolve().unwrap().max_duration_seconds, None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("defaults.toml");
        let config = Config {
            transcription_quality: Some(TranscriptionQuality::Small),
            gap_policy: Some(GapPolicy::Windowed),
            chroma_method: Some(ChromaMethod::EnergyNormalized),
            note_naming: Some(NoteNaming::Solfege),
            word_level: Some(false),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("chroma_method = \"energy-normalized\""));
        assert!(!text.contains("gap_threshold"));

        assert_eq!(Config::load_from(&path).unwrap(), config);
        assert_eq!(
            Config::load_from(&dir.path().join("missing.toml")).unwrap(),
            Config::new()
        );
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defaults.toml");
        fs::write(&path, "strategy = \"neural\"").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_timeline_config() {
        let options = AnalysisOptions {
            gap_threshold_seconds: 3.0,
            word_level: false,
            ..AnalysisOptions::default()
        };
        let timeline = options.timeline_config();
        assert_eq!(timeline.gap_threshold, 3.0);
        assert!(!timeline.word_level);
        assert_eq!(timeline.gap_policy, GapPolicy::Single);
    }
}
