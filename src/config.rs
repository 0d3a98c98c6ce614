//! Configuration management for deckcast.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults that produce the standard 16:9 code slide, so an empty or missing
//! file produces a working setup.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::highlight::Rgb;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub theme: String,
    /// Optional YAML theme file; overrides `theme` when set.
    pub theme_file: Option<PathBuf>,
    pub font_name: String,
    pub font_size: f32,
    pub line_spacing: f32,
    pub dim_brightness: f32,
    pub fallback_to_plain: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            theme: "monokai".into(),
            theme_file: None,
            font_name: "Consolas".into(),
            font_size: 10.0,
            line_spacing: 1.0,
            dim_brightness: -0.6,
            fallback_to_plain: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlideConfig {
    pub width_in: f64,
    pub height_in: f64,
    pub margin_in: f64,
    pub background: Rgb,
    pub audio_size_in: f64,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            width_in: 10.0,
            height_in: 5.625,
            margin_in: 0.25,
            background: Rgb::BLACK,
            audio_size_in: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisFailurePolicy {
    /// Stop the whole generation run.
    Abort,
    /// Leave the slide without audio and without a duration.
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub capture_durations: bool,
    pub persist_intermediate: bool,
    pub on_synthesis_error: SynthesisFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_durations: true,
            persist_intermediate: true,
            on_synthesis_error: SynthesisFailurePolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsBackend {
    Kokoro,
    Http,
    Silent,
}

impl TtsBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kokoro" => Some(Self::Kokoro),
            "http" => Some(Self::Http),
            "silent" => Some(Self::Silent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub backend: TtsBackend,
    pub voice: String,
    pub speed: f32,
    pub model_path: String,
    pub voices_path: String,
    pub tokenizer_path: String,
    /// Remote synthesis endpoint for the `http` backend.
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Speaking rate assumed by the `silent` backend.
    pub words_per_minute: u32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: TtsBackend::Kokoro,
            voice: "af_heart".into(),
            speed: 1.0,
            model_path: String::new(),
            voices_path: String::new(),
            tokenizer_path: String::new(),
            endpoint: "http://127.0.0.1:8767/synthesize".into(),
            timeout_secs: 120,
            words_per_minute: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchFailurePolicy {
    /// Log the slide failure, patch the remaining slides, save, report.
    Continue,
    /// Stop at the first failing slide without saving.
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub transition_effect: u32,
    pub transition_duration: f64,
    pub advance_pad: f64,
    pub media_effect: u32,
    pub on_error: PatchFailurePolicy,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            transition_effect: 3956,
            transition_duration: 1.5,
            advance_pad: 0.5,
            media_effect: 83,
            on_error: PatchFailurePolicy::Continue,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub slide: SlideConfig,
    pub pipeline: PipelineConfig,
    pub tts: TtsConfig,
    pub timing: TimingConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./deckcast.yaml
    /// 2. ~/.config/deckcast/config.yaml
    /// 3. /etc/deckcast/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("deckcast.yaml")),
                dirs::home_dir().map(|h| h.join(".config/deckcast/config.yaml")),
                Some(PathBuf::from("/etc/deckcast/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}
