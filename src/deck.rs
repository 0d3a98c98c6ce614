//! Declarative deck description: the slides to build, in order.
//!
//! The same schema is used for the input file and for the intermediate
//! timing file, which only adds `duration` to each slide.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DeckError, DeckResult};

fn default_lang() -> String {
    "text".into()
}

/// One slide: a code snippet plus narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideSpec {
    pub text: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    /// 1-based line numbers. Empty means no line is dimmed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlight: Vec<usize>,
    pub voice: String,
    /// Narration length in seconds, rounded to 2 decimals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl SlideSpec {
    pub fn new(text: impl Into<String>, lang: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: lang.into(),
            highlight: Vec::new(),
            voice: voice.into(),
            duration: None,
        }
    }

    pub fn with_highlight(mut self, lines: impl IntoIterator<Item = usize>) -> Self {
        self.highlight = lines.into_iter().collect();
        self
    }

    pub fn has_highlights(&self) -> bool {
        !self.highlight.is_empty()
    }

    pub fn is_highlighted(&self, line: usize) -> bool {
        self.highlight.contains(&line)
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Input formats recognized by [`DeckState::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckFormat {
    Toml,
    Yaml,
}

impl DeckFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Toml,
        }
    }
}

/// The ordered slides of one deck. Slide order is the identity that ties the
/// rendered document to its timing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckState {
    /// When the timing data was captured (timing file only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// File name of the rendered document (timing file only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    pub slides: Vec<SlideSpec>,
}

impl DeckState {
    pub fn new(slides: Vec<SlideSpec>) -> Self {
        Self {
            generated_at: None,
            document: None,
            slides,
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Stored duration for a 0-based slide position.
    pub fn duration_at(&self, index: usize) -> Option<f64> {
        self.slides.get(index).and_then(|s| s.duration)
    }

    pub fn from_toml_str(contents: &str) -> DeckResult<Self> {
        let deck: Self = toml::from_str(contents).map_err(|e| DeckError::schema(e.to_string()))?;
        deck.validate()?;
        Ok(deck)
    }

    pub fn from_yaml_str(contents: &str) -> DeckResult<Self> {
        let deck: Self =
            serde_yml::from_str(contents).map_err(|e| DeckError::schema(e.to_string()))?;
        deck.validate()?;
        Ok(deck)
    }

    pub fn parse(contents: &str, format: DeckFormat) -> DeckResult<Self> {
        match format {
            DeckFormat::Toml => Self::from_toml_str(contents),
            DeckFormat::Yaml => Self::from_yaml_str(contents),
        }
    }

    /// Read a deck description, picking the format from the file extension.
    pub fn load(path: &Path) -> DeckResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DeckError::io_at("read deck", path, e))?;
        let deck = Self::parse(&contents, DeckFormat::from_path(path))?;
        debug!("Loaded {} slides from {}", deck.len(), path.display());
        Ok(deck)
    }

    pub fn to_toml_string(&self) -> DeckResult<String> {
        toml::to_string(self).map_err(|e| DeckError::schema(format!("cannot serialize deck: {e}")))
    }

    fn validate(&self) -> DeckResult<()> {
        if self.slides.is_empty() {
            warn!("Deck has no slides");
        }
        for (i, slide) in self.slides.iter().enumerate() {
            if slide.lang.trim().is_empty() {
                return Err(DeckError::schema(format!("slide {}: `lang` must not be empty", i + 1)));
            }
            // The timing file is TOML, which has no integers above i64::MAX.
            if let Some(&line) = slide.highlight.iter().find(|&&l| i64::try_from(l).is_err()) {
                return Err(DeckError::schema(format!(
                    "slide {}: highlight line {line} is out of range",
                    i + 1
                )));
            }
            if let Some(d) = slide.duration {
                if !d.is_finite() || d < 0.0 {
                    return Err(DeckError::schema(format!(
                        "slide {}: invalid duration {d}",
                        i + 1
                    )));
                }
            }
        }
        Ok(())
    }
}
