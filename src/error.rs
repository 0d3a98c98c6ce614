//! Error taxonomy shared by both passes.

use std::path::Path;

/// Convenience result type used across deckcast.
pub type DeckResult<T> = Result<T, DeckError>;

#[derive(thiserror::Error, Debug)]
pub enum DeckError {
    /// Malformed declarative input. Raised before any rendering starts.
    #[error("schema error: {0}")]
    Schema(String),

    /// No lexer is registered for the slide's `lang`.
    #[error("unsupported language '{0}'")]
    UnsupportedLanguage(String),

    /// The narration backend failed or produced unusable audio.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Unknown theme name or malformed theme file.
    #[error("theme error: {0}")]
    Theme(String),

    /// Persistence or document save failure.
    #[error("io error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Second-pass host failure.
    #[error("automation error: {0}")]
    Automation(String),

    /// Any of the above, tagged with the 1-based slide it happened on.
    #[error("slide {index}: {source}")]
    Slide {
        index: usize,
        #[source]
        source: Box<DeckError>,
    },
}

impl DeckError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub fn theme(msg: impl Into<String>) -> Self {
        Self::Theme(msg.into())
    }

    pub fn automation(msg: impl Into<String>) -> Self {
        Self::Automation(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// IO error whose context is "`action` 'path'".
    pub fn io_at(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("{action} '{}'", path.display()), source)
    }

    /// Attach a 1-based slide index. Already-tagged errors are left alone.
    pub fn at_slide(self, index: usize) -> Self {
        match self {
            Self::Slide { .. } => self,
            other => Self::Slide {
                index,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping slide tagging.
    pub fn kind(&self) -> &DeckError {
        match self {
            Self::Slide { source, .. } => source.kind(),
            other => other,
        }
    }
}
