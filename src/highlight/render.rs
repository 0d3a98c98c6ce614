//! Slide render driver: source text → paragraphs of styled runs.

use tracing::warn;

use super::runs::{build_runs, RenderedRun, RunStyle};
use super::theme::Theme;
use super::tokenizer::{LineLexer, PlainLexer, Tokenizer};
use crate::deck::SlideSpec;
use crate::error::{DeckError, DeckResult};

/// One source line worth of runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// 1-based source line number.
    pub line: usize,
    pub runs: Vec<RenderedRun>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Renders slides against one theme and tokenizer for a whole session.
pub struct SlideRenderer<'a> {
    theme: &'a Theme,
    tokenizer: &'a dyn Tokenizer,
    style: RunStyle,
    fallback_to_plain: bool,
}

impl<'a> SlideRenderer<'a> {
    pub fn new(theme: &'a Theme, tokenizer: &'a dyn Tokenizer, style: RunStyle) -> Self {
        Self {
            theme,
            tokenizer,
            style,
            fallback_to_plain: true,
        }
    }

    /// With `false`, an unknown `lang` fails the slide instead of rendering it
    /// unhighlighted.
    pub fn fallback_to_plain(mut self, enabled: bool) -> Self {
        self.fallback_to_plain = enabled;
        self
    }

    pub fn theme(&self) -> &Theme {
        self.theme
    }

    pub fn render_slide(&self, slide: &SlideSpec) -> DeckResult<Vec<Paragraph>> {
        let mut lexer = self.lexer_for(&slide.lang)?;
        let has_highlights = slide.has_highlights();

        let paragraphs = slide
            .text
            .lines()
            .enumerate()
            .map(|(i, line)| {
                let number = i + 1;
                let tokens = lexer.tokenize_line(&format!("{line}\n"));
                Paragraph {
                    line: number,
                    runs: build_runs(
                        &tokens,
                        slide.is_highlighted(number),
                        has_highlights,
                        self.theme,
                        &self.style,
                    ),
                }
            })
            .collect();
        Ok(paragraphs)
    }

    fn lexer_for(&self, lang: &str) -> DeckResult<Box<dyn LineLexer + 'a>> {
        match self.tokenizer.lexer(lang) {
            Ok(lexer) => Ok(lexer),
            Err(DeckError::UnsupportedLanguage(lang)) if self.fallback_to_plain => {
                warn!("No lexer for '{lang}', rendering without highlighting");
                Ok(Box::new(PlainLexer))
            }
            Err(e) => Err(e),
        }
    }
}
