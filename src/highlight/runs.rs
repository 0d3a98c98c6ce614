//! Styled text runs for one source line.

use super::theme::{resolve, Rgb, Theme};
use super::tokenizer::Token;

/// Font settings shared by every run on a slide.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStyle {
    pub font_name: String,
    pub font_size: f32,
}

impl Default for RunStyle {
    fn default() -> Self {
        Self {
            font_name: "Consolas".into(),
            font_size: 10.0,
        }
    }
}

/// A styled fragment of a single line.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRun {
    pub text: String,
    pub font_name: String,
    pub font_size: f32,
    pub color: Rgb,
    /// Rendered with the fixed negative brightness delta.
    pub dimmed: bool,
}

/// Dim policy: a line is dimmed only when the slide declares at least one
/// highlighted line and this line is not one of them.
pub fn is_dimmed(is_highlighted: bool, has_highlights: bool) -> bool {
    has_highlights && !is_highlighted
}

/// One run per token, in emission order.
pub fn build_runs(
    tokens: &[Token],
    is_highlighted: bool,
    has_highlights: bool,
    theme: &Theme,
    style: &RunStyle,
) -> Vec<RenderedRun> {
    let dimmed = is_dimmed(is_highlighted, has_highlights);
    tokens
        .iter()
        .map(|token| RenderedRun {
            text: token.text.clone(),
            font_name: style.font_name.clone(),
            font_size: style.font_size,
            color: resolve(&token.category, theme),
            dimmed,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::TokenCategory;

    fn tokens() -> Vec<Token> {
        vec![
            Token::new(TokenCategory::new("keyword.control"), "return"),
            Token::new(TokenCategory::root(), " "),
            Token::new(TokenCategory::new("constant.numeric"), "42"),
            Token::new(TokenCategory::root(), "\n"),
        ]
    }

    fn theme() -> Theme {
        Theme::new("t")
            .with_foreground(Rgb::new(200, 200, 200))
            .with_color("keyword", Rgb::new(255, 0, 0))
            .with_color("constant", Rgb::new(0, 0, 255))
    }

    #[test]
    fn one_run_per_token_in_order() {
        let runs = build_runs(&tokens(), true, true, &theme(), &RunStyle::default());
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["return", " ", "42", "\n"]);
        assert_eq!(runs[0].color, Rgb::new(255, 0, 0));
        assert_eq!(runs[1].color, Rgb::new(200, 200, 200));
        assert_eq!(runs[2].color, Rgb::new(0, 0, 255));
        assert!(runs.iter().all(|r| r.font_name == "Consolas" && r.font_size == 10.0));
    }

    #[test]
    fn dim_policy_table() {
        assert!(!is_dimmed(false, false));
        assert!(!is_dimmed(true, false));
        assert!(!is_dimmed(true, true));
        assert!(is_dimmed(false, true));
    }

    #[test]
    fn dimming_keeps_hue() {
        let bright = build_runs(&tokens(), true, true, &theme(), &RunStyle::default());
        let dim = build_runs(&tokens(), false, true, &theme(), &RunStyle::default());
        assert!(dim.iter().all(|r| r.dimmed));
        assert!(bright.iter().all(|r| !r.dimmed));
        let colors = |runs: &[RenderedRun]| runs.iter().map(|r| r.color).collect::<Vec<_>>();
        assert_eq!(colors(&bright), colors(&dim));
    }

    #[test]
    fn no_tokens_no_runs() {
        assert!(build_runs(&[], false, true, &theme(), &RunStyle::default()).is_empty());
    }
}
