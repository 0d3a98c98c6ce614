//! Code highlighting: category → color resolution, per-line runs, and the
//! slide-level driver.

pub mod render;
pub mod runs;
pub mod theme;
pub mod tokenizer;

pub use render::{Paragraph, SlideRenderer};
pub use runs::{build_runs, is_dimmed, RenderedRun, RunStyle};
pub use theme::{resolve, Rgb, Theme, TokenCategory, FALLBACK_COLOR};
pub use tokenizer::{LineLexer, PlainLexer, SyntectTokenizer, Token, Tokenizer};
