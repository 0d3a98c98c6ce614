//! Line tokenizers: plain text and syntect-backed.
//!
//! A [`Tokenizer`] hands out one [`LineLexer`] per slide so multi-line
//! constructs (block comments, doc strings) keep their parse state from one
//! line to the next.

use syntect::easy::ScopeRegionIterator;
use syntect::parsing::{ParseState, ScopeStack, SyntaxSet};
use tracing::warn;

use super::theme::TokenCategory;
use crate::error::{DeckError, DeckResult};

/// One lexical fragment of a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub category: TokenCategory,
    pub text: String,
}

impl Token {
    pub fn new(category: TokenCategory, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
        }
    }
}

pub trait LineLexer {
    /// Tokenize one line. `line` includes its terminator.
    fn tokenize_line(&mut self, line: &str) -> Vec<Token>;
}

pub trait Tokenizer {
    /// A fresh lexer for `language`, or [`DeckError::UnsupportedLanguage`].
    fn lexer<'a>(&'a self, language: &str) -> DeckResult<Box<dyn LineLexer + 'a>>;
}

/// Language identifiers served by [`PlainLexer`].
pub fn is_plain_language(language: &str) -> bool {
    matches!(
        language.trim().to_ascii_lowercase().as_str(),
        "" | "text" | "plain" | "plaintext" | "txt"
    )
}

/// The "no highlighting" lexer: the whole line is one root-category token.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainLexer;

impl LineLexer for PlainLexer {
    fn tokenize_line(&mut self, line: &str) -> Vec<Token> {
        if line.is_empty() {
            return Vec::new();
        }
        vec![Token::new(TokenCategory::root(), line)]
    }
}

/// Tokenizer backed by syntect's bundled grammars.
pub struct SyntectTokenizer {
    syntax_set: SyntaxSet,
}

impl SyntectTokenizer {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }

    /// Names of the bundled grammars.
    pub fn languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .syntax_set
            .syntaxes()
            .iter()
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Default for SyntectTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for SyntectTokenizer {
    fn lexer<'a>(&'a self, language: &str) -> DeckResult<Box<dyn LineLexer + 'a>> {
        if is_plain_language(language) {
            return Ok(Box::new(PlainLexer));
        }
        let syntax = self
            .syntax_set
            .find_syntax_by_token(language.trim())
            .ok_or_else(|| DeckError::UnsupportedLanguage(language.to_string()))?;
        Ok(Box::new(SyntectLexer {
            syntax_set: &self.syntax_set,
            state: ParseState::new(syntax),
            stack: ScopeStack::new(),
            broken: false,
        }))
    }
}

struct SyntectLexer<'a> {
    syntax_set: &'a SyntaxSet,
    state: ParseState,
    stack: ScopeStack,
    /// Set after a parse failure; remaining lines are emitted unstyled.
    broken: bool,
}

impl LineLexer for SyntectLexer<'_> {
    fn tokenize_line(&mut self, line: &str) -> Vec<Token> {
        if self.broken {
            return PlainLexer.tokenize_line(line);
        }

        let ops = match self.state.parse_line(line, self.syntax_set) {
            Ok(ops) => ops,
            Err(e) => {
                warn!("Syntax parse failed, continuing without highlighting: {e}");
                self.broken = true;
                return PlainLexer.tokenize_line(line);
            }
        };

        let mut tokens: Vec<Token> = Vec::new();
        for (text, op) in ScopeRegionIterator::new(&ops, line) {
            if let Err(e) = self.stack.apply(op) {
                warn!("Scope stack error, continuing without highlighting: {e:?}");
                self.broken = true;
                tokens.push(Token::new(TokenCategory::root(), text));
                continue;
            }
            if text.is_empty() {
                continue;
            }

            let scopes: Vec<String> = self
                .stack
                .as_slice()
                .iter()
                .map(|s| s.build_string())
                .collect();
            let category = category_for_scopes(&scopes);

            // Adjacent fragments with the same category become one token.
            match tokens.last_mut() {
                Some(last) if last.category == category => last.text.push_str(text),
                _ => tokens.push(Token::new(category, text)),
            }
        }
        tokens
    }
}

/// Pick the category for a fragment from its scope stack (outermost first).
///
/// The innermost scope wins, except that structural scopes (`source.*`,
/// `text.*`, `meta.*`) never do, and delimiter punctuation defers to the scope
/// it delimits so string quotes color like the string.
pub(crate) fn category_for_scopes(scopes: &[String]) -> TokenCategory {
    let is_structural = |s: &str| {
        s.starts_with("source.") || s.starts_with("text.") || s.starts_with("meta.") || s == "source"
    };

    for (i, scope) in scopes.iter().enumerate().rev() {
        if is_structural(scope) {
            continue;
        }
        if scope.starts_with("punctuation.definition.")
            && scopes[..i].iter().any(|outer| !is_structural(outer))
        {
            continue;
        }
        return TokenCategory::new(scope);
    }
    TokenCategory::root()
}
