//! Token categories, colors, and hierarchical color resolution.
//!
//! A category is a dotted path (`keyword.control.rust`); its parent drops the
//! last segment, and the empty path is the root every category ends at. A
//! theme only lists the categories it cares about; everything else resolves
//! through its ancestors.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DeckError, DeckResult};

/// Color returned when neither a category, its ancestors, nor the theme root
/// has a color.
pub const FALLBACK_COLOR: Rgb = Rgb::WHITE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("invalid color '{value}', expected #rrggbb"))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// A node in the token category tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenCategory(String);

impl TokenCategory {
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Build a category from a dotted path. Empty segments are dropped, so
    /// `"keyword..control."` is `keyword.control`.
    pub fn new(path: &str) -> Self {
        let normalized: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        Self(normalized.join("."))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parent(&self) -> Option<TokenCategory> {
        parent_path(&self.0).map(|p| Self(p.to_string()))
    }

    /// This category followed by each ancestor, ending with the root.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            next: Some(self.0.as_str()),
        }
    }
}

impl fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

fn parent_path(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rfind('.').map_or("", |i| &path[..i]))
}

/// Iterator over a category's ancestor paths, inclusive, root last.
pub struct Ancestors<'a> {
    next: Option<&'a str>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = parent_path(current);
        Some(current)
    }
}

/// A named, partial category → color table.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    name: String,
    /// Color of the root category.
    foreground: Option<Rgb>,
    background: Option<Rgb>,
    colors: HashMap<String, Rgb>,
}

impl Theme {
    /// An empty theme: everything resolves to [`FALLBACK_COLOR`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            foreground: None,
            background: None,
            colors: HashMap::new(),
        }
    }

    pub fn with_foreground(mut self, color: Rgb) -> Self {
        self.foreground = Some(color);
        self
    }

    pub fn with_background(mut self, color: Rgb) -> Self {
        self.background = Some(color);
        self
    }

    /// Assign a color to a category. Assigning to the root sets the foreground.
    pub fn with_color(mut self, category: &str, color: Rgb) -> Self {
        let category = TokenCategory::new(category);
        if category.is_root() {
            self.foreground = Some(color);
        } else {
            self.colors.insert(category.0, color);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn background(&self) -> Option<Rgb> {
        self.background
    }

    pub fn len(&self) -> usize {
        self.colors.len() + usize::from(self.foreground.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Color explicitly defined for exactly this category path.
    pub fn get(&self, path: &str) -> Option<Rgb> {
        if path.is_empty() {
            self.foreground
        } else {
            self.colors.get(path).copied()
        }
    }

    pub fn resolve(&self, category: &TokenCategory) -> Rgb {
        resolve(category, self)
    }

    pub fn builtin_names() -> &'static [&'static str] {
        &["monokai", "one-dark"]
    }

    /// Look up a built-in theme.
    pub fn by_name(name: &str) -> DeckResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "monokai" => Ok(monokai()),
            "one-dark" | "onedark" => Ok(one_dark()),
            other => Err(DeckError::theme(format!(
                "unknown theme '{other}' (available: {})",
                Self::builtin_names().join(", ")
            ))),
        }
    }

    pub fn from_yaml(contents: &str) -> DeckResult<Self> {
        let file: ThemeFile = serde_yml::from_str(contents)
            .map_err(|e| DeckError::theme(format!("invalid theme file: {e}")))?;
        let mut theme = Theme::new(file.name);
        theme.foreground = file.foreground;
        theme.background = file.background;
        for (category, color) in file.colors {
            theme = theme.with_color(&category, color);
        }
        Ok(theme)
    }

    pub fn from_file(path: &Path) -> DeckResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DeckError::theme(format!("failed to read '{}': {e}", path.display())))?;
        let theme = Self::from_yaml(&contents)?;
        debug!("Loaded theme '{}' ({} entries) from {}", theme.name, theme.len(), path.display());
        Ok(theme)
    }
}

#[derive(Deserialize)]
struct ThemeFile {
    name: String,
    #[serde(default)]
    foreground: Option<Rgb>,
    #[serde(default)]
    background: Option<Rgb>,
    #[serde(default)]
    colors: HashMap<String, Rgb>,
}

/// Resolve a category to a display color.
///
/// Walks from `category` up to the root and returns the first color the theme
/// defines. Total over every category: at worst the walk reaches the root and
/// returns [`FALLBACK_COLOR`].
pub fn resolve(category: &TokenCategory, theme: &Theme) -> Rgb {
    category
        .ancestors()
        .find_map(|path| theme.get(path))
        .unwrap_or(FALLBACK_COLOR)
}

// --- Built-in themes ---

fn hex(value: u32) -> Rgb {
    Rgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
}

fn monokai() -> Theme {
    Theme::new("monokai")
        .with_foreground(hex(0xf8f8f2))
        .with_background(hex(0x272822))
        .with_color("comment", hex(0x75715e))
        .with_color("string", hex(0xe6db74))
        .with_color("constant", hex(0xae81ff))
        .with_color("keyword", hex(0xf92672))
        .with_color("storage", hex(0xf92672))
        .with_color("storage.type", hex(0x66d9ef))
        .with_color("entity.name", hex(0xa6e22e))
        .with_color("entity.name.tag", hex(0xf92672))
        .with_color("entity.other.inherited-class", hex(0xa6e22e))
        .with_color("entity.other.attribute-name", hex(0xa6e22e))
        .with_color("variable.parameter", hex(0xfd971f))
        .with_color("support", hex(0x66d9ef))
        .with_color("markup.inserted", hex(0xa6e22e))
        .with_color("markup.deleted", hex(0xf92672))
        .with_color("invalid", hex(0xf8f8f0))
}

fn one_dark() -> Theme {
    Theme::new("one-dark")
        .with_foreground(hex(0xabb2bf))
        .with_background(hex(0x282c34))
        .with_color("comment", hex(0x5c6370))
        .with_color("string", hex(0x98c379))
        .with_color("constant", hex(0xd19a66))
        .with_color("constant.character.escape", hex(0x56b6c2))
        .with_color("keyword", hex(0xc678dd))
        .with_color("keyword.operator", hex(0x56b6c2))
        .with_color("storage", hex(0xc678dd))
        .with_color("entity.name.function", hex(0x61afef))
        .with_color("entity.name.type", hex(0xe5c07b))
        .with_color("entity.name.class", hex(0xe5c07b))
        .with_color("entity.name.tag", hex(0xe06c75))
        .with_color("entity.other.attribute-name", hex(0xd19a66))
        .with_color("support.function", hex(0x56b6c2))
        .with_color("support.type", hex(0xe5c07b))
        .with_color("variable", hex(0xe06c75))
}
