//! Deck document: the rendered slides as a JSON file (`*.deck.json`).
//!
//! Pass 1 builds it through the mutation primitives below and saves it; pass 2
//! reopens it through the automation host and adds transitions and
//! animations. Geometry is in inches. Embedded audio is base64 WAV.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bridge::write_atomically;
use crate::error::{DeckError, DeckResult};
use crate::highlight::{RenderedRun, Rgb};

pub const DOCUMENT_FORMAT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Margins {
    pub fn uniform(inches: f64) -> Self {
        Self {
            left: inches,
            right: inches,
            top: inches,
            bottom: inches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub font_name: String,
    pub font_size: f32,
    pub color: Rgb,
    /// Brightness delta; `None` when the run is not dimmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
}

impl TextRun {
    pub fn from_rendered(run: &RenderedRun, dim_brightness: f32) -> Self {
        Self {
            text: run.text.clone(),
            font_name: run.font_name.clone(),
            font_size: run.font_size,
            color: run.color,
            brightness: run.dimmed.then_some(dim_brightness),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocParagraph {
    pub line_spacing: f32,
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub id: u32,
    pub frame: Rect,
    pub margins: Margins,
    pub word_wrap: bool,
    pub paragraphs: Vec<DocParagraph>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaShape {
    pub id: u32,
    pub frame: Rect,
    pub mime_type: String,
    /// Base64-encoded media payload.
    pub data: String,
    #[serde(default)]
    pub hide_while_not_playing: bool,
}

impl MediaShape {
    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }

    pub fn bytes(&self) -> DeckResult<Vec<u8>> {
        BASE64
            .decode(&self.data)
            .map_err(|e| DeckError::schema(format!("media shape {}: invalid base64: {e}", self.id)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    TextBox(TextBox),
    Media(MediaShape),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    TextBox,
    Audio,
    Video,
}

impl Shape {
    pub fn id(&self) -> u32 {
        match self {
            Self::TextBox(t) => t.id,
            Self::Media(m) => m.id,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::TextBox(_) => ShapeKind::TextBox,
            Self::Media(m) if m.is_audio() => ShapeKind::Audio,
            Self::Media(_) => ShapeKind::Video,
        }
    }
}

/// How an animation starts relative to the slide's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    OnClick,
    /// Starts together with the previous item, i.e. as soon as the slide shows.
    WithPrevious,
    AfterPrevious,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub shape_id: u32,
    pub effect: u32,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub advance_on_time: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocSlide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Rgb>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub transition: Transition,
    #[serde(default)]
    pub animations: Vec<Animation>,
}

impl DocSlide {
    pub fn shape(&self, id: u32) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id() == id)
    }

    pub fn shape_mut(&mut self, id: u32) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|s| s.id() == id)
    }

    pub fn text_box(&self) -> Option<&TextBox> {
        self.shapes.iter().find_map(|s| match s {
            Shape::TextBox(t) => Some(t),
            Shape::Media(_) => None,
        })
    }

    pub fn audio_shapes(&self) -> impl Iterator<Item = &MediaShape> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Media(m) if m.is_audio() => Some(m),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckDocument {
    pub format: u32,
    pub width_in: f64,
    pub height_in: f64,
    pub slides: Vec<DocSlide>,
    #[serde(default)]
    next_shape_id: u32,
}

impl DeckDocument {
    pub fn new(width_in: f64, height_in: f64) -> Self {
        Self {
            format: DOCUMENT_FORMAT,
            width_in,
            height_in,
            slides: Vec::new(),
            next_shape_id: 1,
        }
    }

    /// Append a blank slide, returning its 0-based position.
    pub fn add_slide(&mut self) -> usize {
        self.slides.push(DocSlide::default());
        self.slides.len() - 1
    }

    pub fn slide(&self, index: usize) -> DeckResult<&DocSlide> {
        self.slides
            .get(index)
            .ok_or_else(|| DeckError::schema(format!("no slide at position {index}")))
    }

    pub fn slide_mut(&mut self, index: usize) -> DeckResult<&mut DocSlide> {
        self.slides
            .get_mut(index)
            .ok_or_else(|| DeckError::schema(format!("no slide at position {index}")))
    }

    pub fn set_background(&mut self, slide: usize, color: Rgb) -> DeckResult<()> {
        self.slide_mut(slide)?.background = Some(color);
        Ok(())
    }

    fn allocate_shape_id(&mut self) -> u32 {
        let id = self.next_shape_id.max(1);
        self.next_shape_id = id + 1;
        id
    }

    pub fn add_text_box(
        &mut self,
        slide: usize,
        frame: Rect,
        margins: Margins,
        word_wrap: bool,
    ) -> DeckResult<u32> {
        self.slide(slide)?;
        let id = self.allocate_shape_id();
        self.slide_mut(slide)?.shapes.push(Shape::TextBox(TextBox {
            id,
            frame,
            margins,
            word_wrap,
            paragraphs: Vec::new(),
        }));
        Ok(id)
    }

    pub fn add_paragraph(
        &mut self,
        slide: usize,
        text_box: u32,
        paragraph: DocParagraph,
    ) -> DeckResult<()> {
        match self.slide_mut(slide)?.shape_mut(text_box) {
            Some(Shape::TextBox(t)) => {
                t.paragraphs.push(paragraph);
                Ok(())
            }
            _ => Err(DeckError::schema(format!(
                "slide position {slide}: shape {text_box} is not a text box"
            ))),
        }
    }

    /// Embed a media file's bytes into the slide.
    pub fn embed_media(
        &mut self,
        slide: usize,
        path: &Path,
        frame: Rect,
        mime_type: &str,
    ) -> DeckResult<u32> {
        self.slide(slide)?;
        let bytes = std::fs::read(path).map_err(|e| DeckError::io_at("read media", path, e))?;
        let id = self.allocate_shape_id();
        debug!("Embedding {} bytes of {mime_type} as shape {id}", bytes.len());
        self.slide_mut(slide)?.shapes.push(Shape::Media(MediaShape {
            id,
            frame,
            mime_type: mime_type.to_string(),
            data: BASE64.encode(bytes),
            hide_while_not_playing: false,
        }));
        Ok(id)
    }

    pub fn to_json(&self) -> DeckResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DeckError::schema(format!("cannot serialize document: {e}")))
    }

    pub fn from_json(contents: &str) -> DeckResult<Self> {
        let doc: Self = serde_json::from_str(contents)
            .map_err(|e| DeckError::schema(format!("invalid deck document: {e}")))?;
        if doc.format != DOCUMENT_FORMAT {
            return Err(DeckError::schema(format!(
                "unsupported document format {} (expected {DOCUMENT_FORMAT})",
                doc.format
            )));
        }
        Ok(doc)
    }

    pub fn save(&self, path: &Path) -> DeckResult<()> {
        write_atomically(path, self.to_json()?.as_bytes(), "save document")
    }

    pub fn load(path: &Path) -> DeckResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DeckError::io_at("open document", path, e))?;
        Self::from_json(&contents)
    }
}
