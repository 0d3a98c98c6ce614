//! Automation host over a deck document on disk.
//!
//! `open` loads the JSON document, the primitives edit it in memory, and
//! `save_and_close` writes it back atomically.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::host::{AutomationHost, ShapeInfo};
use crate::document::{Animation, DeckDocument, DocSlide, Shape, Trigger};
use crate::error::{DeckError, DeckResult};

#[derive(Default)]
pub struct FileHost {
    open: Option<(PathBuf, DeckDocument)>,
    quit_calls: usize,
}

impl FileHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `quit` has been called.
    pub fn quit_calls(&self) -> usize {
        self.quit_calls
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn document(&self) -> DeckResult<&(PathBuf, DeckDocument)> {
        self.open
            .as_ref()
            .ok_or_else(|| DeckError::automation("no document is open"))
    }

    fn slide(&self, slide: usize) -> DeckResult<&DocSlide> {
        let (_, doc) = self.document()?;
        slide
            .checked_sub(1)
            .and_then(|i| doc.slides.get(i))
            .ok_or_else(|| DeckError::automation(format!("no slide {slide}")))
    }

    fn slide_mut(&mut self, slide: usize) -> DeckResult<&mut DocSlide> {
        let (_, doc) = self
            .open
            .as_mut()
            .ok_or_else(|| DeckError::automation("no document is open"))?;
        slide
            .checked_sub(1)
            .and_then(|i| doc.slides.get_mut(i))
            .ok_or_else(|| DeckError::automation(format!("no slide {slide}")))
    }
}

impl AutomationHost for FileHost {
    fn open(&mut self, document: &Path) -> DeckResult<()> {
        let doc = DeckDocument::load(document)?;
        debug!("Opened {} ({} slides)", document.display(), doc.slides.len());
        self.open = Some((document.to_path_buf(), doc));
        Ok(())
    }

    fn document_name(&self) -> DeckResult<String> {
        let (path, _) = self.document()?;
        Ok(path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()))
    }

    fn slide_count(&self) -> DeckResult<usize> {
        Ok(self.document()?.1.slides.len())
    }

    fn set_transition(&mut self, slide: usize, effect: u32, duration: f64) -> DeckResult<()> {
        let transition = &mut self.slide_mut(slide)?.transition;
        transition.effect = Some(effect);
        transition.duration = Some(duration);
        Ok(())
    }

    fn set_auto_advance(&mut self, slide: usize, advance_time: f64) -> DeckResult<()> {
        let transition = &mut self.slide_mut(slide)?.transition;
        transition.advance_on_time = true;
        transition.advance_time = Some(advance_time);
        Ok(())
    }

    fn shapes(&self, slide: usize) -> DeckResult<Vec<ShapeInfo>> {
        Ok(self
            .slide(slide)?
            .shapes
            .iter()
            .map(|s| ShapeInfo {
                id: s.id(),
                kind: s.kind(),
            })
            .collect())
    }

    fn add_animation(
        &mut self,
        slide: usize,
        shape_id: u32,
        effect: u32,
        trigger: Trigger,
    ) -> DeckResult<()> {
        let slide_ref = self.slide_mut(slide)?;
        if slide_ref.shape(shape_id).is_none() {
            return Err(DeckError::automation(format!(
                "slide {slide} has no shape {shape_id}"
            )));
        }
        let animation = Animation {
            shape_id,
            effect,
            trigger,
        };
        // Re-patching a document must not stack duplicate effects.
        if !slide_ref.animations.contains(&animation) {
            slide_ref.animations.push(animation);
        }
        Ok(())
    }

    fn set_hide_while_not_playing(&mut self, slide: usize, shape_id: u32) -> DeckResult<()> {
        match self.slide_mut(slide)?.shape_mut(shape_id) {
            Some(Shape::Media(media)) => {
                media.hide_while_not_playing = true;
                Ok(())
            }
            _ => Err(DeckError::automation(format!(
                "slide {slide}: shape {shape_id} is not a media shape"
            ))),
        }
    }

    fn save_and_close(&mut self) -> DeckResult<()> {
        let (path, doc) = self
            .open
            .take()
            .ok_or_else(|| DeckError::automation("no document is open"))?;
        doc.save(&path)
    }

    fn quit(&mut self) {
        self.open = None;
        self.quit_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Margins, Rect, ShapeKind};

    fn saved_document(dir: &Path) -> PathBuf {
        let wav = dir.join("a.wav");
        std::fs::write(&wav, b"RIFF").unwrap();
        let mut doc = DeckDocument::new(10.0, 5.625);
        let s = doc.add_slide();
        doc.add_text_box(s, Rect::new(0.0, 0.0, 10.0, 5.625), Margins::uniform(0.25), true)
            .unwrap();
        doc.embed_media(s, &wav, Rect::new(0.0, 0.0, 1.0, 1.0), "audio/wav")
            .unwrap();
        let path = dir.join("t.deck.json");
        doc.save(&path).unwrap();
        path
    }

    #[test]
    fn primitives_need_an_open_document() {
        let mut host = FileHost::new();
        assert!(matches!(host.slide_count(), Err(DeckError::Automation(_))));
        assert!(host.set_transition(1, 1, 1.0).is_err());
        assert!(host.save_and_close().is_err());
    }

    #[test]
    fn edits_are_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved_document(dir.path());

        let mut host = FileHost::new();
        host.open(&path).unwrap();
        assert_eq!(host.document_name().unwrap(), "t.deck.json");
        assert_eq!(host.slide_count().unwrap(), 1);
        assert!(host.shapes(0).is_err());
        assert!(host.shapes(2).is_err());

        let shapes = host.shapes(1).unwrap();
        let audio = shapes.iter().find(|s| s.kind == ShapeKind::Audio).unwrap();
        let text = shapes.iter().find(|s| s.kind == ShapeKind::TextBox).unwrap();
        host.set_transition(1, 3956, 1.5).unwrap();
        host.set_auto_advance(1, 2.8).unwrap();
        host.add_animation(1, audio.id, 83, Trigger::WithPrevious).unwrap();
        host.add_animation(1, audio.id, 83, Trigger::WithPrevious).unwrap();
        host.set_hide_while_not_playing(1, audio.id).unwrap();
        assert!(host.set_hide_while_not_playing(1, text.id).is_err());
        assert!(host.add_animation(1, 999, 83, Trigger::WithPrevious).is_err());
        host.save_and_close().unwrap();
        assert!(!host.is_open());

        let doc = DeckDocument::load(&path).unwrap();
        let slide = &doc.slides[0];
        assert_eq!(slide.transition.effect, Some(3956));
        assert!(slide.transition.advance_on_time);
        assert_eq!(slide.transition.advance_time, Some(2.8));
        assert_eq!(slide.animations.len(), 1);
        assert!(slide.audio_shapes().all(|m| m.hide_while_not_playing));
    }
}
