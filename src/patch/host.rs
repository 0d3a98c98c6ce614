//! Automation host seam and its scoped session guard.

use std::ops::{Deref, DerefMut};
use std::path::Path;

use tracing::debug;

use crate::document::{ShapeKind, Trigger};
use crate::error::DeckResult;

/// A shape as the host reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeInfo {
    pub id: u32,
    pub kind: ShapeKind,
}

/// Mutates a saved document after the fact. Slide indices are 1-based.
pub trait AutomationHost {
    fn open(&mut self, document: &Path) -> DeckResult<()>;

    fn document_name(&self) -> DeckResult<String>;

    fn slide_count(&self) -> DeckResult<usize>;

    fn set_transition(&mut self, slide: usize, effect: u32, duration: f64) -> DeckResult<()>;

    /// Enable advance-on-time with the given delay.
    fn set_auto_advance(&mut self, slide: usize, advance_time: f64) -> DeckResult<()>;

    fn shapes(&self, slide: usize) -> DeckResult<Vec<ShapeInfo>>;

    fn add_animation(
        &mut self,
        slide: usize,
        shape_id: u32,
        effect: u32,
        trigger: Trigger,
    ) -> DeckResult<()>;

    fn set_hide_while_not_playing(&mut self, slide: usize, shape_id: u32) -> DeckResult<()>;

    fn save_and_close(&mut self) -> DeckResult<()>;

    /// Release the host. Called exactly once per session.
    fn quit(&mut self);
}

/// Holds the host for one patch run and quits it when dropped, on success
/// and on every early return.
pub struct HostSession<'h, H: AutomationHost + ?Sized> {
    host: &'h mut H,
}

impl<'h, H: AutomationHost + ?Sized> HostSession<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self { host }
    }
}

impl<H: AutomationHost + ?Sized> Deref for HostSession<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: AutomationHost + ?Sized> DerefMut for HostSession<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: AutomationHost + ?Sized> Drop for HostSession<'_, H> {
    fn drop(&mut self) {
        debug!("Releasing automation host");
        self.host.quit();
    }
}
