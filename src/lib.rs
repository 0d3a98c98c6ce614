//! deckcast: narrated code slide decks.
//!
//! Two passes over an on-disk contract:
//! 1. `pipeline` renders each slide's snippet with syntax colors, synthesizes
//!    its narration, and saves a deck document plus a timing file.
//! 2. `patch` reopens the saved document through an automation host and
//!    applies transitions, auto-advance times and audio autoplay.

pub mod bridge;
pub mod config;
pub mod deck;
pub mod document;
pub mod error;
pub mod highlight;
pub mod narration;
pub mod patch;
pub mod pipeline;

pub use error::{DeckError, DeckResult};
