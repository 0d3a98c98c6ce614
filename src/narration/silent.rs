//! Silent stand-in backend: no model, deterministic timing.
//!
//! Produces silence as long as the narration would take at a fixed speaking
//! rate, so decks can be laid out and timed before any voice is available.

use super::{SynthesizedAudio, Synthesizer};
use crate::error::DeckResult;

const SAMPLE_RATE: u32 = 24000;

pub struct SilentSynthesizer {
    words_per_minute: u32,
}

impl SilentSynthesizer {
    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
        }
    }

    /// Seconds the narration would take at this speaking rate.
    pub fn estimate_secs(&self, text: &str) -> f64 {
        let words = text.split_whitespace().count();
        words as f64 * 60.0 / f64::from(self.words_per_minute)
    }
}

impl Synthesizer for SilentSynthesizer {
    fn name(&self) -> &str {
        "silent"
    }

    fn synthesize(&self, text: &str) -> DeckResult<SynthesizedAudio> {
        let frames = (self.estimate_secs(text) * f64::from(SAMPLE_RATE)).round() as usize;
        Ok(SynthesizedAudio::mono(vec![0.0; frames], SAMPLE_RATE))
    }
}
