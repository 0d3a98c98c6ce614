//! Narration synthesis and duration capture.
//!
//! Components:
//! - `capture`: duration measurement, WAV encode/decode, transient audio artifacts
//! - `kokoro`: Kokoro ONNX model inference (text → phonemes → f32 audio)
//! - `http`: remote synthesis endpoint returning WAV
//! - `silent`: deterministic silence sized from the word count, for dry runs

pub mod capture;
pub mod http;
pub mod kokoro;
pub mod silent;

use tracing::info;

use crate::config::{TtsBackend, TtsConfig};
use crate::error::DeckResult;

pub use capture::{capture_duration, measure_duration, narrate, round2, AudioArtifact, Narration};

/// Interleaved PCM samples in `[-1, 1]` plus their format.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: 1,
            sample_rate,
        }
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }
}

/// Text in, audio out.
pub trait Synthesizer {
    fn name(&self) -> &str;

    fn synthesize(&self, text: &str) -> DeckResult<SynthesizedAudio>;
}

/// Build the configured backend. The Kokoro model is loaded here, which
/// blocks for a few seconds.
pub fn from_config(config: &TtsConfig) -> DeckResult<Box<dyn Synthesizer>> {
    let synth: Box<dyn Synthesizer> = match config.backend {
        TtsBackend::Kokoro => {
            let mut engine = kokoro::KokoroSynthesizer::new(config);
            engine.load()?;
            Box::new(engine)
        }
        TtsBackend::Http => Box::new(http::HttpSynthesizer::new(config)?),
        TtsBackend::Silent => Box::new(silent::SilentSynthesizer::new(config.words_per_minute)),
    };
    info!("Narration backend: {}", synth.name());
    Ok(synth)
}
