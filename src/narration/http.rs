//! Remote synthesis over HTTP.
//!
//! POSTs `{text, voice, speed}` as JSON and expects a WAV body back. Useful
//! when the model runs on a separate GPU box.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use tracing::debug;

use super::capture::decode_wav;
use super::{SynthesizedAudio, Synthesizer};
use crate::config::TtsConfig;
use crate::error::{DeckError, DeckResult};

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice: &'a str,
    speed: f32,
}

pub struct HttpSynthesizer {
    endpoint: String,
    voice: String,
    speed: f32,
    client: Client,
}

impl HttpSynthesizer {
    pub fn new(config: &TtsConfig) -> DeckResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeckError::synthesis(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            voice: config.voice.clone(),
            speed: config.speed,
            client,
        })
    }
}

impl Synthesizer for HttpSynthesizer {
    fn name(&self) -> &str {
        "http"
    }

    fn synthesize(&self, text: &str) -> DeckResult<SynthesizedAudio> {
        debug!("POST {} ({} chars)", self.endpoint, text.len());
        let request = SynthesizeRequest {
            text,
            voice: &self.voice,
            speed: self.speed,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    DeckError::synthesis(format!("Cannot connect to TTS endpoint {}", self.endpoint))
                } else if e.is_timeout() {
                    DeckError::synthesis("TTS request timed out")
                } else {
                    DeckError::synthesis(format!("TTS request failed: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            return Err(DeckError::synthesis(format!(
                "TTS endpoint returned status {}",
                resp.status()
            )));
        }

        let body = resp
            .bytes()
            .map_err(|e| DeckError::synthesis(format!("Failed to read TTS response: {e}")))?;
        decode_wav(&body)
    }
}
