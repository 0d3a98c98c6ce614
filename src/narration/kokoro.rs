//! Kokoro TTS engine: text → phonemes → ONNX inference → audio buffer.
//!
//! Pipeline:
//! 1. Text → sentences (split on .!?)
//! 2. Sentence → phonemes (misaki-rs G2P)
//! 3. Phonemes → token IDs (tokenizer.json vocabulary)
//! 4. Token IDs + voice style + speed → ONNX inference → f32 audio (24kHz)
//! 5. Sentences joined with a short pause into one narration buffer

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use ndarray::{Array2, Array3};
use ndarray_npy::NpzReader;
use ort::value::Tensor;
use tracing::{debug, info, warn};

use super::{SynthesizedAudio, Synthesizer};
use crate::config::TtsConfig;
use crate::error::{DeckError, DeckResult};

const SAMPLE_RATE: u32 = 24000;
const MAX_TOKENS: usize = 510; // Voice style array first dimension
const SENTENCE_PAUSE_SECS: f32 = 0.15;

/// Loaded voice style data: shape (510, 1, 256) f32.
struct VoiceData {
    /// Style vectors indexed by token count. shape: (510, 256)
    styles: Array2<f32>,
}

/// Native Kokoro TTS engine.
pub struct KokoroSynthesizer {
    // ONNX model (Mutex because ort 2.0 Session::run needs &mut)
    session: Mutex<Option<ort::session::Session>>,

    // Phonemizer (misaki-rs G2P)
    phonemizer: Option<misaki_rs::G2P>,

    // Tokenizer vocabulary: char → token ID
    vocab: HashMap<char, i64>,

    // Voices: name → style data
    voices: HashMap<String, VoiceData>,

    voice: String,
    speed: f32,

    // Paths
    model_path: PathBuf,
    voices_path: PathBuf,
    tokenizer_path: PathBuf,
}

fn path_or_default(configured: &str, base_dir: &Path, default_name: &str) -> PathBuf {
    if configured.is_empty() {
        base_dir.join(default_name)
    } else {
        PathBuf::from(configured)
    }
}

impl KokoroSynthesizer {
    pub fn new(config: &TtsConfig) -> Self {
        let base_dir = std::env::current_dir().unwrap_or_default();

        Self {
            session: Mutex::new(None),
            phonemizer: None,
            vocab: HashMap::new(),
            voices: HashMap::new(),
            voice: config.voice.clone(),
            speed: config.speed,
            model_path: path_or_default(&config.model_path, &base_dir, "kokoro-v1.0.onnx"),
            voices_path: path_or_default(&config.voices_path, &base_dir, "voices-v1.0.bin"),
            tokenizer_path: path_or_default(&config.tokenizer_path, &base_dir, "tokenizer.json"),
        }
    }

    pub fn list_voices(&self) -> Vec<String> {
        let mut names: Vec<String> = self.voices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Load the ONNX model, tokenizer, voices, and phonemizer. Blocking.
    pub fn load(&mut self) -> DeckResult<()> {
        let t0 = Instant::now();

        // 1. Load tokenizer vocabulary
        info!("Loading tokenizer from {}", self.tokenizer_path.display());
        self.vocab = load_tokenizer(&self.tokenizer_path)?;
        info!("Tokenizer loaded: {} tokens", self.vocab.len());

        // 2. Load voice styles from NPZ
        info!("Loading voices from {}", self.voices_path.display());
        self.voices = load_voices(&self.voices_path)?;
        info!("Loaded {} voices", self.voices.len());
        if !self.voices.contains_key(&self.voice) {
            return Err(DeckError::synthesis(format!(
                "unknown voice '{}' (available: {})",
                self.voice,
                self.list_voices().join(", ")
            )));
        }

        // 3. Load ONNX model
        info!("Loading ONNX model from {}", self.model_path.display());
        let session = ort::session::Session::builder()
            .map_err(|e| DeckError::synthesis(format!("Failed to create ONNX session builder: {e}")))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| DeckError::synthesis(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| DeckError::synthesis(format!("Failed to set thread count: {e}")))?
            .commit_from_file(&self.model_path)
            .map_err(|e| DeckError::synthesis(format!("Failed to load ONNX model: {e}")))?;
        *self.session_guard()? = Some(session);

        // 4. Initialize phonemizer (misaki-rs G2P)
        info!("Initializing misaki-rs phonemizer...");
        self.phonemizer = Some(misaki_rs::G2P::new(misaki_rs::Language::EnglishUS));

        let load_ms = t0.elapsed().as_millis();
        info!("Kokoro TTS loaded in {load_ms}ms (voice: {}, speed: {})", self.voice, self.speed);

        Ok(())
    }

    fn session_guard(&self) -> DeckResult<std::sync::MutexGuard<'_, Option<ort::session::Session>>> {
        self.session
            .lock()
            .map_err(|_| DeckError::synthesis("ONNX session lock poisoned"))
    }

    /// Generate audio samples for a single sentence.
    fn generate_audio(&self, text: &str) -> DeckResult<Vec<f32>> {
        let mut session_guard = self.session_guard()?;
        let session = session_guard
            .as_mut()
            .ok_or_else(|| DeckError::synthesis("Model not loaded"))?;
        let phonemizer = self
            .phonemizer
            .as_ref()
            .ok_or_else(|| DeckError::synthesis("Phonemizer not loaded"))?;

        // 1. Text → phonemes via misaki-rs G2P
        let (phonemes, _tokens) = phonemizer
            .g2p(text)
            .map_err(|e| DeckError::synthesis(format!("Phonemization failed: {e}")))?;

        if phonemes.is_empty() {
            return Ok(Vec::new());
        }

        // 2. Phonemes → token IDs, unknown characters skipped
        let mut token_ids: Vec<i64> = Vec::with_capacity(phonemes.len() + 2);
        token_ids.push(0); // Start padding
        token_ids.extend(phonemes.chars().filter_map(|ch| self.vocab.get(&ch).copied()));
        token_ids.push(0); // End padding

        let n_tokens = token_ids.len().min(MAX_TOKENS);
        token_ids.truncate(n_tokens);

        // 3. Get voice style vector for this token count
        let voice_data = self
            .voices
            .get(&self.voice)
            .ok_or_else(|| DeckError::synthesis(format!("Voice not found: {}", self.voice)))?;

        // Index into style array by token count (clamped to max)
        let style_idx = (n_tokens.saturating_sub(2)).min(voice_data.styles.nrows().saturating_sub(1));
        let style_vec: Vec<f32> = voice_data.styles.row(style_idx).to_vec();

        // 4. Build ONNX input tensors
        let tokens_array = Array2::from_shape_vec((1, n_tokens), token_ids)
            .map_err(|e| DeckError::synthesis(format!("Failed to create tokens tensor: {e}")))?;
        let tokens_tensor = Tensor::from_array(tokens_array)
            .map_err(|e| DeckError::synthesis(format!("Failed to create tokens ort tensor: {e}")))?;

        let style_array = Array2::from_shape_vec((1, 256), style_vec)
            .map_err(|e| DeckError::synthesis(format!("Failed to create style tensor: {e}")))?;
        let style_tensor = Tensor::from_array(style_array)
            .map_err(|e| DeckError::synthesis(format!("Failed to create style ort tensor: {e}")))?;

        let speed_array = ndarray::Array1::from_vec(vec![self.speed]);
        let speed_tensor = Tensor::from_array(speed_array)
            .map_err(|e| DeckError::synthesis(format!("Failed to create speed ort tensor: {e}")))?;

        // 5. Run ONNX inference
        let outputs = session
            .run(ort::inputs![
                "tokens" => tokens_tensor,
                "style" => style_tensor,
                "speed" => speed_tensor
            ])
            .map_err(|e| DeckError::synthesis(format!("ONNX inference failed: {e}")))?;

        // 6. Extract audio samples from output
        let first_output = outputs
            .iter()
            .next()
            .ok_or_else(|| DeckError::synthesis("No output tensor from model"))?;

        let (_shape, audio_slice) = first_output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| DeckError::synthesis(format!("Failed to extract audio tensor: {e}")))?;

        let samples: Vec<f32> = audio_slice.to_vec();
        debug!(
            "Generated {} samples ({:.1}s)",
            samples.len(),
            samples.len() as f32 / SAMPLE_RATE as f32
        );

        Ok(samples)
    }
}

impl Synthesizer for KokoroSynthesizer {
    fn name(&self) -> &str {
        "kokoro"
    }

    fn synthesize(&self, text: &str) -> DeckResult<SynthesizedAudio> {
        let sentences = split_sentences(text.trim());
        if sentences.is_empty() {
            return Err(DeckError::synthesis("narration text is empty"));
        }

        let pause = vec![0.0_f32; (SENTENCE_PAUSE_SECS * SAMPLE_RATE as f32) as usize];
        let mut samples: Vec<f32> = Vec::new();

        for (i, sentence) in sentences.iter().enumerate() {
            let t_gen = Instant::now();
            let chunk = self.generate_audio(sentence)?;
            if chunk.is_empty() {
                warn!("Sentence {}/{} produced no audio", i + 1, sentences.len());
                continue;
            }
            if !samples.is_empty() {
                samples.extend_from_slice(&pause);
            }
            samples.extend_from_slice(&chunk);
            debug!(
                "Sentence {}/{}: gen={:.0}ms",
                i + 1,
                sentences.len(),
                t_gen.elapsed().as_secs_f64() * 1000.0
            );
        }

        Ok(SynthesizedAudio::mono(samples, SAMPLE_RATE))
    }
}

// --- Helper functions ---

/// Load tokenizer vocabulary from tokenizer.json.
fn load_tokenizer(path: &Path) -> DeckResult<HashMap<char, i64>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| DeckError::synthesis(format!("Failed to read tokenizer: {e}")))?;

    let data: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| DeckError::synthesis(format!("Failed to parse tokenizer JSON: {e}")))?;

    parse_vocab(&data)
}

fn parse_vocab(data: &serde_json::Value) -> DeckResult<HashMap<char, i64>> {
    let vocab = data["model"]["vocab"]
        .as_object()
        .ok_or_else(|| DeckError::synthesis("Missing model.vocab in tokenizer.json"))?;

    let mut map = HashMap::new();
    for (token, id) in vocab {
        let id = id
            .as_i64()
            .ok_or_else(|| DeckError::synthesis(format!("Token ID for '{token}' is not an integer")))?;
        // Each token should be a single character
        if let Some(ch) = token.chars().next() {
            map.insert(ch, id);
        }
    }

    Ok(map)
}

/// Load all voice styles from an NPZ file.
fn load_voices(path: &Path) -> DeckResult<HashMap<String, VoiceData>> {
    let file = fs::File::open(path)
        .map_err(|e| DeckError::synthesis(format!("Failed to open voices file: {e}")))?;

    let mut npz = NpzReader::new(file)
        .map_err(|e| DeckError::synthesis(format!("Failed to read NPZ voices file: {e}")))?;

    let names: Vec<String> = npz
        .names()
        .map_err(|e| DeckError::synthesis(format!("Failed to list NPZ entries: {e}")))?
        .into_iter()
        .map(|n| n.trim_end_matches(".npy").to_string())
        .collect();

    let mut voices = HashMap::new();
    for name in &names {
        let npy_name = format!("{name}.npy");
        let arr: Array3<f32> = npz
            .by_name(&npy_name)
            .map_err(|e| DeckError::synthesis(format!("Failed to read voice '{name}': {e}")))?;

        // Shape is (510, 1, 256). Squeeze the middle dimension to (510, 256).
        let dim0 = arr.shape()[0];
        let dim2 = arr.shape()[2];
        let styles = arr
            .into_shape_with_order((dim0, dim2))
            .map_err(|e| DeckError::synthesis(format!("Failed to reshape voice '{name}': {e}")))?;

        voices.insert(name.clone(), VoiceData { styles });
    }

    Ok(voices)
}

/// Split text into sentences at .!? boundaries.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'.' || b == b'!' || b == b'?')
            && i + 1 < bytes.len()
            && bytes[i + 1].is_ascii_whitespace()
        {
            let end = i + 1;
            let s = text[start..end].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = end;
        }
    }

    // Remainder
    let s = text[start..].trim();
    if !s.is_empty() {
        sentences.push(s);
    }

    sentences
}
