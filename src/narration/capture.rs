//! Duration capture and WAV handling.
//!
//! The synthesized buffer is measured (`frames / sample_rate`, rounded to
//! centiseconds) and written to a temporary WAV file that lives only until it
//! has been embedded into the slide.

use std::io::{BufWriter, Cursor};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use super::{SynthesizedAudio, Synthesizer};
use crate::deck::SlideSpec;
use crate::error::{DeckError, DeckResult};

/// Round to 2 decimal places, the precision durations are stored at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Playback length of a buffer in seconds, rounded to 2 decimals.
pub fn measure_duration(audio: &SynthesizedAudio) -> DeckResult<f64> {
    if audio.sample_rate == 0 {
        return Err(DeckError::synthesis("backend reported a sample rate of 0"));
    }
    if audio.channels == 0 {
        return Err(DeckError::synthesis("backend reported 0 channels"));
    }
    let frames = audio.frames();
    if frames == 0 {
        return Err(DeckError::synthesis("backend returned an empty audio buffer"));
    }
    Ok(round2(frames as f64 / f64::from(audio.sample_rate)))
}

/// Synthesized narration and its measured duration.
#[derive(Debug, Clone)]
pub struct Narration {
    pub audio: SynthesizedAudio,
    pub duration: f64,
}

pub fn narrate(text: &str, synth: &dyn Synthesizer) -> DeckResult<Narration> {
    let audio = synth.synthesize(text)?;
    let duration = measure_duration(&audio)?;
    debug!(
        "{}: {} frames @ {}Hz = {duration:.2}s",
        synth.name(),
        audio.frames(),
        audio.sample_rate
    );
    Ok(Narration { audio, duration })
}

/// Synthesize the slide's `voice` and store the duration on the slide.
///
/// The narration is returned so its audio can be embedded. On failure the
/// slide's duration is left untouched.
pub fn capture_duration(slide: &mut SlideSpec, synth: &dyn Synthesizer) -> DeckResult<Narration> {
    let narration = narrate(&slide.voice, synth)?;
    slide.duration = Some(narration.duration);
    Ok(narration)
}

fn wav_io_error(context: &str, err: hound::Error) -> DeckError {
    let source = match err {
        hound::Error::IoError(io) => io,
        other => std::io::Error::other(other.to_string()),
    };
    DeckError::io(context, source)
}

fn wav_spec(audio: &SynthesizedAudio) -> hound::WavSpec {
    hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn write_samples<W: std::io::Write + std::io::Seek>(
    writer: W,
    audio: &SynthesizedAudio,
    context: &str,
) -> DeckResult<()> {
    let mut writer =
        hound::WavWriter::new(writer, wav_spec(audio)).map_err(|e| wav_io_error(context, e))?;
    for &sample in &audio.samples {
        // f32 [-1, 1] → i16
        let s = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(s).map_err(|e| wav_io_error(context, e))?;
    }
    writer.finalize().map_err(|e| wav_io_error(context, e))
}

/// Write a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, audio: &SynthesizedAudio) -> DeckResult<()> {
    let context = format!("write wav '{}'", path.display());
    let file = std::fs::File::create(path).map_err(|e| DeckError::io(context.clone(), e))?;
    write_samples(BufWriter::new(file), audio, &context)
}

/// Decode a WAV byte stream into normalized f32 samples.
pub fn decode_wav(bytes: &[u8]) -> DeckResult<SynthesizedAudio> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| DeckError::synthesis(format!("invalid WAV data: {e}")))?;
    let spec = reader.spec();

    let samples: Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect()
        }
    };
    let samples = samples.map_err(|e| DeckError::synthesis(format!("invalid WAV samples: {e}")))?;

    Ok(SynthesizedAudio {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// A narration rendered to a temporary WAV file.
///
/// The file is removed when the artifact is dropped, so every exit path
/// (including errors while embedding) cleans it up.
pub struct AudioArtifact {
    file: NamedTempFile,
}

impl AudioArtifact {
    pub fn create(audio: &SynthesizedAudio) -> DeckResult<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("deckcast-narration-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| DeckError::io("create temporary audio file", e))?;
        let context = format!("write wav '{}'", file.path().display());
        write_samples(BufWriter::new(file.as_file_mut()), audio, &context)?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now, reporting failures instead of ignoring them.
    pub fn discard(self) -> DeckResult<()> {
        let path = self.file.path().to_path_buf();
        self.file
            .close()
            .map_err(|e| DeckError::io_at("delete temporary audio", &path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FixedSynth {
        frames: usize,
        rate: u32,
        calls: Cell<usize>,
    }

    impl FixedSynth {
        fn new(frames: usize, rate: u32) -> Self {
            Self {
                frames,
                rate,
                calls: Cell::new(0),
            }
        }
    }

    impl Synthesizer for FixedSynth {
        fn name(&self) -> &str {
            "fixed"
        }

        fn synthesize(&self, _text: &str) -> DeckResult<SynthesizedAudio> {
            self.calls.set(self.calls.get() + 1);
            Ok(SynthesizedAudio::mono(vec![0.0; self.frames], self.rate))
        }
    }

    struct FailingSynth;

    impl Synthesizer for FailingSynth {
        fn name(&self) -> &str {
            "failing"
        }

        fn synthesize(&self, _text: &str) -> DeckResult<SynthesizedAudio> {
            Err(DeckError::synthesis("model not loaded"))
        }
    }

    #[test]
    fn duration_is_frames_over_rate() {
        let mut slide = SlideSpec::new("x", "text", "hello");
        let narration = capture_duration(&mut slide, &FixedSynth::new(44100, 44100)).unwrap();
        assert_eq!(narration.duration, 1.0);
        assert_eq!(narration.audio.frames(), 44100);
        assert_eq!(slide.duration, Some(1.0));

        let mut slide = SlideSpec::new("x", "text", "hello");
        assert_eq!(
            capture_duration(&mut slide, &FixedSynth::new(22050, 44100)).unwrap().duration,
            0.5
        );
        assert_eq!(slide.duration, Some(0.5));
    }

    #[test]
    fn duration_is_rounded_to_centiseconds() {
        let audio = SynthesizedAudio::mono(vec![0.0; 55_211], 24_000);
        assert_eq!(measure_duration(&audio).unwrap(), 2.3);
        assert_eq!(round2(2.345_678), 2.35);
    }

    #[test]
    fn stereo_counts_frames_not_samples() {
        let audio = SynthesizedAudio {
            samples: vec![0.0; 48_000],
            channels: 2,
            sample_rate: 24_000,
        };
        assert_eq!(measure_duration(&audio).unwrap(), 1.0);
    }

    #[test]
    fn empty_or_broken_audio_is_a_synthesis_error() {
        let mut slide = SlideSpec::new("x", "text", "hello");
        let err = capture_duration(&mut slide, &FixedSynth::new(0, 24_000)).unwrap_err();
        assert!(matches!(err, DeckError::Synthesis(_)));
        assert_eq!(slide.duration, None);

        let err = measure_duration(&SynthesizedAudio::mono(vec![0.1], 0)).unwrap_err();
        assert!(matches!(err, DeckError::Synthesis(_)));

        let err = capture_duration(&mut slide, &FailingSynth).unwrap_err();
        assert!(matches!(err, DeckError::Synthesis(_)));
    }

    #[test]
    fn narrate_calls_backend_once() {
        let synth = FixedSynth::new(2400, 24_000);
        let narration = narrate("hi", &synth).unwrap();
        assert_eq!(narration.duration, 0.1);
        assert_eq!(synth.calls.get(), 1);
    }

    #[test]
    fn artifact_is_removed_on_drop_and_discard() {
        let audio = SynthesizedAudio::mono(vec![0.25; 480], 24_000);

        let artifact = AudioArtifact::create(&audio).unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());
        let decoded = decode_wav(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(decoded.sample_rate, 24_000);
        assert_eq!(decoded.frames(), 480);
        assert!((decoded.samples[0] - 0.25).abs() < 1e-3);
        drop(artifact);
        assert!(!path.exists());

        let artifact = AudioArtifact::create(&audio).unwrap();
        let path = artifact.path().to_path_buf();
        artifact.discard().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn write_wav_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let audio = SynthesizedAudio::mono(vec![0.0; 24_000], 24_000);
        write_wav(&path, &audio).unwrap();
        let decoded = decode_wav(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(measure_duration(&decoded).unwrap(), 1.0);
    }

    #[test]
    fn garbage_is_not_wav() {
        let err = decode_wav(b"definitely not RIFF").unwrap_err();
        assert!(matches!(err, DeckError::Synthesis(_)));
    }
}
