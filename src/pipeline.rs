//! First pass: render, narrate, and save the deck document plus its timing file.

use std::path::PathBuf;

use chrono::Local;
use tracing::{info, warn};

use crate::bridge::{self, DeckArtifacts};
use crate::config::{Config, RenderConfig, SlideConfig, SynthesisFailurePolicy};
use crate::deck::DeckState;
use crate::document::{DeckDocument, DocParagraph, Margins, Rect, TextRun};
use crate::error::{DeckError, DeckResult};
use crate::highlight::{Paragraph, RunStyle, SlideRenderer, Theme, Tokenizer};
use crate::narration::{capture_duration, AudioArtifact, Narration, Synthesizer};

const AUDIO_MIME: &str = "audio/wav";

/// Switches for one generation run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub theme: Theme,
    pub capture_durations: bool,
    pub persist_intermediate: bool,
}

impl PipelineOptions {
    /// Options from config, loading the configured theme.
    pub fn from_config(config: &Config) -> DeckResult<Self> {
        let theme = match &config.render.theme_file {
            Some(path) => Theme::from_file(path)?,
            None => Theme::by_name(&config.render.theme)?,
        };
        Ok(Self {
            theme,
            capture_durations: config.pipeline.capture_durations,
            persist_intermediate: config.pipeline.persist_intermediate,
        })
    }
}

#[derive(Debug, Default)]
pub struct GenerateReport {
    pub document: PathBuf,
    /// `None` when the intermediate file was not written.
    pub timing: Option<PathBuf>,
    pub slides: usize,
    /// 1-based slides left without narration under the `skip` policy.
    pub skipped_audio: Vec<usize>,
    pub total_duration: f64,
}

pub struct DeckGenerator<'a> {
    options: PipelineOptions,
    render: RenderConfig,
    slide: SlideConfig,
    on_synthesis_error: SynthesisFailurePolicy,
    tokenizer: &'a dyn Tokenizer,
    synth: Option<&'a dyn Synthesizer>,
}

impl<'a> DeckGenerator<'a> {
    pub fn new(
        config: &Config,
        options: PipelineOptions,
        tokenizer: &'a dyn Tokenizer,
        synth: Option<&'a dyn Synthesizer>,
    ) -> Self {
        Self {
            options,
            render: config.render.clone(),
            slide: config.slide.clone(),
            on_synthesis_error: config.pipeline.on_synthesis_error,
            tokenizer,
            synth,
        }
    }

    /// Build the document for `deck` and write the artifacts.
    ///
    /// Durations are stored on `deck` as they are captured, so the caller
    /// sees the same state that was persisted.
    pub fn generate(
        &self,
        deck: &mut DeckState,
        artifacts: &DeckArtifacts,
    ) -> DeckResult<GenerateReport> {
        let synth = match (self.options.capture_durations, self.synth) {
            (true, Some(s)) => Some(s),
            (true, None) => {
                return Err(DeckError::synthesis(
                    "duration capture is enabled but no narration backend is configured",
                ))
            }
            (false, _) => None,
        };

        let style = RunStyle {
            font_name: self.render.font_name.clone(),
            font_size: self.render.font_size,
        };
        let renderer = SlideRenderer::new(&self.options.theme, self.tokenizer, style)
            .fallback_to_plain(self.render.fallback_to_plain);

        let mut doc = DeckDocument::new(self.slide.width_in, self.slide.height_in);
        let mut report = GenerateReport {
            document: artifacts.document.clone(),
            ..GenerateReport::default()
        };
        let total = deck.len();
        info!("Generating {total} slides with theme '{}'", self.options.theme.name());

        for (i, slide) in deck.slides.iter_mut().enumerate() {
            let index = i + 1;
            let paragraphs = renderer.render_slide(slide).map_err(|e| e.at_slide(index))?;

            // Durations left over from an earlier run are not carried forward.
            slide.duration = None;
            let narration = match synth {
                Some(synth) => match capture_duration(slide, synth) {
                    Ok(n) => Some(n),
                    Err(e) => match self.on_synthesis_error {
                        SynthesisFailurePolicy::Abort => return Err(e.at_slide(index)),
                        SynthesisFailurePolicy::Skip => {
                            warn!("Slide {index}: {e}; leaving slide without narration");
                            report.skipped_audio.push(index);
                            None
                        }
                    },
                },
                None => None,
            };

            self.add_slide(&mut doc, &paragraphs, narration.as_ref())
                .map_err(|e| e.at_slide(index))?;

            if let Some(d) = slide.duration {
                report.total_duration += d;
            }
            info!("Processed slide {index}/{total}");
        }
        report.slides = total;

        doc.save(&artifacts.document)?;
        info!("Saved {}", artifacts.document.display());

        if self.options.persist_intermediate {
            deck.generated_at = Some(Local::now().to_rfc3339());
            deck.document = artifacts
                .document
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            bridge::persist(deck, &artifacts.timing)?;
            info!("Saved timing data to {}", artifacts.timing.display());
            report.timing = Some(artifacts.timing.clone());
        }

        Ok(report)
    }

    fn add_slide(
        &self,
        doc: &mut DeckDocument,
        paragraphs: &[Paragraph],
        narration: Option<&Narration>,
    ) -> DeckResult<()> {
        let geometry = &self.slide;
        let s = doc.add_slide();
        doc.set_background(s, geometry.background)?;

        let frame = Rect::new(0.0, 0.0, geometry.width_in, geometry.height_in);
        let text_box = doc.add_text_box(s, frame, Margins::uniform(geometry.margin_in), true)?;
        for paragraph in paragraphs {
            let runs = paragraph
                .runs
                .iter()
                .map(|r| TextRun::from_rendered(r, self.render.dim_brightness))
                .collect();
            doc.add_paragraph(
                s,
                text_box,
                DocParagraph {
                    line_spacing: self.render.line_spacing,
                    runs,
                },
            )?;
        }

        if let Some(narration) = narration {
            // Removed on drop if embedding fails.
            let artifact = AudioArtifact::create(&narration.audio)?;
            let size = geometry.audio_size_in;
            doc.embed_media(s, artifact.path(), Rect::new(0.0, 0.0, size, size), AUDIO_MIME)?;
            artifact.discard()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::SlideSpec;
    use crate::document::ShapeKind;
    use crate::highlight::{PlainLexer, LineLexer};
    use crate::narration::SynthesizedAudio;

    struct PlainTokenizer;

    impl Tokenizer for PlainTokenizer {
        fn lexer<'t>(&'t self, _language: &str) -> DeckResult<Box<dyn LineLexer + 't>> {
            Ok(Box::new(PlainLexer))
        }
    }

    /// One second of audio per word; fails on text containing "boom".
    struct WordClock;

    impl Synthesizer for WordClock {
        fn name(&self) -> &str {
            "word-clock"
        }

        fn synthesize(&self, text: &str) -> DeckResult<SynthesizedAudio> {
            if text.contains("boom") {
                return Err(DeckError::synthesis("backend crashed"));
            }
            let words = text.split_whitespace().count();
            Ok(SynthesizedAudio::mono(vec![0.0; words * 8000], 8000))
        }
    }

    fn deck() -> DeckState {
        DeckState::new(vec![
            SlideSpec::new("a", "text", "one two"),
            SlideSpec::new("b\nc", "text", "boom"),
            SlideSpec::new("d", "text", "three"),
        ])
    }

    fn options(capture: bool, persist: bool) -> PipelineOptions {
        PipelineOptions {
            theme: Theme::by_name("monokai").unwrap(),
            capture_durations: capture,
            persist_intermediate: persist,
        }
    }

    #[test]
    fn abort_policy_tags_the_failing_slide() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DeckArtifacts::for_output(&dir.path().join("t"));
        let generator = DeckGenerator::new(
            &Config::default(),
            options(true, true),
            &PlainTokenizer,
            Some(&WordClock),
        );
        let err = generator.generate(&mut deck(), &artifacts).unwrap_err();
        assert!(matches!(err, DeckError::Slide { index: 2, .. }));
        assert!(matches!(err.kind(), DeckError::Synthesis(_)));
        assert!(!artifacts.document.exists());
    }

    #[test]
    fn skip_policy_leaves_slide_without_audio() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DeckArtifacts::for_output(&dir.path().join("t"));
        let mut config = Config::default();
        config.pipeline.on_synthesis_error = SynthesisFailurePolicy::Skip;
        let generator =
            DeckGenerator::new(&config, options(true, true), &PlainTokenizer, Some(&WordClock));

        let mut deck = deck();
        let report = generator.generate(&mut deck, &artifacts).unwrap();
        assert_eq!(report.slides, 3);
        assert_eq!(report.skipped_audio, vec![2]);
        assert_eq!(report.total_duration, 3.0);
        assert_eq!(deck.slides[0].duration, Some(2.0));
        assert_eq!(deck.slides[1].duration, None);

        let doc = DeckDocument::load(&artifacts.document).unwrap();
        assert_eq!(doc.slides.len(), 3);
        assert_eq!(doc.slides[1].audio_shapes().count(), 0);
        assert_eq!(doc.slides[2].shapes[1].kind(), ShapeKind::Audio);
        assert_eq!(doc.slides[1].text_box().unwrap().paragraphs.len(), 2);

        let timing = bridge::load(&artifacts.timing).unwrap();
        assert_eq!(timing.document.as_deref(), Some("t.deck.json"));
        assert!(timing.generated_at.is_some());
        assert_eq!(timing.slides[2].duration, Some(1.0));
    }

    #[test]
    fn captured_durations_replace_stale_ones() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DeckArtifacts::for_output(&dir.path().join("t"));
        let mut config = Config::default();
        config.pipeline.on_synthesis_error = SynthesisFailurePolicy::Skip;
        let generator =
            DeckGenerator::new(&config, options(true, false), &PlainTokenizer, Some(&WordClock));

        let mut deck = deck();
        for slide in &mut deck.slides {
            slide.duration = Some(9.99);
        }
        generator.generate(&mut deck, &artifacts).unwrap();
        let durations: Vec<Option<f64>> = deck.slides.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![Some(2.0), None, Some(1.0)]);
    }

    #[test]
    fn no_capture_no_backend_needed() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DeckArtifacts::for_output(&dir.path().join("t"));
        let generator =
            DeckGenerator::new(&Config::default(), options(false, false), &PlainTokenizer, None);
        let report = generator.generate(&mut deck(), &artifacts).unwrap();
        assert_eq!(report.timing, None);
        assert!(artifacts.document.exists());
        assert!(!artifacts.timing.exists());

        let doc = DeckDocument::load(&artifacts.document).unwrap();
        assert!(doc.slides.iter().all(|s| s.audio_shapes().count() == 0));
    }

    #[test]
    fn capture_without_backend_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DeckArtifacts::for_output(&dir.path().join("t"));
        let generator =
            DeckGenerator::new(&Config::default(), options(true, true), &PlainTokenizer, None);
        assert!(matches!(
            generator.generate(&mut deck(), &artifacts),
            Err(DeckError::Synthesis(_))
        ));
    }

    #[test]
    fn slide_geometry_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DeckArtifacts::for_output(&dir.path().join("t"));
        let generator =
            DeckGenerator::new(&Config::default(), options(false, false), &PlainTokenizer, None);
        let mut deck = DeckState::new(vec![SlideSpec::new("x", "text", "v")]);
        generator.generate(&mut deck, &artifacts).unwrap();

        let doc = DeckDocument::load(&artifacts.document).unwrap();
        assert_eq!((doc.width_in, doc.height_in), (10.0, 5.625));
        let slide = &doc.slides[0];
        assert_eq!(slide.background, Some(crate::highlight::Rgb::BLACK));
        let tb = slide.text_box().unwrap();
        assert_eq!(tb.margins, Margins::uniform(0.25));
        assert!(tb.word_wrap);
        let run = &tb.paragraphs[0].runs[0];
        assert_eq!(run.font_name, "Consolas");
        assert_eq!(run.text, "x\n");
    }
}
