//! Second pass: apply timing to a saved deck document.
//!
//! Per slide the patcher walks `OPENED → TRANSITION_SET → TIMED →
//! AUDIO_ANIMATED`, reading durations persisted by the first pass.
//!
//! Components:
//! - `host`: the automation host seam and its release guard
//! - `file_host`: host implementation over a `*.deck.json` file

pub mod file_host;
pub mod host;

use std::path::Path;

use tracing::{error, info, warn};

use crate::config::{PatchFailurePolicy, TimingConfig};
use crate::deck::DeckState;
use crate::document::{ShapeKind, Trigger};
use crate::error::{DeckError, DeckResult};
use crate::narration::round2;

pub use file_host::FileHost;
pub use host::{AutomationHost, HostSession, ShapeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideTimingState {
    Opened,
    TransitionSet,
    Timed,
    AudioAnimated,
}

impl std::fmt::Display for SlideTimingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => write!(f, "OPENED"),
            Self::TransitionSet => write!(f, "TRANSITION_SET"),
            Self::Timed => write!(f, "TIMED"),
            Self::AudioAnimated => write!(f, "AUDIO_ANIMATED"),
        }
    }
}

/// Delay before auto-advancing: narration length plus a pad, in centiseconds.
pub fn advance_time_for(duration: f64, pad: f64) -> f64 {
    round2(duration + pad)
}

/// What happened to one slide.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideOutcome {
    /// 1-based.
    pub index: usize,
    /// Slides in the document.
    pub total: usize,
    pub state: SlideTimingState,
    pub advance_time: Option<f64>,
    pub animated_shapes: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct PatchReport {
    pub document: String,
    pub slides: Vec<SlideOutcome>,
    /// Mismatches between the document and its timing data.
    pub warnings: Vec<String>,
    /// Slide failures under the `continue` policy, already tagged with their index.
    pub failures: Vec<DeckError>,
}

impl PatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn slide(&self, index: usize) -> Option<&SlideOutcome> {
        self.slides.iter().find(|s| s.index == index)
    }
}

pub struct TimingPatcher {
    config: TimingConfig,
}

impl TimingPatcher {
    pub fn new(config: TimingConfig) -> Self {
        Self { config }
    }

    /// Open `document` through `host`, time every slide from `deck`, save and
    /// release the host.
    ///
    /// The host is quit exactly once whatever happens. Under the `abort`
    /// policy the first slide error is returned and the document is not saved.
    pub fn patch<H: AutomationHost + ?Sized>(
        &self,
        host: &mut H,
        document: &Path,
        deck: &DeckState,
    ) -> DeckResult<PatchReport> {
        let mut session = HostSession::new(host);
        session.open(document)?;

        let name = session.document_name()?;
        let count = session.slide_count()?;
        info!("Opened presentation: {name}, slides: {count}");

        let mut warnings = Vec::new();
        if count != deck.len() {
            warnings.push(format!(
                "{name} has {count} slides but timing data has {}; unmatched slides get no timing",
                deck.len()
            ));
        }
        if let Some(recorded) = deck.document.as_deref().filter(|&r| r != name) {
            warnings.push(format!("timing data was captured for {recorded}, not {name}"));
        }
        for w in &warnings {
            warn!("{w}");
        }

        let mut report = PatchReport {
            document: name,
            warnings,
            ..PatchReport::default()
        };

        for index in 1..=count {
            match self.patch_slide(&mut *session, index, count, deck.duration_at(index - 1)) {
                Ok(outcome) => report.slides.push(outcome),
                Err(e) => {
                    let e = e.at_slide(index);
                    match self.config.on_error {
                        PatchFailurePolicy::Abort => return Err(e),
                        PatchFailurePolicy::Continue => {
                            error!("{e}");
                            report.failures.push(e);
                        }
                    }
                }
            }
        }

        session.save_and_close()?;
        info!(
            "Patching complete: {} slides, {} failed",
            report.slides.len() + report.failures.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Run one slide through the state machine.
    pub fn patch_slide<H: AutomationHost + ?Sized>(
        &self,
        host: &mut H,
        index: usize,
        total: usize,
        duration: Option<f64>,
    ) -> DeckResult<SlideOutcome> {
        let mut outcome = SlideOutcome {
            index,
            total,
            state: SlideTimingState::Opened,
            advance_time: None,
            animated_shapes: Vec::new(),
        };

        host.set_transition(
            index,
            self.config.transition_effect,
            self.config.transition_duration,
        )?;
        self.step(&mut outcome, SlideTimingState::TransitionSet);

        match duration {
            Some(audio) => {
                let advance = advance_time_for(audio, self.config.advance_pad);
                host.set_auto_advance(index, advance)?;
                outcome.advance_time = Some(advance);
                info!("Slide {index}/{total}: advance {advance:.2}s (audio {audio:.2}s)");
            }
            None => info!("Slide {index}/{total}: no duration found, no timing applied"),
        }
        self.step(&mut outcome, SlideTimingState::Timed);

        let audio_shapes: Vec<ShapeInfo> = host
            .shapes(index)?
            .into_iter()
            .filter(|s| s.kind == ShapeKind::Audio)
            .collect();
        for shape in &audio_shapes {
            host.add_animation(index, shape.id, self.config.media_effect, Trigger::WithPrevious)?;
            host.set_hide_while_not_playing(index, shape.id)?;
            outcome.animated_shapes.push(shape.id);
        }
        if !audio_shapes.is_empty() {
            self.step(&mut outcome, SlideTimingState::AudioAnimated);
        }

        Ok(outcome)
    }

    fn step(&self, outcome: &mut SlideOutcome, next: SlideTimingState) {
        tracing::debug!("Slide {}: {} → {next}", outcome.index, outcome.state);
        outcome.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Records primitive calls; fails every primitive on `fail_on`.
    #[derive(Default)]
    struct MockHost {
        slides: usize,
        audio_on: Vec<usize>,
        fail_on: Option<usize>,
        fail_open: bool,
        opened: Option<PathBuf>,
        transitions: Vec<(usize, u32, f64)>,
        advances: Vec<(usize, f64)>,
        animations: Vec<(usize, u32, u32, Trigger)>,
        hidden: Vec<(usize, u32)>,
        saved: bool,
        quits: usize,
    }

    impl MockHost {
        fn check(&self, slide: usize) -> DeckResult<()> {
            if self.fail_on == Some(slide) {
                Err(DeckError::automation("host refused"))
            } else {
                Ok(())
            }
        }
    }

    impl AutomationHost for MockHost {
        fn open(&mut self, document: &Path) -> DeckResult<()> {
            if self.fail_open {
                return Err(DeckError::automation("cannot open"));
            }
            self.opened = Some(document.to_path_buf());
            Ok(())
        }

        fn document_name(&self) -> DeckResult<String> {
            Ok("mock.deck.json".into())
        }

        fn slide_count(&self) -> DeckResult<usize> {
            Ok(self.slides)
        }

        fn set_transition(&mut self, slide: usize, effect: u32, duration: f64) -> DeckResult<()> {
            self.check(slide)?;
            self.transitions.push((slide, effect, duration));
            Ok(())
        }

        fn set_auto_advance(&mut self, slide: usize, advance_time: f64) -> DeckResult<()> {
            self.check(slide)?;
            self.advances.push((slide, advance_time));
            Ok(())
        }

        fn shapes(&self, slide: usize) -> DeckResult<Vec<ShapeInfo>> {
            self.check(slide)?;
            let mut shapes = vec![ShapeInfo {
                id: 1,
                kind: ShapeKind::TextBox,
            }];
            if self.audio_on.contains(&slide) {
                shapes.push(ShapeInfo {
                    id: 2,
                    kind: ShapeKind::Audio,
                });
            }
            Ok(shapes)
        }

        fn add_animation(
            &mut self,
            slide: usize,
            shape_id: u32,
            effect: u32,
            trigger: Trigger,
        ) -> DeckResult<()> {
            self.animations.push((slide, shape_id, effect, trigger));
            Ok(())
        }

        fn set_hide_while_not_playing(&mut self, slide: usize, shape_id: u32) -> DeckResult<()> {
            self.hidden.push((slide, shape_id));
            Ok(())
        }

        fn save_and_close(&mut self) -> DeckResult<()> {
            self.saved = true;
            Ok(())
        }

        fn quit(&mut self) {
            self.quits += 1;
        }
    }

    fn deck(durations: &[Option<f64>]) -> DeckState {
        DeckState::new(
            durations
                .iter()
                .map(|d| {
                    let mut s = crate::deck::SlideSpec::new("x", "text", "v");
                    s.duration = *d;
                    s
                })
                .collect(),
        )
    }

    fn patcher(on_error: PatchFailurePolicy) -> TimingPatcher {
        TimingPatcher::new(TimingConfig {
            on_error,
            ..TimingConfig::default()
        })
    }

    #[test]
    fn advance_is_duration_plus_pad() {
        assert_eq!(advance_time_for(2.3, 0.5), 2.8);
        assert_eq!(advance_time_for(0.0, 0.5), 0.5);
        assert_eq!(advance_time_for(1.005, 0.0), 1.0);
    }

    #[test]
    fn slide_walks_every_state() {
        let mut host = MockHost {
            slides: 1,
            audio_on: vec![1],
            ..MockHost::default()
        };
        let outcome = patcher(PatchFailurePolicy::Continue)
            .patch_slide(&mut host, 1, 1, Some(2.3))
            .unwrap();
        assert_eq!(outcome.state, SlideTimingState::AudioAnimated);
        assert_eq!(outcome.advance_time, Some(2.8));
        assert_eq!(host.transitions, vec![(1, 3956, 1.5)]);
        assert_eq!(host.advances, vec![(1, 2.8)]);
        assert_eq!(host.animations, vec![(1, 2, 83, Trigger::WithPrevious)]);
        assert_eq!(host.hidden, vec![(1, 2)]);
    }

    #[test]
    fn missing_duration_leaves_auto_advance_off() {
        let mut host = MockHost {
            slides: 1,
            ..MockHost::default()
        };
        let outcome = patcher(PatchFailurePolicy::Continue)
            .patch_slide(&mut host, 1, 1, None)
            .unwrap();
        assert_eq!(outcome.state, SlideTimingState::Timed);
        assert_eq!(outcome.advance_time, None);
        assert!(host.advances.is_empty());
        assert!(host.animations.is_empty());
    }

    #[test]
    fn continue_policy_patches_the_rest_and_saves() {
        let mut host = MockHost {
            slides: 3,
            audio_on: vec![1, 2, 3],
            fail_on: Some(2),
            ..MockHost::default()
        };
        let report = patcher(PatchFailurePolicy::Continue)
            .patch(&mut host, Path::new("d.deck.json"), &deck(&[Some(1.0), Some(2.0), Some(3.0)]))
            .unwrap();

        assert!(!report.is_clean());
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], DeckError::Slide { index: 2, .. }));
        assert!(matches!(report.failures[0].kind(), DeckError::Automation(_)));
        assert_eq!(report.slides.len(), 2);
        assert_eq!(report.slide(3).unwrap().advance_time, Some(3.5));
        assert!(report.slides.iter().all(|s| s.total == 3));
        assert!(host.saved);
        assert_eq!(host.quits, 1);
    }

    #[test]
    fn abort_policy_stops_without_saving() {
        let mut host = MockHost {
            slides: 3,
            fail_on: Some(2),
            ..MockHost::default()
        };
        let err = patcher(PatchFailurePolicy::Abort)
            .patch(&mut host, Path::new("d.deck.json"), &deck(&[Some(1.0), Some(2.0), Some(3.0)]))
            .unwrap_err();
        assert!(matches!(err, DeckError::Slide { index: 2, .. }));
        assert_eq!(host.transitions.len(), 1);
        assert!(!host.saved);
        assert_eq!(host.quits, 1);
    }

    #[test]
    fn host_released_when_open_fails() {
        let mut host = MockHost {
            fail_open: true,
            ..MockHost::default()
        };
        let result = patcher(PatchFailurePolicy::Continue).patch(
            &mut host,
            Path::new("d.deck.json"),
            &deck(&[]),
        );
        assert!(result.is_err());
        assert_eq!(host.quits, 1);
    }

    #[test]
    fn slides_beyond_timing_data_get_no_timing() {
        let mut host = MockHost {
            slides: 2,
            ..MockHost::default()
        };
        let report = patcher(PatchFailurePolicy::Continue)
            .patch(&mut host, Path::new("d.deck.json"), &deck(&[Some(1.5)]))
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(host.advances, vec![(1, 2.0)]);
        assert_eq!(report.slide(2).unwrap().advance_time, None);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(host.opened, Some(PathBuf::from("d.deck.json")));
    }

    #[test]
    fn timing_for_another_document_is_reported() {
        let mut host = MockHost {
            slides: 1,
            ..MockHost::default()
        };
        let mut timing = deck(&[Some(1.0)]);
        timing.document = Some("other.deck.json".into());
        let report = patcher(PatchFailurePolicy::Continue)
            .patch(&mut host, Path::new("d.deck.json"), &timing)
            .unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("other.deck.json"));
        assert!(host.saved);

        let mut host = MockHost {
            slides: 1,
            ..MockHost::default()
        };
        timing.document = Some("mock.deck.json".into());
        let report = patcher(PatchFailurePolicy::Continue)
            .patch(&mut host, Path::new("d.deck.json"), &timing)
            .unwrap();
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn state_names() {
        assert_eq!(SlideTimingState::TransitionSet.to_string(), "TRANSITION_SET");
        assert_eq!(SlideTimingState::AudioAnimated.to_string(), "AUDIO_ANIMATED");
    }
}
