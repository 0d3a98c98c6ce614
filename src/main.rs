//! deckcast: narrated code slide decks from a TOML/YAML description.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use deckcast::bridge::{self, DeckArtifacts};
use deckcast::config::{Config, TtsBackend};
use deckcast::deck::DeckState;
use deckcast::highlight::SyntectTokenizer;
use deckcast::narration::{self, capture};
use deckcast::patch::{FileHost, TimingPatcher};
use deckcast::pipeline::{DeckGenerator, PipelineOptions};

#[derive(Parser, Debug)]
#[command(name = "deckcast", about = "Narrated, auto-advancing code slide decks")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render slides, synthesize narration, save the deck and its timing file
    Generate {
        /// Deck description (.toml, .yaml or .yml)
        input: PathBuf,
        /// Output document; `.deck.json` is appended to a bare stem
        output: PathBuf,
        /// Color theme (monokai, one-dark)
        #[arg(long)]
        theme: Option<String>,
        /// Narration backend: kokoro, http, or silent
        #[arg(long)]
        backend: Option<String>,
        /// Skip narration and duration capture
        #[arg(long)]
        no_durations: bool,
        /// Do not write the timing file
        #[arg(long)]
        no_intermediate: bool,
    },
    /// Apply transitions, auto-advance and audio autoplay to a saved deck
    Patch {
        /// Deck document written by `generate`
        document: PathBuf,
        /// Timing file (default: `<stem>.timing.toml` next to the document)
        #[arg(long)]
        timing: Option<PathBuf>,
    },
    /// Synthesize one narration to a WAV file and report its duration
    Say {
        text: String,
        out: PathBuf,
        /// Narration backend: kokoro, http, or silent
        #[arg(long)]
        backend: Option<String>,
    },
}

fn apply_backend(config: &mut Config, backend: Option<&str>) -> anyhow::Result<()> {
    if let Some(name) = backend {
        config.tts.backend = TtsBackend::from_str(name)
            .with_context(|| format!("unknown narration backend '{name}'"))?;
    }
    Ok(())
}

fn generate(config: &Config, input: &Path, output: &Path) -> anyhow::Result<()> {
    let mut deck =
        DeckState::load(input).with_context(|| format!("loading {}", input.display()))?;
    let options = PipelineOptions::from_config(config)?;
    let tokenizer = SyntectTokenizer::new();

    let synth = if options.capture_durations {
        info!("Loading narration backend...");
        Some(narration::from_config(&config.tts)?)
    } else {
        None
    };

    let artifacts = DeckArtifacts::for_output(output);
    let generator = DeckGenerator::new(config, options, &tokenizer, synth.as_deref());
    let report = generator
        .generate(&mut deck, &artifacts)
        .context("generating deck")?;

    info!(
        "Generated {} slides ({:.2}s of narration) → {}",
        report.slides,
        report.total_duration,
        report.document.display()
    );
    if !report.skipped_audio.is_empty() {
        tracing::warn!("Slides without narration: {:?}", report.skipped_audio);
    }
    Ok(())
}

fn patch(config: &Config, document: &Path, timing: Option<&Path>) -> anyhow::Result<()> {
    let timing = timing
        .map(Path::to_path_buf)
        .unwrap_or_else(|| DeckArtifacts::for_document(document).timing);
    let deck =
        bridge::load(&timing).with_context(|| format!("loading timing from {}", timing.display()))?;

    let mut host = FileHost::new();
    let report = TimingPatcher::new(config.timing.clone())
        .patch(&mut host, document, &deck)
        .with_context(|| format!("patching {}", document.display()))?;

    if !report.is_clean() {
        for failure in &report.failures {
            tracing::error!("{failure}");
        }
        bail!(
            "{} of {} slides failed to patch",
            report.failures.len(),
            report.slides.len() + report.failures.len()
        );
    }
    info!("✓ Patching complete!");
    Ok(())
}

fn say(config: &Config, text: &str, out: &Path) -> anyhow::Result<()> {
    let synth = narration::from_config(&config.tts)?;
    let narration = narration::narrate(text, synth.as_ref())?;
    capture::write_wav(out, &narration.audio)?;
    info!("Wrote {} ({:.2}s)", out.display(), narration.duration);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Suppress noisy ort internals
    let filter = if args.verbose {
        EnvFilter::new("debug,ort=info")
    } else {
        EnvFilter::new("info,ort=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load(args.config.as_deref());

    // Synthesis and host calls block; keep them off the async workers.
    tokio::task::spawn_blocking(move || match args.command {
        Command::Generate {
            input,
            output,
            theme,
            backend,
            no_durations,
            no_intermediate,
        } => {
            if let Some(theme) = theme {
                config.render.theme = theme;
                config.render.theme_file = None;
            }
            apply_backend(&mut config, backend.as_deref())?;
            if no_durations {
                config.pipeline.capture_durations = false;
            }
            if no_intermediate {
                config.pipeline.persist_intermediate = false;
            }
            generate(&config, &input, &output)
        }
        Command::Patch { document, timing } => patch(&config, &document, timing.as_deref()),
        Command::Say { text, out, backend } => {
            apply_backend(&mut config, backend.as_deref())?;
            say(&config, &text, &out)
        }
    })
    .await?
}
