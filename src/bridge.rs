//! Deck serialization bridge: the on-disk contract between the two passes.
//!
//! Pass 1 writes `<stem>.deck.json` and `<stem>.timing.toml` side by side;
//! pass 2 finds the timing file from the document path.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::deck::DeckState;
use crate::error::{DeckError, DeckResult};

const DOCUMENT_SUFFIX: &str = ".deck.json";
const TIMING_SUFFIX: &str = ".timing.toml";

/// Paths of the two artifacts produced for one deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckArtifacts {
    pub document: PathBuf,
    pub timing: PathBuf,
}

impl DeckArtifacts {
    /// Artifacts for a `generate` output path. A bare stem like `out/talk`
    /// gets the document suffix appended.
    pub fn for_output(output: &Path) -> Self {
        let document = if file_name(output).ends_with(DOCUMENT_SUFFIX) {
            output.to_path_buf()
        } else {
            output.with_file_name(format!("{}{DOCUMENT_SUFFIX}", stem_of(output)))
        };
        let timing = timing_path_for(&document);
        Self { document, timing }
    }

    pub fn for_document(document: &Path) -> Self {
        Self {
            document: document.to_path_buf(),
            timing: timing_path_for(document),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `talk.deck.json` → `talk`, `talk.json` → `talk`, `talk` → `talk`.
fn stem_of(path: &Path) -> String {
    let name = file_name(path);
    if let Some(stem) = name.strip_suffix(DOCUMENT_SUFFIX) {
        return stem.to_string();
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(name)
}

/// Timing file that sits next to a deck document.
pub fn timing_path_for(document: &Path) -> PathBuf {
    document.with_file_name(format!("{}{TIMING_SUFFIX}", stem_of(document)))
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
/// Creates the parent directory.
pub(crate) fn write_atomically(path: &Path, contents: &[u8], action: &str) -> DeckResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| DeckError::io_at("create directory", &dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".deckcast-")
        .tempfile_in(&dir)
        .map_err(|e| DeckError::io_at(action, path, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| DeckError::io_at(action, path, e))?;
    tmp.persist(path)
        .map_err(|e| DeckError::io_at(action, path, e.error))?;
    Ok(())
}

/// Write the deck, durations included, as TOML. Overwrites earlier runs.
pub fn persist(deck: &DeckState, target: &Path) -> DeckResult<()> {
    let contents = deck.to_toml_string()?;
    write_atomically(target, contents.as_bytes(), "write timing file")?;
    debug!("Persisted {} slides to {}", deck.len(), target.display());
    Ok(())
}

pub fn load(target: &Path) -> DeckResult<DeckState> {
    let contents = std::fs::read_to_string(target)
        .map_err(|e| DeckError::io_at("read timing file", target, e))?;
    DeckState::from_toml_str(&contents)
}
