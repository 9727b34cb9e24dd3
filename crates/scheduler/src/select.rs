//! Selection and naming of local files for a posting run.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// One file chosen for posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected {
    pub path: PathBuf,
    /// Display title derived from the file stem.
    pub title: String,
    /// Sidecar comment, empty when no `<stem>.txt` exists.
    pub comment: String,
}

/// Pick up to `limit` postable images from `dir`, numerically ordered.
///
/// Files are ordered by the numeric component of their stem, so `img2`
/// posts before `img10`. Each image may carry a sidecar `<stem>.txt`
/// with its comment.
pub fn select_images(dir: &Path, limit: usize) -> Result<Vec<Selected>> {
    if !dir.is_dir() {
        return Err(Error::not_a_directory(dir));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    files.sort_by_key(|path| numeric_key(stem_of(path)));
    files.truncate(limit);

    debug!(directory = %dir.display(), count = files.len(), "selected files");

    Ok(files
        .into_iter()
        .map(|path| {
            let comment =
                std::fs::read_to_string(path.with_extension("txt")).unwrap_or_default();
            Selected {
                title: display_title(stem_of(&path)),
                comment,
                path,
            }
        })
        .collect())
}

/// Underscores and runs of whitespace collapse to single spaces.
#[must_use]
pub fn display_title(stem: &str) -> String {
    stem.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn stem_of(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default()
}

/// Numeric component of a file stem; non-numeric stems sort first.
fn numeric_key(stem: &str) -> u64 {
    let digits: String = stem.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}
