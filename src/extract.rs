//! MIDI pack extraction
//!
//! A drum MIDI pack is laid out as `<genre-id>@<name>/<variant>@<info>/*.mid`.
//! Extraction flattens the selected genres into one directory, naming each
//! file `<GENRE>_<info>_<file>` and skipping fill-in variants. MIDI contents
//! are never read.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{Error, Result};

/// Genre ids used in pack directory names.
pub const GENRES: &[(u32, &str)] = &[
    (1, "NO-GENRE"),
    (2, "SALSA"),
    (3, "GUAGUANCO"),
    (4, "SONGO"),
    (5, "CABALLO"),
    (6, "MERENGUE"),
    (7, "CUBAN-MAMBO"),
    (8, "MOZAMBIQUE"),
    (9, "CHA-CHA-CHA"),
    (10, "PLENA"),
    (20, "TIMBA"),
    (30, "BOMBA"),
    (40, "CHARANGA"),
    (50, "CUBAN-6#8"),
    (60, "INTRO-PICKUPS"),
];

/// Genres extracted unless every genre is requested.
pub const SELECTED_GENRES: &[&str] = &[
    "SALSA",
    "GUAGUANCO",
    "SONGO",
    "MERENGUE",
    "CUBAN-MAMBO",
    "MOZAMBIQUE",
    "CHA-CHA-CHA",
];

const FILL_MARKER: &str = "FILL-IN";
const MIDI_EXTENSION: &str = "mid";

/// Look up the genre of a pack directory from the id in the first two
/// characters of its name (`02@Salsa` is `SALSA`).
#[must_use]
pub fn genre_for_dir_name(name: &str) -> Option<&'static str> {
    let prefix = name.split('@').next()?;
    let id: String = prefix.chars().take(2).collect();
    let id: u32 = id.parse().ok()?;
    GENRES
        .iter()
        .find(|(genre_id, _)| *genre_id == id)
        .map(|(_, genre)| *genre)
}

/// Check whether a variant directory holds fill-ins.
#[must_use]
pub fn is_fill(name: &str) -> bool {
    name.contains(FILL_MARKER)
}

/// Outcome of `extract_midi_pack`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Files written into the output directory
    pub copied: Vec<PathBuf>,
    /// Genre directories skipped because their genre is not selected
    pub skipped_genres: Vec<PathBuf>,
    /// `.mid` files in the output directory after extraction
    pub total_midi_files: usize,
}

/// Copy the MIDI files of a pack into `out_dir`.
///
/// Only [`SELECTED_GENRES`] are extracted unless `all_genres` is set.
/// Files already in `out_dir` with the same name are overwritten.
///
/// # Errors
///
/// Returns `Error::UnknownGenre` for a genre directory without a known id,
/// and an IO error if the pack cannot be read or a file cannot be copied.
pub fn extract_midi_pack<P: AsRef<Path>, Q: AsRef<Path>>(
    pack_dir: P,
    out_dir: Q,
    all_genres: bool,
) -> Result<ExtractReport> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;

    let mut report = ExtractReport::default();
    for genre_dir in child_dirs(pack_dir.as_ref())? {
        let name = genre_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let genre = genre_for_dir_name(&name).ok_or_else(|| Error::UnknownGenre {
            dir: genre_dir.clone(),
        })?;
        tracing::info!(dir = %name, genre, "processing genre directory");
        if !all_genres && !SELECTED_GENRES.contains(&genre) {
            report.skipped_genres.push(genre_dir);
            continue;
        }

        for variant_dir in child_dirs(&genre_dir)? {
            let variant = variant_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if is_fill(&variant) {
                continue;
            }
            let info = variant.rsplit('@').next().unwrap_or(&variant);
            tracing::debug!(dir = %variant, info, "processing variant directory");

            for entry in fs::read_dir(&variant_dir)? {
                let path = entry?.path();
                if !path.is_file() || path.extension().map_or(true, |ext| ext != MIDI_EXTENSION) {
                    continue;
                }
                let Some(file_name) = path.file_name() else {
                    continue;
                };
                let target = out_dir.join(format!(
                    "{genre}_{info}_{}",
                    file_name.to_string_lossy()
                ));
                fs::copy(&path, &target)?;
                report.copied.push(target);
            }
        }
    }
    report.copied.sort();

    report.total_midi_files = WalkDir::new(out_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == MIDI_EXTENSION))
        .count();
    Ok(report)
}

/// Subdirectories of `dir`, sorted by name.
fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}
