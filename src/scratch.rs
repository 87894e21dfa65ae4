//! Scratch-directory protocol
//!
//! The preprocessing step hands its result back through the filesystem: it
//! writes one directory named `PreProcessed_<descriptor>` into the scratch
//! directory. These helpers find such directories and reset the scratch
//! directory between items.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{Error, Result};

/// Leading name segment of a preprocessed dataset directory.
pub const PREPROCESSED_KEYWORD: &str = "PreProcessed";

/// File extension of trained model checkpoints.
pub const MODEL_EXTENSION: &str = "pth";

/// Check whether a directory name marks a preprocessed dataset.
///
/// Only the first `_`-delimited segment is compared, so
/// `PreProcessed_On_03_04_2024` matches and `AfroCuban_PreProcessed` does not.
#[must_use]
pub fn is_preprocessed_dataset_dir(name: &str) -> bool {
    name.split('_').next() == Some(PREPROCESSED_KEYWORD)
}

/// List entries of `dir` whose names mark a preprocessed dataset, sorted by name.
///
/// # Errors
///
/// Returns an IO error if `dir` cannot be read.
pub fn find_preprocessed_datasets<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut datasets = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        if entry
            .file_name()
            .to_str()
            .is_some_and(is_preprocessed_dataset_dir)
        {
            datasets.push(entry.path());
        }
    }
    datasets.sort();
    Ok(datasets)
}

/// List model checkpoints (`*.pth` files) in `dir`, sorted by name.
///
/// # Errors
///
/// Returns an IO error if `dir` cannot be read.
pub fn find_model_paths<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut models = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == MODEL_EXTENSION) {
            models.push(path);
        }
    }
    models.sort();
    Ok(models)
}

/// Remove every file, symlink and subdirectory inside `dir`, keeping `dir` itself.
///
/// A missing `dir` is recreated empty, so the next item always starts from
/// an existing, empty scratch directory.
///
/// # Errors
///
/// Returns `Error::Cleanup` if anything cannot be removed.
pub fn clear_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    let cleanup_err = |source: std::io::Error| Error::Cleanup {
        path: dir.to_path_buf(),
        source,
    };

    if !dir.exists() {
        return fs::create_dir_all(dir).map_err(cleanup_err);
    }

    for entry in fs::read_dir(dir).map_err(cleanup_err)? {
        let entry = entry.map_err(cleanup_err)?;
        let path = entry.path();
        // file_type() does not follow symlinks, so linked directories are unlinked, not walked.
        let file_type = entry.file_type().map_err(cleanup_err)?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(cleanup_err)?;
        } else {
            fs::remove_file(&path).map_err(cleanup_err)?;
        }
    }
    Ok(())
}

/// Outcome of `copy_preprocessed_datasets`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Dataset directories copied into the destination
    pub copied: Vec<PathBuf>,
    /// Dataset directories skipped because the destination already had them
    pub skipped: Vec<PathBuf>,
}

/// Copy every dataset directory of `source_dir` into `destination_dir`.
///
/// Existing destination entries are never overwritten; plain files in
/// `source_dir` are ignored. Symlinks inside a dataset are followed and
/// their contents copied. Each dataset is staged under a hidden sibling
/// name and renamed into place, so an interrupted copy never looks like an
/// already-present dataset.
///
/// # Errors
///
/// Returns an IO error if a directory cannot be listed, and
/// `Error::DatasetCopy` if a dataset cannot be copied.
pub fn copy_preprocessed_datasets<P: AsRef<Path>, Q: AsRef<Path>>(
    source_dir: P,
    destination_dir: Q,
) -> Result<CopyReport> {
    let destination_dir = destination_dir.as_ref();
    fs::create_dir_all(destination_dir)?;

    let mut sources = Vec::new();
    for entry in fs::read_dir(source_dir.as_ref())? {
        let path = entry?.path();
        // Follows symlinks, so a linked dataset directory counts as a dataset.
        if path.is_dir() {
            sources.push(path);
        }
    }
    sources.sort();

    let mut report = CopyReport::default();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = destination_dir.join(name);
        if target.exists() {
            tracing::info!(dataset = %source.display(), "already present in destination, skipping");
            report.skipped.push(source);
            continue;
        }

        tracing::info!(
            dataset = %source.display(),
            destination = %destination_dir.display(),
            "copying dataset"
        );
        let mut staged_name = OsString::from(".");
        staged_name.push(name);
        staged_name.push(".partial");
        let staging = destination_dir.join(staged_name);
        copy_staged(&source, &staging, &target)?;
        report.copied.push(target);
    }
    Ok(report)
}

fn copy_staged(source: &Path, staging: &Path, target: &Path) -> Result<()> {
    if staging.exists() {
        fs::remove_dir_all(staging).map_err(copy_error(staging))?;
    }
    let copied = copy_tree(source, staging)
        .and_then(|()| fs::rename(staging, target).map_err(copy_error(target)));
    if copied.is_err() && staging.exists() {
        if let Err(err) = fs::remove_dir_all(staging) {
            tracing::warn!(
                staging = %staging.display(),
                error = %err,
                "could not remove partial copy"
            );
        }
    }
    copied
}

fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let dangling = err
                    .io_error()
                    .is_some_and(|io| io.kind() == io::ErrorKind::NotFound);
                match err.path().map(Path::to_path_buf) {
                    Some(link) if dangling && link.is_symlink() => {
                        preserve_dangling_link(source, &link, target)?;
                        continue;
                    }
                    path => {
                        let path = path.unwrap_or_else(|| source.to_path_buf());
                        return Err(Error::DatasetCopy {
                            path,
                            source: io::Error::from(err),
                        });
                    }
                }
            }
        };

        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let dest = target.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&dest).map_err(copy_error(entry.path()))?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &dest).map_err(copy_error(entry.path()))?;
        }
    }
    Ok(())
}

/// Recreate a symlink whose target does not exist, rather than failing the copy.
fn preserve_dangling_link(source: &Path, link: &Path, target: &Path) -> Result<()> {
    let Ok(relative) = link.strip_prefix(source) else {
        return Ok(());
    };
    let link_target = fs::read_link(link).map_err(copy_error(link))?;
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&link_target, target.join(relative))
            .map_err(copy_error(link))?;
    }
    #[cfg(not(unix))]
    {
        tracing::warn!(
            link = %link.display(),
            target = %link_target.display(),
            relative = %relative.display(),
            "skipping dangling symlink"
        );
        let _ = target;
    }
    Ok(())
}

fn copy_error(path: &Path) -> impl FnOnce(io::Error) -> Error {
    let path = path.to_path_buf();
    move |source| Error::DatasetCopy { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_matches_first_segment_only() {
        assert!(is_preprocessed_dataset_dir("PreProcessed"));
        assert!(is_preprocessed_dataset_dir("PreProcessed_On_03_04_2024_at_01_04_hrs"));
        assert!(!is_preprocessed_dataset_dir(
            "AfroCuban_Validation_PreProcessed_On_03_04_2024"
        ));
        assert!(!is_preprocessed_dataset_dir("PreProcessedData_x"));
        assert!(!is_preprocessed_dataset_dir(""));
    }

    #[test]
    fn test_clear_dir_recreates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("pre_out");
        clear_dir(&scratch).unwrap();
        assert!(scratch.is_dir());
    }
}
