//! In-place expansion of archives nested inside an extracted package.
//!
//! A member such as `lib/foo.jar` is replaced by a directory of the same name
//! holding its contents. Each nested archive is opened with the same
//! validation as the upload; one that fails validation stays a plain file.
//! Passes repeat until nothing new expands, at most [`MAX_EXPANSION_ROUNDS`]
//! times, and all nested archives together share one size budget.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::archive::{ArchiveError, ArchiveFormat, ArchiveLimits, CancelToken, SafeArchive};
use crate::crx;
use crate::error::IngestError;
use crate::messages::sanitise_for_display;

/// Most passes made over an extracted tree.
pub const MAX_EXPANSION_ROUNDS: usize = 10;

/// Member suffixes treated as nested archives, compared case-insensitively.
pub const NESTED_ARCHIVE_SUFFIXES: [&str; 4] = [".crx", ".jar", ".xpi", ".zip"];

/// Validation settings every nested archive is opened with.
pub(super) struct Expander<'a> {
    pub(super) limits: &'a ArchiveLimits,
    pub(super) relaxed: bool,
    pub(super) cancel: &'a CancelToken,
}

impl Expander<'_> {
    /// Expand nested archives under `root`, returning how many were expanded.
    pub(super) fn expand(&self, root: &Path) -> Result<usize, IngestError> {
        let mut budget = self.limits.max_total_size;
        let mut expanded = 0_usize;
        for round in 1..=MAX_EXPANSION_ROUNDS {
            let mut progressed = false;
            for candidate in nested_candidates(root)? {
                self.cancel.check()?;
                if self.expand_one(&candidate, &mut budget)? {
                    expanded = expanded.saturating_add(1);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
            debug!(target: "ingest", "expansion round {round} finished");
        }
        Ok(expanded)
    }

    fn expand_one(&self, path: &Path, budget: &mut u64) -> Result<bool, IngestError> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        let converted = if has_suffix(path, ".crx") {
            crx_payload(path)
        } else {
            None
        };
        let source = converted.as_ref().map_or(path, NamedTempFile::path);
        let opened = SafeArchive::open_with(
            source,
            ArchiveFormat::Zip,
            self.limits,
            self.relaxed,
            self.cancel,
        );
        let mut archive = match opened {
            Ok(archive) => archive,
            Err(error @ (ArchiveError::Cancelled | ArchiveError::Io(_))) => {
                return Err(error.into());
            }
            Err(error) => {
                warn!(target: "ingest", "left {} unexpanded: {error}", shown(path));
                return Ok(false);
            }
        };
        if archive.total_size() >= *budget {
            warn!(
                target: "ingest",
                "left {} unexpanded: nested archives exceed the size limit",
                shown(path)
            );
            return Ok(false);
        }
        *budget = budget.saturating_sub(archive.total_size());

        let staging = tempfile::Builder::new()
            .prefix(".expand-")
            .tempdir_in(parent)?;
        archive.extract_to_with(staging.path(), self.cancel)?;
        let members = archive.members().len();
        drop(archive);
        fs::remove_file(path)?;
        fs::rename(staging.path(), path)?;
        info!(target: "ingest", "expanded {} ({members} members)", shown(path));
        Ok(true)
    }
}

/// Regular files under `root` named like nested archives, in name order.
fn nested_candidates(root: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file()
            && NESTED_ARCHIVE_SUFFIXES
                .iter()
                .any(|suffix| has_suffix(entry.path(), suffix))
        {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().to_lowercase().ends_with(suffix))
}

/// The zip inside a nested CRX, or `None` to read the member as a zip.
fn crx_payload(path: &Path) -> Option<NamedTempFile> {
    let payload = NamedTempFile::new().ok()?;
    let reader = BufReader::new(File::open(path).ok()?);
    match crx::convert(reader, BufWriter::new(payload.as_file())) {
        Ok(_) => Some(payload),
        Err(error) => {
            debug!(target: "ingest", "{} is not a CRX ({error})", shown(path));
            None
        }
    }
}

fn shown(path: &Path) -> String {
    sanitise_for_display(&path.display().to_string())
}
