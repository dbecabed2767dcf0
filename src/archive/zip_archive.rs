//! Zip (XPI/JAR) archives.

use std::fs::File;
use std::path::Path;

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use zip::{CompressionMethod, ZipArchive};

use super::{
    ArchiveError, ArchiveLimits, ArchiveMember, CancelToken, MemberCompression, MemberEntry,
    SizeBudget, read_member, validate_member, write_member,
};
use crate::messages::sanitise_for_display;

/// Signature files left by the signing service: `META-INF/<name>.rsa|sf`.
static SIGNATURE_FILE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^META-INF/(\w+)\.(rsa|sf)$").ok());

/// Member id reported for compression methods the zip reader cannot name.
const UNKNOWN_METHOD: u16 = u16::MAX;

/// A validated zip archive.
///
/// `entries` and `indices` run in parallel: `indices[n]` is the position of
/// `entries[n]` in the central directory.
#[derive(Debug)]
pub struct SafeZip {
    archive: ZipArchive<File>,
    entries: Vec<MemberEntry>,
    indices: Vec<usize>,
    total_size: u64,
}

impl SafeZip {
    /// Open and validate the zip archive at `path`.
    ///
    /// # Errors
    ///
    /// See [`super::SafeArchive::open`].
    pub fn open(path: &Path, limits: &ArchiveLimits, relaxed: bool) -> Result<Self, ArchiveError> {
        Self::open_with(path, limits, relaxed, &CancelToken::new())
    }

    /// Open, checking `cancel` before each member.
    ///
    /// # Errors
    ///
    /// See [`super::SafeArchive::open_with`].
    pub fn open_with(
        path: &Path,
        limits: &ArchiveLimits,
        relaxed: bool,
        cancel: &CancelToken,
    ) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file).map_err(ArchiveError::corrupt)?;
        let rules = limits.member_rules(relaxed);
        let mut budget = SizeBudget::new(limits);
        let mut entries = Vec::with_capacity(archive.len());
        let mut indices = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            cancel.check()?;
            let raw = archive.by_index_raw(index).map_err(ArchiveError::corrupt)?;
            let member = ArchiveMember {
                name: Some(raw.name_raw().to_vec()),
                uncompressed_size: Some(raw.size()),
                compression: compression_of(raw.compression()),
            };
            let is_dir = raw.is_dir();
            drop(raw);

            let name = validate_member(&member, &rules)?;
            let size = member.uncompressed_size.unwrap_or_default();
            budget.charge(size)?;
            entries.push(MemberEntry { name, size, is_dir });
            indices.push(index);
        }

        info!(
            target: "archive::zip",
            "opened zip with {} members totalling {} bytes",
            entries.len(),
            budget.total()
        );
        Ok(Self {
            archive,
            entries,
            indices,
            total_size: budget.total(),
        })
    }

    /// Validated members in archive order.
    #[must_use]
    pub fn members(&self) -> &[MemberEntry] {
        &self.entries
    }

    /// Sum of the declared member sizes.
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Whether a `META-INF/<name>.rsa` and matching `.sf` are both present.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        let Some(pattern) = SIGNATURE_FILE.as_ref() else {
            return false;
        };
        let mut rsa = Vec::new();
        let mut sf = Vec::new();
        for entry in &self.entries {
            if let Some(captures) = pattern.captures(&entry.name) {
                let stem = captures.get(1).map(|m| m.as_str().to_owned());
                match captures.get(2).map(|m| m.as_str()) {
                    Some("rsa") => rsa.extend(stem),
                    Some("sf") => sf.extend(stem),
                    _ => {}
                }
            }
        }
        rsa.iter().any(|stem| sf.contains(stem))
    }

    /// Read one member by name.
    ///
    /// # Errors
    ///
    /// See [`super::SafeArchive::read`].
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let (entry, index) = self
            .entries
            .iter()
            .zip(self.indices.iter().copied())
            .find(|(entry, _)| entry.name == name && !entry.is_dir)
            .ok_or_else(|| ArchiveError::MemberNotFound {
                name: name.to_owned(),
            })?;
        let mut file = self.archive.by_index(index).map_err(ArchiveError::corrupt)?;
        read_member(entry, &mut file)
    }

    /// Extract every member under `destination`.
    ///
    /// # Errors
    ///
    /// See [`super::SafeArchive::extract_to_with`].
    pub fn extract_to_with(
        &mut self,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ArchiveError> {
        std::fs::create_dir_all(destination)?;
        for (entry, index) in self.entries.iter().zip(self.indices.iter().copied()) {
            cancel.check()?;
            debug!(
                target: "archive::zip",
                "extracting {}",
                sanitise_for_display(&entry.name)
            );
            let mut file = self.archive.by_index(index).map_err(ArchiveError::corrupt)?;
            write_member(destination, entry, &mut file)?;
        }
        Ok(())
    }
}

#[expect(
    deprecated,
    reason = "`Unsupported` is the only way the zip reader exposes unknown method ids"
)]
fn compression_of(method: CompressionMethod) -> MemberCompression {
    match method {
        CompressionMethod::Stored => MemberCompression::Stored,
        CompressionMethod::Deflated => MemberCompression::Deflate,
        CompressionMethod::Unsupported(id) => MemberCompression::Other(id),
        _ => MemberCompression::Other(UNKNOWN_METHOD),
    }
}
