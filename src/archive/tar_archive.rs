//! Tar archives, optionally gzip or bzip2 compressed.
//!
//! Tar streams are not randomly addressable, so `read` and extraction replay
//! the stream from the start and pair each entry with the member validated at
//! open time.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use log::{debug, info};
use tar::{Archive, EntryType};

use super::{
    ArchiveError, ArchiveLimits, ArchiveMember, CancelToken, MemberCompression, MemberEntry,
    SizeBudget, TarCompression, read_member, validate_member, write_member,
};
use crate::messages::sanitise_for_display;

/// A validated tar archive.
#[derive(Debug)]
pub struct SafeTar {
    path: PathBuf,
    compression: TarCompression,
    entries: Vec<MemberEntry>,
    total_size: u64,
}

impl SafeTar {
    /// Open and validate the tar archive at `path`.
    ///
    /// # Errors
    ///
    /// See [`super::SafeArchive::open`].
    pub fn open(
        path: &Path,
        compression: TarCompression,
        limits: &ArchiveLimits,
        relaxed: bool,
    ) -> Result<Self, ArchiveError> {
        Self::open_with(path, compression, limits, relaxed, &CancelToken::new())
    }

    /// Open, checking `cancel` before each member.
    ///
    /// # Errors
    ///
    /// See [`super::SafeArchive::open_with`].
    pub fn open_with(
        path: &Path,
        compression: TarCompression,
        limits: &ArchiveLimits,
        relaxed: bool,
        cancel: &CancelToken,
    ) -> Result<Self, ArchiveError> {
        let mut archive = open_stream(path, compression)?;
        let rules = limits.member_rules(relaxed);
        let mut budget = SizeBudget::new(limits);
        let mut entries = Vec::new();

        for item in archive.entries().map_err(ArchiveError::corrupt)? {
            cancel.check()?;
            let entry = item.map_err(ArchiveError::corrupt)?;
            let entry_type = entry.header().entry_type();
            if entry_type.is_pax_global_extensions() {
                continue;
            }

            let member = ArchiveMember {
                name: Some(entry.path_bytes().into_owned()),
                uncompressed_size: entry.header().size().ok(),
                compression: MemberCompression::Stored,
            };
            let name = validate_member(&member, &rules)?;
            let is_dir = is_directory(entry_type, &name)?;
            let size = if is_dir {
                0
            } else {
                member.uncompressed_size.unwrap_or_default()
            };
            budget.charge(size)?;
            entries.push(MemberEntry { name, size, is_dir });
        }

        info!(
            target: "archive::tar",
            "opened tar with {} members totalling {} bytes",
            entries.len(),
            budget.total()
        );
        Ok(Self {
            path: path.to_path_buf(),
            compression,
            entries,
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

    /// Read one member by name.
    ///
    /// # Errors
    ///
    /// See [`super::SafeArchive::read`].
    pub fn read(&self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let not_found = || ArchiveError::MemberNotFound {
            name: name.to_owned(),
        };
        if !self
            .entries
            .iter()
            .any(|entry| entry.name == name && !entry.is_dir)
        {
            return Err(not_found());
        }

        let mut found = None;
        self.replay(&CancelToken::new(), |entry, reader| {
            if entry.name == name && !entry.is_dir {
                found = Some(read_member(entry, reader)?);
                return Ok(true);
            }
            Ok(false)
        })?;
        found.ok_or_else(not_found)
    }

    /// Extract every member under `destination`.
    ///
    /// # Errors
    ///
    /// See [`super::SafeArchive::extract_to_with`].
    pub fn extract_to_with(
        &self,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ArchiveError> {
        std::fs::create_dir_all(destination)?;
        self.replay(cancel, |entry, reader| {
            debug!(
                target: "archive::tar",
                "extracting {}",
                sanitise_for_display(&entry.name)
            );
            write_member(destination, entry, reader)?;
            Ok(false)
        })
    }

    /// Walk the stream again, handing each validated member and its data to
    /// `visit` until it returns `true` or the stream ends.
    fn replay<F>(&self, cancel: &CancelToken, mut visit: F) -> Result<(), ArchiveError>
    where
        F: FnMut(&MemberEntry, &mut dyn Read) -> Result<bool, ArchiveError>,
    {
        let mut archive = open_stream(&self.path, self.compression)?;
        let mut expected = self.entries.iter();
        for item in archive.entries().map_err(ArchiveError::corrupt)? {
            cancel.check()?;
            let mut entry = item.map_err(ArchiveError::corrupt)?;
            if entry.header().entry_type().is_pax_global_extensions() {
                continue;
            }
            let Some(validated) = expected.next() else {
                return Err(stream_changed());
            };
            if entry.path_bytes().as_ref() != validated.name.as_bytes() {
                return Err(stream_changed());
            }
            if visit(validated, &mut entry)? {
                break;
            }
        }
        Ok(())
    }
}

fn open_stream(
    path: &Path,
    compression: TarCompression,
) -> Result<Archive<Box<dyn Read>>, ArchiveError> {
    let file = BufReader::new(File::open(path)?);
    let reader: Box<dyn Read> = match compression {
        TarCompression::None => Box::new(file),
        TarCompression::Gzip => Box::new(GzDecoder::new(file)),
        TarCompression::Bzip2 => Box::new(BzDecoder::new(file)),
    };
    Ok(Archive::new(reader))
}

/// Classify an entry type, rejecting anything that is not a plain file or a
/// directory.
fn is_directory(entry_type: EntryType, name: &str) -> Result<bool, ArchiveError> {
    if entry_type.is_dir() {
        return Ok(true);
    }
    if entry_type.is_file() || entry_type.is_contiguous() {
        return Ok(false);
    }
    if entry_type.is_symlink()
        || entry_type.is_hard_link()
        || entry_type.is_character_special()
        || entry_type.is_block_special()
        || entry_type.is_fifo()
    {
        return Err(ArchiveError::ForbiddenSpecialFile {
            name: name.to_owned(),
        });
    }
    Err(ArchiveError::UnsupportedMemberType {
        name: name.to_owned(),
        entry_type: entry_type.as_byte(),
    })
}

fn stream_changed() -> ArchiveError {
    ArchiveError::corrupt(io::Error::other("tar stream changed since it was opened"))
}
