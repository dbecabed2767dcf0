//! Safe opening, reading and extraction of untrusted zip and tar archives.
//!
//! Opening an archive walks its whole member list up front. Every member is
//! checked with [`validate_member`] and the declared sizes are summed, so a
//! decompression bomb is refused before a single byte is written. Extraction
//! then re-checks each destination path component-wise, which keeps relaxed
//! re-extraction from escaping the destination as well.

mod error;
mod member;
mod tar_archive;
mod zip_archive;

use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

pub use error::ArchiveError;
pub use member::{ArchiveMember, MemberCompression, MemberRules, validate_member};
pub use tar_archive::SafeTar;
pub use zip_archive::SafeZip;

/// Default per-member ceiling: 100 MiB.
pub const DEFAULT_MAX_MEMBER_SIZE: u64 = 104_857_600;
/// Default whole-archive ceiling: 200 MiB.
pub const DEFAULT_MAX_TOTAL_SIZE: u64 = 209_715_200;

const COPY_CHUNK: usize = 64 * 1024;

/// Size ceilings applied while opening an archive.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveLimits {
    /// Largest permitted uncompressed size of a single member.
    pub max_member_size: u64,
    /// The summed uncompressed size must stay strictly below this.
    pub max_total_size: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_member_size: DEFAULT_MAX_MEMBER_SIZE,
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
        }
    }
}

impl ArchiveLimits {
    pub(crate) const fn member_rules(&self, relaxed: bool) -> MemberRules {
        MemberRules {
            max_member_size: self.max_member_size,
            relaxed,
        }
    }
}

/// Stream compression wrapped around a tar archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TarCompression {
    /// Uncompressed; only chosen through an explicit kind.
    None,
    /// `.tar.gz` / `.tgz`.
    Gzip,
    /// `.tar.bz2`.
    Bzip2,
}

/// Container format of an archive on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Zip, including XPI and JAR files.
    Zip,
    /// Tar with the given stream compression.
    Tar(TarCompression),
}

/// Cooperative cancellation flag checked between archive members.
///
/// Clones share the same flag, so a caller can hand one clone to a watchdog
/// and pass the other into the archive operation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; takes effect at the next member boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), ArchiveError> {
        if self.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }
        Ok(())
    }
}

/// A member that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberEntry {
    /// Decoded member name.
    pub name: String,
    /// Declared uncompressed size.
    pub size: u64,
    /// Whether the member is a directory.
    pub is_dir: bool,
}

/// An opened archive whose members have all been validated.
#[derive(Debug)]
pub enum SafeArchive {
    /// Zip container.
    Zip(SafeZip),
    /// Tar container.
    Tar(SafeTar),
}

impl SafeArchive {
    /// Open `path` as `format` and validate every member.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] when the container is corrupt, a member breaks
    /// a rule, or the declared total reaches `limits.max_total_size`.
    pub fn open(
        path: &Path,
        format: ArchiveFormat,
        limits: &ArchiveLimits,
        relaxed: bool,
    ) -> Result<Self, ArchiveError> {
        Self::open_with(path, format, limits, relaxed, &CancelToken::new())
    }

    /// As [`Self::open`], checking `cancel` before each member.
    ///
    /// # Errors
    ///
    /// As [`Self::open`], plus [`ArchiveError::Cancelled`].
    pub fn open_with(
        path: &Path,
        format: ArchiveFormat,
        limits: &ArchiveLimits,
        relaxed: bool,
        cancel: &CancelToken,
    ) -> Result<Self, ArchiveError> {
        match format {
            ArchiveFormat::Zip => SafeZip::open_with(path, limits, relaxed, cancel).map(Self::Zip),
            ArchiveFormat::Tar(compression) => {
                SafeTar::open_with(path, compression, limits, relaxed, cancel).map(Self::Tar)
            }
        }
    }

    /// Validated members in archive order.
    #[must_use]
    pub fn members(&self) -> &[MemberEntry] {
        match self {
            Self::Zip(archive) => archive.members(),
            Self::Tar(archive) => archive.members(),
        }
    }

    /// Sum of the declared member sizes.
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        match self {
            Self::Zip(archive) => archive.total_size(),
            Self::Tar(archive) => archive.total_size(),
        }
    }

    /// Whether the archive carries a `META-INF` signature pair.
    ///
    /// Tar archives are never signed.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        match self {
            Self::Zip(archive) => archive.is_signed(),
            Self::Tar(_) => false,
        }
    }

    /// Read one member without extracting the archive.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::MemberNotFound`] for unknown names and
    /// [`ArchiveError::Corrupt`] or [`ArchiveError::SizeMismatch`] when the
    /// stored data disagrees with the directory.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        match self {
            Self::Zip(archive) => archive.read(name),
            Self::Tar(archive) => archive.read(name),
        }
    }

    /// Extract every member under `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] on corrupt data, size mismatches, paths that
    /// resolve outside `destination`, or local I/O failures.
    pub fn extract_to(&mut self, destination: &Path) -> Result<(), ArchiveError> {
        self.extract_to_with(destination, &CancelToken::new())
    }

    /// As [`Self::extract_to`], checking `cancel` before each member.
    ///
    /// Files already written when cancellation is observed are left in
    /// place for the caller to remove.
    ///
    /// # Errors
    ///
    /// As [`Self::extract_to`], plus [`ArchiveError::Cancelled`].
    pub fn extract_to_with(
        &mut self,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ArchiveError> {
        match self {
            Self::Zip(archive) => archive.extract_to_with(destination, cancel),
            Self::Tar(archive) => archive.extract_to_with(destination, cancel),
        }
    }
}

/// Tracks the running total of declared sizes during open.
#[derive(Debug)]
pub(crate) struct SizeBudget {
    total: u64,
    limit: u64,
}

impl SizeBudget {
    pub(crate) const fn new(limits: &ArchiveLimits) -> Self {
        Self {
            total: 0,
            limit: limits.max_total_size,
        }
    }

    pub(crate) fn charge(&mut self, size: u64) -> Result<(), ArchiveError> {
        self.total = self.total.saturating_add(size);
        if self.total >= self.limit {
            return Err(ArchiveError::ArchiveTooLarge {
                total: self.total,
                limit: self.limit,
            });
        }
        Ok(())
    }

    pub(crate) const fn total(&self) -> u64 {
        self.total
    }
}

/// Resolve `name` under `destination` without letting it escape.
///
/// `..` may only pop components the name itself pushed; absolute names and
/// drive prefixes are refused outright.
pub(crate) fn contained_path(destination: &Path, name: &str) -> Result<PathBuf, ArchiveError> {
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir if relative.pop() => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::InvalidFilename {
                    name: name.to_owned(),
                });
            }
        }
    }
    Ok(destination.join(relative))
}

/// Write one member to disk, creating parent directories first.
pub(crate) fn write_member(
    destination: &Path,
    entry: &MemberEntry,
    reader: &mut dyn Read,
) -> Result<(), ArchiveError> {
    let target = contained_path(destination, &entry.name)?;
    if entry.is_dir {
        fs::create_dir_all(&target)?;
        return Ok(());
    }
    if target == destination {
        return Err(ArchiveError::InvalidFilename {
            name: entry.name.clone(),
        });
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::File::create(&target)?;
    copy_capped(reader, &mut file, entry.size)?;
    file.flush()?;
    drop(file);

    let actual = fs::metadata(&target)?.len();
    if actual != entry.size {
        return Err(ArchiveError::SizeMismatch {
            name: entry.name.clone(),
            declared: entry.size,
            actual,
        });
    }
    Ok(())
}

/// Read a member fully into memory, refusing to exceed its declared size.
pub(crate) fn read_member(
    entry: &MemberEntry,
    reader: &mut dyn Read,
) -> Result<Vec<u8>, ArchiveError> {
    let mut buffer = Vec::new();
    let actual = copy_capped(reader, &mut buffer, entry.size)?;
    if actual != entry.size {
        return Err(ArchiveError::SizeMismatch {
            name: entry.name.clone(),
            declared: entry.size,
            actual,
        });
    }
    Ok(buffer)
}

/// Copy at most `declared + 1` bytes so an overlong member is detected
/// without reading all of it. Read failures mean corrupt input; write
/// failures are local I/O errors.
fn copy_capped(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    declared: u64,
) -> Result<u64, ArchiveError> {
    let mut limited = reader.take(declared.saturating_add(1));
    let mut chunk = vec![0_u8; COPY_CHUNK];
    let mut copied: u64 = 0;
    loop {
        let read = limited.read(&mut chunk).map_err(ArchiveError::corrupt)?;
        let Some(filled) = chunk.get(..read) else {
            break;
        };
        if filled.is_empty() {
            break;
        }
        writer.write_all(filled)?;
        copied = copied.saturating_add(filled.len() as u64);
    }
    Ok(copied)
}
