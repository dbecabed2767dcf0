//! Validation of a single archive member before any byte reaches disk.
//!
//! The checks run in a fixed order so that the first failing rule decides the
//! error a caller sees: compression method, presence of name and size, name
//! encoding, path shape, then the per-file size ceiling.

use log::debug;

use super::ArchiveError;
use crate::messages::sanitise_for_display;

/// Compression method recorded for an archive member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberCompression {
    /// Stored without compression.
    Stored,
    /// Raw deflate.
    Deflate,
    /// Any other method, keyed by its numeric id.
    Other(u16),
}

impl MemberCompression {
    /// Numeric method id as used by the zip format.
    #[must_use]
    pub const fn method(self) -> u16 {
        match self {
            Self::Stored => 0,
            Self::Deflate => 8,
            Self::Other(method) => method,
        }
    }
}

/// One entry read from an archive directory, before validation.
///
/// Every field is optional or raw because the values come straight from
/// untrusted input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveMember {
    /// Raw name bytes as stored in the archive.
    pub name: Option<Vec<u8>>,
    /// Declared uncompressed size.
    pub uncompressed_size: Option<u64>,
    /// Declared compression method.
    pub compression: MemberCompression,
}

impl ArchiveMember {
    /// Convenience constructor for a fully described member.
    #[must_use]
    pub fn new(
        name: impl Into<Vec<u8>>,
        uncompressed_size: u64,
        compression: MemberCompression,
    ) -> Self {
        Self {
            name: Some(name.into()),
            uncompressed_size: Some(uncompressed_size),
            compression,
        }
    }
}

/// Rules applied by [`validate_member`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberRules {
    /// Largest permitted uncompressed size of a single member.
    pub max_member_size: u64,
    /// Skip the path-shape checks; only for already-trusted re-extraction.
    pub relaxed: bool,
}

/// Validate one member and return its decoded name.
///
/// ```
/// use addon_ingest::archive::{ArchiveMember, MemberCompression, MemberRules, validate_member};
///
/// let rules = MemberRules { max_member_size: 1024, relaxed: false };
/// let icon = ArchiveMember::new("icons/foo..svg", 10, MemberCompression::Deflate);
/// assert_eq!(validate_member(&icon, &rules).ok().as_deref(), Some("icons/foo..svg"));
///
/// let escape = ArchiveMember::new("../../etc/passwd", 10, MemberCompression::Stored);
/// assert!(validate_member(&escape, &rules).is_err());
/// ```
///
/// # Errors
///
/// Returns the [`ArchiveError`] for the first rule the member breaks.
pub fn validate_member(
    member: &ArchiveMember,
    rules: &MemberRules,
) -> Result<String, ArchiveError> {
    if let MemberCompression::Other(method) = member.compression {
        return Err(ArchiveError::UnsupportedCompression { method });
    }

    let (Some(raw_name), Some(size)) = (member.name.as_deref(), member.uncompressed_size) else {
        return Err(ArchiveError::MissingMemberInfo);
    };

    let name = std::str::from_utf8(raw_name)
        .map_err(|_| ArchiveError::InvalidFilenameEncoding)?
        .to_owned();

    if !rules.relaxed && is_unsafe_name(&name) {
        return Err(ArchiveError::InvalidFilename { name });
    }

    if size > rules.max_member_size {
        return Err(ArchiveError::MemberTooLarge {
            name,
            size,
            limit: rules.max_member_size,
        });
    }

    debug!(
        target: "archive::member",
        "accepted member {} ({size} bytes)",
        sanitise_for_display(&name)
    );
    Ok(name)
}

/// The literal sequence `../` is required; `foo..svg` is a legitimate name.
fn is_unsafe_name(name: &str) -> bool {
    name.contains('\\') || name.contains("../") || name == ".." || name.starts_with('/')
}
