//! Errors raised while opening, validating or extracting archives.
//!
//! Member names carried by these variants are attacker-controlled; render
//! them through `messages::sanitise_for_display` before showing them to a
//! person.

use std::io;

use thiserror::Error;

/// Errors that can occur while handling an untrusted archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The container could not be parsed (bad magic, truncated directory).
    #[error("archive is corrupt or not in the expected format")]
    Corrupt {
        /// Raw parser error, kept for diagnostics only.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A member uses a compression method other than stored or deflate.
    #[error("member uses unsupported compression method {method}")]
    UnsupportedCompression {
        /// Numeric compression method from the directory entry.
        method: u16,
    },

    /// A member lacks a name or a declared size.
    #[error("member is missing its name or size")]
    MissingMemberInfo,

    /// A member name is not valid UTF-8.
    #[error("member name is not valid UTF-8")]
    InvalidFilenameEncoding,

    /// A member name could escape the extraction directory.
    #[error("invalid member name {name:?}")]
    InvalidFilename {
        /// Decoded member name.
        name: String,
    },

    /// A single member exceeds the per-file ceiling.
    #[error("member {name:?} is {size} bytes, above the {limit} byte limit")]
    MemberTooLarge {
        /// Decoded member name.
        name: String,
        /// Declared uncompressed size.
        size: u64,
        /// Configured per-file ceiling.
        limit: u64,
    },

    /// The declared total size meets or exceeds the archive ceiling.
    #[error("archive expands to {total} bytes, at or above the {limit} byte limit")]
    ArchiveTooLarge {
        /// Sum of declared member sizes (saturating).
        total: u64,
        /// Configured archive ceiling.
        limit: u64,
    },

    /// A tar member is a link, device, or FIFO.
    #[error("member {name:?} is a link or special file")]
    ForbiddenSpecialFile {
        /// Decoded member name.
        name: String,
    },

    /// A tar member has a type that is neither a file nor a directory.
    #[error("member {name:?} has unsupported entry type {entry_type}")]
    UnsupportedMemberType {
        /// Decoded member name.
        name: String,
        /// Raw tar type flag.
        entry_type: u8,
    },

    /// The bytes written for a member differ from its declared size.
    #[error("member {name:?} declared {declared} bytes but produced {actual}")]
    SizeMismatch {
        /// Decoded member name.
        name: String,
        /// Size recorded in the archive directory.
        declared: u64,
        /// Size observed after writing.
        actual: u64,
    },

    /// A named member is not present in the validated member list.
    #[error("member {name:?} not found in archive")]
    MemberNotFound {
        /// Requested member name.
        name: String,
    },

    /// The caller cancelled the operation between members.
    #[error("archive operation cancelled")]
    Cancelled,

    /// Local filesystem failure while extracting.
    #[error("archive I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    pub(crate) fn corrupt(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Corrupt {
            source: Box::new(source),
        }
    }
}
