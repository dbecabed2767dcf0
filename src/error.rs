//! The aggregate ingestion error and its stable kinds.

use std::io;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::compat::CompatError;
use crate::crx::CrxError;
use crate::ingest::CheckError;
use crate::lock::LockError;
use crate::manifest::{AddonType, ManifestError};

/// Why a package was rejected or could not be processed.
///
/// Display text is for logs and diagnostics only. It may quote
/// attacker-controlled text; use [`crate::messages::user_message`] for
/// anything shown to the uploader.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file extension (or caller hint) names no supported container.
    #[error("unsupported package file type {extension:?}")]
    UnsupportedFileType {
        /// The unrecognised extension, empty when the path has none.
        extension: String,
    },

    /// The container failed a safety check or could not be decoded.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The CRX header could not be converted.
    #[error(transparent)]
    Crx(#[from] CrxError),

    /// The archive has no `manifest.json` at its root.
    #[error("package has no manifest.json")]
    NoManifestFound,

    /// `manifest.json` could not be parsed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// `manifest.json` parsed but a field failed validation.
    #[error(transparent)]
    Check(#[from] CheckError),

    /// Compatibility could not be resolved.
    #[error(transparent)]
    Compat(#[from] CompatError),

    /// Another add-on already owns the declared id.
    #[error("add-on id {guid:?} is already in use")]
    DuplicateAddonId {
        /// The conflicting id.
        guid: String,
    },

    /// An update declares a different id than the add-on it updates.
    #[error("manifest id {found:?} does not match add-on id {expected:?}")]
    GuidMismatch {
        /// Id declared by the upload.
        found: String,
        /// Id of the existing add-on.
        expected: String,
    },

    /// An update declares a different type than the add-on it updates.
    #[error("manifest type {} does not match add-on type {}", found.as_str(), expected.as_str())]
    TypeMismatch {
        /// Type declared by the upload.
        found: AddonType,
        /// Type of the existing add-on.
        expected: AddonType,
    },

    /// An update to a dictionary or language pack targets another locale.
    #[error("manifest locale {found:?} does not match add-on locale {expected:?}")]
    LocaleMismatch {
        /// Locale declared by the upload.
        found: String,
        /// Locale of the existing add-on.
        expected: String,
    },

    /// The extraction lock could not be taken.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// A local file operation failed.
    #[error("ingestion I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Stable identifiers for each class of failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`IngestError::UnsupportedFileType`].
    UnsupportedFileType,
    /// Unsafe, oversized, or undecodable archive.
    InvalidArchiveFile,
    /// See [`IngestError::NoManifestFound`].
    NoManifestFound,
    /// Unparsable or invalid manifest.
    InvalidManifest,
    /// The CRX declares a version other than 2 or 3.
    UnsupportedCrxVersion,
    /// The CRX header is malformed.
    CorruptCrx,
    /// See [`IngestError::Compat`].
    CompatError,
    /// See [`IngestError::DuplicateAddonId`].
    DuplicateAddonId,
    /// See [`IngestError::GuidMismatch`].
    GuidMismatch,
    /// See [`IngestError::TypeMismatch`].
    TypeMismatch,
    /// See [`IngestError::LocaleMismatch`].
    LocaleMismatch,
    /// The caller cancelled the operation.
    Cancelled,
    /// See [`IngestError::Lock`].
    LockFailed,
    /// A local failure unrelated to the upload's content.
    Io,
}

impl ErrorKind {
    /// Stable identifier suitable for logs and message catalogues.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedFileType => "unsupported-file-type",
            Self::InvalidArchiveFile => "invalid-archive-file",
            Self::NoManifestFound => "no-manifest-found",
            Self::InvalidManifest => "invalid-manifest",
            Self::UnsupportedCrxVersion => "unsupported-crx-version",
            Self::CorruptCrx => "corrupt-crx",
            Self::CompatError => "compat-error",
            Self::DuplicateAddonId => "duplicate-addon-id",
            Self::GuidMismatch => "guid-mismatch",
            Self::TypeMismatch => "type-mismatch",
            Self::LocaleMismatch => "locale-mismatch",
            Self::Cancelled => "cancelled",
            Self::LockFailed => "lock-failed",
            Self::Io => "io",
        }
    }

    /// Whether the upload itself is at fault, as opposed to the host.
    #[must_use]
    pub const fn is_uploader_error(self) -> bool {
        !matches!(self, Self::Cancelled | Self::LockFailed | Self::Io)
    }
}

impl IngestError {
    /// Stable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFileType { .. } => ErrorKind::UnsupportedFileType,
            Self::Archive(ArchiveError::Cancelled) => ErrorKind::Cancelled,
            Self::Archive(ArchiveError::Io(_)) | Self::Crx(CrxError::Io(_)) | Self::Io(_) => {
                ErrorKind::Io
            }
            Self::Archive(_) => ErrorKind::InvalidArchiveFile,
            Self::Crx(CrxError::CorruptCrx { .. }) => ErrorKind::CorruptCrx,
            Self::Crx(CrxError::UnsupportedCrxVersion { .. }) => ErrorKind::UnsupportedCrxVersion,
            Self::NoManifestFound => ErrorKind::NoManifestFound,
            Self::Manifest(_) | Self::Check(_) => ErrorKind::InvalidManifest,
            Self::Compat(_) => ErrorKind::CompatError,
            Self::DuplicateAddonId { .. } => ErrorKind::DuplicateAddonId,
            Self::GuidMismatch { .. } => ErrorKind::GuidMismatch,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::LocaleMismatch { .. } => ErrorKind::LocaleMismatch,
            Self::Lock(_) => ErrorKind::LockFailed,
        }
    }

    /// Whether the caller may retry the original bytes as a plain zip.
    ///
    /// Only a malformed CRX header qualifies; some such uploads are zips
    /// with the wrong extension. A recognised but unsupported CRX version
    /// never does.
    #[must_use]
    pub const fn allows_zip_fallback(&self) -> bool {
        matches!(self, Self::Crx(CrxError::CorruptCrx { .. }))
    }
}
