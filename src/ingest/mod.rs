//! The ingestion entry points external callers use.
//!
//! A call is strictly sequential: detect the container, convert a CRX into a
//! temporary zip, open and validate the archive, read `manifest.json`, check
//! its fields, then resolve compatibility. Every failure is returned as an
//! [`IngestError`]; nothing is swallowed.

mod checks;
mod expand;
mod metadata;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::NamedTempFile;

pub use checks::{CheckError, MAX_GUID_LENGTH, MAX_VERSION_LENGTH, check_guid, check_version};
pub use expand::{MAX_EXPANSION_ROUNDS, NESTED_ARCHIVE_SUFFIXES};
pub use metadata::PackageMetadata;

use crate::archive::{ArchiveError, ArchiveFormat, CancelToken, SafeArchive, TarCompression};
use crate::compat::{AppVersionCatalogue, CompatibilityResolver};
use crate::config::IngestConfig;
use crate::crx;
use crate::digest::Sha256Digest;
use crate::error::IngestError;
use crate::lock::{LockOutcome, with_lock};
use crate::manifest::{AddonType, ManifestDocument};
use crate::messages::sanitise_for_display;

/// Name of the manifest member at the archive root.
pub const MANIFEST_NAME: &str = "manifest.json";

/// Container format of an upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageKind {
    /// `.zip`, `.xpi`, or `.jar`.
    Zip,
    /// `.tar.gz`, `.tgz`, or `.tar.bz2`; plain tar only as an explicit kind.
    Tar(TarCompression),
    /// A CRX container wrapping a zip.
    Crx,
}

impl PackageKind {
    /// Infer the kind from the file name, case-insensitively.
    ///
    /// ```
    /// use std::path::Path;
    /// use addon_ingest::archive::TarCompression;
    /// use addon_ingest::ingest::PackageKind;
    ///
    /// assert_eq!(PackageKind::from_path(Path::new("a.XPI")).unwrap(), PackageKind::Zip);
    /// assert_eq!(
    ///     PackageKind::from_path(Path::new("a.tgz")).unwrap(),
    ///     PackageKind::Tar(TarCompression::Gzip)
    /// );
    /// assert!(PackageKind::from_path(Path::new("a.exe")).is_err());
    /// assert!(PackageKind::from_path(Path::new("a.tar")).is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::UnsupportedFileType`] for any other name.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let suffixes = [
            (".zip", Self::Zip),
            (".xpi", Self::Zip),
            (".jar", Self::Zip),
            (".crx", Self::Crx),
            (".tar.gz", Self::Tar(TarCompression::Gzip)),
            (".tgz", Self::Tar(TarCompression::Gzip)),
            (".tar.bz2", Self::Tar(TarCompression::Bzip2)),
        ];
        suffixes
            .into_iter()
            .find(|(suffix, _)| name.ends_with(suffix))
            .map(|(_, kind)| kind)
            .ok_or_else(|| IngestError::UnsupportedFileType {
                extension: path
                    .extension()
                    .map(|extension| extension.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
    }

    /// Archive format opened after any conversion.
    #[must_use]
    pub const fn archive_format(self) -> ArchiveFormat {
        match self {
            Self::Zip | Self::Crx => ArchiveFormat::Zip,
            Self::Tar(compression) => ArchiveFormat::Tar(compression),
        }
    }
}

/// An upload on disk plus an optional explicit kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageSource {
    path: PathBuf,
    kind: Option<PackageKind>,
}

impl PackageSource {
    /// An upload whose kind follows from its file name.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: None,
        }
    }

    /// Override the kind, for uploads stored under neutral names.
    #[must_use]
    pub const fn with_kind(mut self, kind: PackageKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Location of the upload.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The explicit kind, else the one inferred from the file name.
    ///
    /// # Errors
    ///
    /// See [`PackageKind::from_path`].
    pub fn kind(&self) -> Result<PackageKind, IngestError> {
        self.kind.map_or_else(|| PackageKind::from_path(&self.path), Ok)
    }
}

/// Ids already owned by other add-ons.
#[cfg_attr(test, mockall::automock)]
pub trait GuidRegistry {
    /// Whether `guid` belongs to an existing add-on.
    fn contains_guid(&self, guid: &str) -> bool;
}

impl GuidRegistry for std::collections::BTreeSet<String> {
    fn contains_guid(&self, guid: &str) -> bool {
        self.contains(guid)
    }
}

/// The add-on an upload is a new version of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExistingAddon {
    /// Its id, if it has one.
    pub guid: Option<String>,
    /// Its type; updates may not change it.
    pub addon_type: AddonType,
    /// Its locale, for dictionaries and language packs.
    pub target_locale: Option<String>,
}

/// A validated archive plus what conversion produced along the way.
struct OpenedPackage {
    archive: SafeArchive,
    crx_sha256: Option<Sha256Digest>,
    // Keeps the converted CRX payload alive while the archive reads it.
    _payload: Option<NamedTempFile>,
}

/// Runs ingestion with explicit configuration and catalogue data.
pub struct PackageIngestor<'a> {
    config: &'a IngestConfig,
    catalogue: &'a AppVersionCatalogue,
    registry: Option<&'a dyn GuidRegistry>,
    existing: Option<ExistingAddon>,
    cancel: CancelToken,
    expand_nested: bool,
}

impl<'a> PackageIngestor<'a> {
    /// An ingestor for new add-ons with no duplicate-id check.
    #[must_use]
    pub fn new(config: &'a IngestConfig, catalogue: &'a AppVersionCatalogue) -> Self {
        Self {
            config,
            catalogue,
            registry: None,
            existing: None,
            cancel: CancelToken::new(),
            expand_nested: false,
        }
    }

    /// Reject new add-ons whose id is already in `registry`.
    #[must_use]
    pub const fn with_registry(mut self, registry: &'a dyn GuidRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Treat uploads as new versions of `existing`.
    #[must_use]
    pub fn updating(mut self, existing: ExistingAddon) -> Self {
        self.existing = Some(existing);
        self
    }

    /// Observe `cancel` between steps and before each archive member.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// After extraction, replace nested `.jar`, `.xpi`, `.zip` and `.crx`
    /// members with directories of their contents.
    ///
    /// Nested archives get the same validation and limits as the upload;
    /// those that fail validation are left as files.
    #[must_use]
    pub const fn expanding_nested_archives(mut self) -> Self {
        self.expand_nested = true;
        self
    }

    /// Parse an upload into its metadata record.
    ///
    /// # Errors
    ///
    /// Returns the [`IngestError`] of the first step that fails.
    pub fn parse_package(&self, source: &PackageSource) -> Result<PackageMetadata, IngestError> {
        self.parse_inner(source)
            .inspect(|metadata| {
                info!(
                    target: "ingest",
                    "parsed {} version {}",
                    metadata.declared_type.as_str(),
                    metadata.version_string
                );
            })
            .inspect_err(|error| reject(source, error))
    }

    /// Open, validate, and extract an upload under `destination`.
    ///
    /// # Errors
    ///
    /// Returns the [`IngestError`] of the first step that fails. Files
    /// written before a failure are left for the caller to remove.
    pub fn extract_package(
        &self,
        source: &PackageSource,
        destination: &Path,
    ) -> Result<(), IngestError> {
        self.extract_inner(source, destination)
            .inspect_err(|error| reject(source, error))
    }

    /// As [`Self::extract_package`], holding the `upload_id` lock in
    /// `lock_dir` for the duration.
    ///
    /// Returns `Ok(false)` without touching `destination` when the lock is
    /// still held by someone else after the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Lock`] when the lock file cannot be used, and
    /// any error of [`Self::extract_package`].
    pub fn extract_package_locked(
        &self,
        source: &PackageSource,
        destination: &Path,
        lock_dir: &Path,
        upload_id: &str,
    ) -> Result<bool, IngestError> {
        let outcome = with_lock(lock_dir, upload_id, self.config.lock_timeout(), || {
            self.extract_package(source, destination)
        })?;
        match outcome {
            LockOutcome::Acquired(result) => result.map(|()| true),
            LockOutcome::NotAcquired => {
                warn!(target: "ingest", "lock {upload_id} not acquired; extraction skipped");
                Ok(false)
            }
        }
    }

    fn parse_inner(&self, source: &PackageSource) -> Result<PackageMetadata, IngestError> {
        let kind = source.kind()?;
        let mut opened = self.open(source, kind)?;
        self.cancel.check()?;

        let bytes = match opened.archive.read(MANIFEST_NAME) {
            Ok(bytes) => bytes,
            Err(ArchiveError::MemberNotFound { .. }) => return Err(IngestError::NoManifestFound),
            Err(error) => return Err(error.into()),
        };
        let manifest = ManifestDocument::parse(&bytes)?;
        self.cancel.check()?;

        let version = check_version(manifest.version())?;
        let guid = checks::check_identity(&manifest, self.existing.as_ref(), self.registry)?;
        let compatibility =
            CompatibilityResolver::new(&self.config.compat, self.catalogue).resolve(&manifest)?;

        let mut metadata = PackageMetadata::from_manifest(&manifest, guid, version, compatibility);
        metadata.is_signed = opened.archive.is_signed();
        metadata.crx_sha256 = opened.crx_sha256.take();
        Ok(metadata)
    }

    fn extract_inner(&self, source: &PackageSource, destination: &Path) -> Result<(), IngestError> {
        let kind = source.kind()?;
        let mut opened = self.open(source, kind)?;
        opened.archive.extract_to_with(destination, &self.cancel)?;
        info!(
            target: "ingest",
            "extracted {} members to {}",
            opened.archive.members().len(),
            destination.display()
        );
        if self.expand_nested {
            let expander = expand::Expander {
                limits: &self.config.limits,
                relaxed: self.config.relaxed_filenames,
                cancel: &self.cancel,
            };
            let expanded = expander.expand(destination)?;
            debug!(target: "ingest", "expanded {expanded} nested archives");
        }
        Ok(())
    }

    fn open(
        &self,
        source: &PackageSource,
        kind: PackageKind,
    ) -> Result<OpenedPackage, IngestError> {
        let limits = &self.config.limits;
        let relaxed = self.config.relaxed_filenames;
        if kind != PackageKind::Crx {
            let archive = SafeArchive::open_with(
                source.path(),
                kind.archive_format(),
                limits,
                relaxed,
                &self.cancel,
            )?;
            return Ok(OpenedPackage {
                archive,
                crx_sha256: None,
                _payload: None,
            });
        }

        let payload = NamedTempFile::new()?;
        let reader = BufReader::new(File::open(source.path())?);
        let digest = crx::convert(reader, BufWriter::new(payload.as_file()))?;
        self.cancel.check()?;
        let archive = SafeArchive::open_with(
            payload.path(),
            ArchiveFormat::Zip,
            limits,
            relaxed,
            &self.cancel,
        )?;
        Ok(OpenedPackage {
            archive,
            crx_sha256: Some(digest),
            _payload: Some(payload),
        })
    }
}

fn reject(source: &PackageSource, error: &IngestError) {
    warn!(
        target: "ingest",
        "rejected {} ({}): {}",
        source.path().display(),
        error.kind().as_str(),
        sanitise_for_display(&error.to_string())
    );
}
