//! Ingestion core for untrusted browser add-on packages.
//!
//! The crate takes a user-uploaded XPI/zip, tar, or CRX file, validates and
//! extracts it safely, parses `manifest.json`, and resolves per-runtime
//! compatibility ranges into a [`PackageMetadata`] record. Configuration and
//! the catalogue of known application versions are passed into every call;
//! the crate keeps no global state.
//!
//! ```no_run
//! use addon_ingest::{AppVersionCatalogue, IngestConfig, PackageIngestor, PackageSource};
//!
//! let config = IngestConfig::default();
//! let catalogue = AppVersionCatalogue::from_json_str(r#"{"versions": []}"#)?;
//! let ingestor = PackageIngestor::new(&config, &catalogue);
//! match ingestor.parse_package(&PackageSource::new("upload.xpi")) {
//!     Ok(metadata) => println!("{:?}", metadata.guid),
//!     Err(error) => eprintln!("rejected: {}", error.kind().as_str()),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod archive;
pub mod compat;
pub mod config;
pub mod crx;
pub mod digest;
pub mod error;
pub mod ingest;
pub mod lock;
pub mod manifest;
pub mod messages;

pub use archive::{ArchiveError, ArchiveFormat, ArchiveLimits, CancelToken, SafeArchive};
pub use compat::{
    AppCompatibilityRange, AppVersionCatalogue, AppVersionRef, Application, CompatError,
    CompatibilityDefaults, CompatibilityResolver, Origin,
};
pub use config::{ConfigError, IngestConfig};
pub use crx::CrxError;
pub use digest::Sha256Digest;
pub use error::{ErrorKind, IngestError};
pub use ingest::{
    ExistingAddon, GuidRegistry, PackageIngestor, PackageKind, PackageMetadata, PackageSource,
};
pub use lock::{AdvisoryLock, LockError, LockGuard, LockOutcome, with_lock};
pub use manifest::{AddonType, ManifestDocument, ManifestError};
pub use messages::{sanitise_for_display, user_message};
