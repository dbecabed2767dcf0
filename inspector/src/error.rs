//! Error types for the inspector CLI.
//!
//! Rejections of the upload are kept apart from local failures so the
//! binary can report them with different exit codes.

use std::io;

use addon_ingest::compat::CatalogueError;
use addon_ingest::{ConfigError, IngestError};
use camino::Utf8PathBuf;
use thiserror::Error;

/// Exit status for an accepted upload.
pub const EXIT_ACCEPTED: i32 = 0;
/// Exit status for local failures.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status for a rejected upload.
pub const EXIT_REJECTED: i32 = 2;

/// Errors that can end an inspection.
#[derive(Debug, Error)]
pub enum InspectError {
    /// A file named on the command line could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The configuration file is invalid.
    #[error("invalid configuration in {path}: {source}")]
    Config {
        /// Configuration file.
        path: Utf8PathBuf,
        /// Parse or validation failure.
        source: ConfigError,
    },

    /// The version catalogue is invalid.
    #[error("invalid version catalogue in {path}: {source}")]
    Catalogue {
        /// Catalogue file.
        path: Utf8PathBuf,
        /// Decode failure.
        source: CatalogueError,
    },

    /// Ingestion failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Another process holds the extraction lock.
    #[error("extraction lock {upload_id} is held by another process")]
    LockBusy {
        /// Lock name that could not be taken.
        upload_id: String,
    },

    /// The metadata could not be rendered.
    #[error("failed to render metadata: {0}")]
    Render(#[from] serde_json::Error),

    /// Writing the report failed.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl InspectError {
    /// Process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Ingest(error) if error.kind().is_uploader_error() => EXIT_REJECTED,
            _ => EXIT_FAILURE,
        }
    }
}
