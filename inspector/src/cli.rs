//! CLI argument definitions for the add-on inspector.
//!
//! Kept apart from the entrypoint so the binary only orchestrates.

use addon_ingest::PackageKind;
use addon_ingest::archive::TarCompression;
use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};

/// Validate an add-on upload and print its metadata.
#[derive(Parser, Debug, Clone)]
#[command(name = "addon-inspect")]
#[command(version, about)]
#[command(long_about = concat!(
    "Validate an add-on upload and print its metadata.\n\n",
    "The upload is opened with the same checks a hosting service applies to ",
    "untrusted files: member names, sizes and special files are validated ",
    "before anything is read, CRX containers are converted to zip, and the ",
    "manifest's compatibility is resolved against a catalogue of known ",
    "application versions.\n\n",
    "On success the metadata record is printed to stdout as JSON. Rejections ",
    "are reported on stderr in the selected locale.",
))]
#[command(after_help = concat!(
    "EXIT STATUS:\n",
    "  0  the upload was accepted\n",
    "  1  a local failure (unreadable configuration, I/O, lock held)\n",
    "  2  the upload was rejected\n\n",
    "EXAMPLES:\n",
    "  Inspect an XPI:\n",
    "    $ addon-inspect --catalogue versions.json addon.xpi\n\n",
    "  Inspect and extract under a per-upload lock:\n",
    "    $ addon-inspect -c versions.toml -x out/ \\\n",
    "        --lock-dir /run/locks --upload-id 42 addon.crx\n\n",
    "  Extract and unpack bundled jars:\n",
    "    $ addon-inspect -c versions.json -x out/ --expand-nested addon.xpi\n\n",
    "  Report rejections in French:\n",
    "    $ addon-inspect -c versions.json --locale fr upload.zip",
))]
pub struct Cli {
    /// Upload to inspect.
    #[arg(value_name = "PACKAGE")]
    pub package: Utf8PathBuf,

    /// Known application versions, as JSON or (with a `.toml` name) TOML.
    #[arg(short, long, value_name = "FILE")]
    pub catalogue: Utf8PathBuf,

    /// Ingestion configuration file (TOML).
    #[arg(long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Locale for rejection messages; overrides the environment and config.
    #[arg(long, value_name = "TAG")]
    pub locale: Option<String>,

    /// Container format, when the file name does not say.
    #[arg(short, long, value_enum, value_name = "KIND")]
    pub kind: Option<KindArg>,

    /// Treat an add-on id as already taken (can be repeated).
    #[arg(long, value_name = "GUID")]
    pub taken_guid: Vec<String>,

    /// Extract the validated upload into this directory.
    #[arg(short = 'x', long, value_name = "DIR")]
    pub extract_to: Option<Utf8PathBuf>,

    /// Also expand nested `.jar`, `.xpi`, `.zip` and `.crx` members in place.
    #[arg(long, requires = "extract_to")]
    pub expand_nested: bool,

    /// Directory holding per-upload extraction locks.
    #[arg(long, value_name = "DIR", requires_all = ["extract_to", "upload_id"])]
    pub lock_dir: Option<Utf8PathBuf>,

    /// Lock name for this upload.
    #[arg(long, value_name = "ID", requires = "lock_dir")]
    pub upload_id: Option<String>,

    /// Do not retry a malformed CRX as a plain zip.
    #[arg(long)]
    pub no_zip_fallback: bool,

    /// Print the metadata on a single line.
    #[arg(long)]
    pub compact: bool,
}

/// Container formats accepted by `--kind`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Zip, XPI or JAR.
    Zip,
    /// Uncompressed tar, which no file name selects.
    Tar,
    /// Gzip-compressed tar.
    TarGz,
    /// Bzip2-compressed tar.
    TarBz2,
    /// Chrome CRX container.
    Crx,
}

impl From<KindArg> for PackageKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Zip => Self::Zip,
            KindArg::Tar => Self::Tar(TarCompression::None),
            KindArg::TarGz => Self::Tar(TarCompression::Gzip),
            KindArg::TarBz2 => Self::Tar(TarCompression::Bzip2),
            KindArg::Crx => Self::Crx,
        }
    }
}

impl Cli {
    /// The lock to hold during extraction, when both halves are given.
    #[must_use]
    pub fn lock(&self) -> Option<(&Utf8PathBuf, &str)> {
        self.lock_dir.as_ref().zip(self.upload_id.as_deref())
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
