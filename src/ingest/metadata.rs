//! The normalised record handed to the persistence layer.

use serde::Serialize;

use crate::compat::AppCompatibilityRange;
use crate::digest::Sha256Digest;
use crate::manifest::{AddonType, ManifestDocument};

/// Everything downstream code needs to create a version record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageMetadata {
    /// Effective add-on id; inherited from the existing add-on on updates
    /// that omit it.
    pub guid: Option<String>,
    /// Declared package type.
    pub declared_type: AddonType,
    /// Validated version string.
    pub version_string: String,
    /// `name`, possibly a `__MSG_*__` placeholder.
    pub name: Option<String>,
    /// `description`, possibly a placeholder.
    pub summary: Option<String>,
    /// `developer.url` or `homepage_url`.
    pub homepage: Option<String>,
    /// `default_locale`.
    pub default_locale: Option<String>,
    /// Manifest schema generation.
    pub manifest_version: u8,
    /// One range per targeted runtime.
    pub compatibility: Vec<AppCompatibilityRange>,
    /// Whether the package is locked to its declared versions.
    pub is_strict_compatibility: bool,
    /// Whether the manifest carries a mobile-specific settings block.
    pub explicitly_compatible_with_mobile: bool,
    /// Locale of a dictionary or language pack.
    pub target_locale: Option<String>,
    /// Declared API permissions.
    pub permissions: Vec<String>,
    /// Declared optional permissions.
    pub optional_permissions: Vec<String>,
    /// Declared host permissions.
    pub host_permissions: Vec<String>,
    /// Content script match patterns.
    pub content_scripts: Vec<String>,
    /// Origins allowed to trigger installation.
    pub install_origins: Vec<String>,
    /// Whether the package declares experiment APIs.
    pub is_experiment: bool,
    /// Whether the archive already carries a signature.
    pub is_signed: bool,
    /// Digest of the zip payload, for CRX uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crx_sha256: Option<Sha256Digest>,
}

impl PackageMetadata {
    pub(super) fn from_manifest(
        manifest: &ManifestDocument,
        guid: Option<String>,
        version_string: String,
        compatibility: Vec<AppCompatibilityRange>,
    ) -> Self {
        Self {
            guid,
            declared_type: manifest.declared_type(),
            version_string,
            name: manifest.name(),
            summary: manifest.summary(),
            homepage: manifest.homepage(),
            default_locale: manifest.default_locale(),
            manifest_version: manifest.manifest_version(),
            compatibility,
            is_strict_compatibility: manifest.is_strict_compatibility(),
            explicitly_compatible_with_mobile: manifest.gecko_android().is_some(),
            target_locale: manifest.target_locale(),
            permissions: manifest.permissions(),
            optional_permissions: manifest.optional_permissions(),
            host_permissions: manifest.host_permissions(),
            content_scripts: manifest.content_scripts(),
            install_origins: manifest.install_origins(),
            is_experiment: manifest.is_experiment(),
            is_signed: false,
            crx_sha256: None,
        }
    }
}
