//! Field checks applied to a parsed manifest before it is accepted.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::{ExistingAddon, GuidRegistry};
use crate::error::IngestError;
use crate::manifest::{AddonType, ManifestDocument};

/// Longest accepted add-on id.
pub const MAX_GUID_LENGTH: usize = 64;

/// Longest accepted version string.
pub const MAX_VERSION_LENGTH: usize = 32;

static GUID_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(\{[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\}",
        r"|[a-z0-9\-._]*@[a-z0-9\-._]+)$",
    ))
    .ok()
});

static VERSION_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_+*.\-]+$").ok());

/// A manifest field that parsed but is not acceptable.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CheckError {
    /// `version` is absent.
    #[error("manifest has no version")]
    MissingVersion,

    /// `version` is too long or uses characters outside `[A-Za-z0-9_+*.-]`.
    #[error("invalid version {version:?}")]
    InvalidVersion {
        /// The declared version.
        version: String,
    },

    /// The id is neither a braced UUID nor an email-like identifier.
    #[error("invalid add-on id {guid:?}")]
    InvalidGuid {
        /// The declared id.
        guid: String,
    },

    /// The id exceeds [`MAX_GUID_LENGTH`] characters.
    #[error("add-on id is {length} characters long")]
    GuidTooLong {
        /// Length of the declared id in characters.
        length: usize,
    },

    /// A dictionary or language pack does not name its locale.
    #[error("manifest does not declare a target locale")]
    MissingTargetLocale,
}

/// Validate the declared version and return it.
///
/// # Errors
///
/// Returns [`CheckError::MissingVersion`] or [`CheckError::InvalidVersion`].
pub fn check_version(version: Option<String>) -> Result<String, CheckError> {
    let version = version.ok_or(CheckError::MissingVersion)?;
    let well_formed = version.chars().count() <= MAX_VERSION_LENGTH
        && VERSION_PATTERN
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(&version));
    if well_formed {
        Ok(version)
    } else {
        Err(CheckError::InvalidVersion { version })
    }
}

/// Validate a declared add-on id.
///
/// # Errors
///
/// Returns [`CheckError::GuidTooLong`] or [`CheckError::InvalidGuid`].
pub fn check_guid(guid: &str) -> Result<(), CheckError> {
    let length = guid.chars().count();
    if length > MAX_GUID_LENGTH {
        return Err(CheckError::GuidTooLong { length });
    }
    if GUID_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(guid))
    {
        Ok(())
    } else {
        Err(CheckError::InvalidGuid {
            guid: guid.to_owned(),
        })
    }
}

/// Reconcile the manifest's identity with the add-on it updates, or with
/// the registry of ids already taken when it is a new add-on.
///
/// Returns the effective id: an update that omits its id inherits the
/// existing one.
pub(super) fn check_identity(
    manifest: &ManifestDocument,
    existing: Option<&ExistingAddon>,
    registry: Option<&dyn GuidRegistry>,
) -> Result<Option<String>, IngestError> {
    let declared_guid = manifest.guid();
    if let Some(guid) = declared_guid.as_deref() {
        check_guid(guid)?;
    }

    let declared_type = manifest.declared_type();
    let target_locale = manifest.target_locale();
    if matches!(declared_type, AddonType::Dictionary | AddonType::LanguagePack)
        && target_locale.is_none()
    {
        return Err(CheckError::MissingTargetLocale.into());
    }

    let Some(existing) = existing else {
        if let Some(guid) = declared_guid.as_deref()
            && registry.is_some_and(|taken| taken.contains_guid(guid))
        {
            return Err(IngestError::DuplicateAddonId {
                guid: guid.to_owned(),
            });
        }
        return Ok(declared_guid);
    };

    let guid = match (declared_guid, existing.guid.as_deref()) {
        (Some(found), Some(expected)) if found != expected => {
            return Err(IngestError::GuidMismatch {
                found,
                expected: expected.to_owned(),
            });
        }
        (Some(found), _) => Some(found),
        (None, inherited) => inherited.map(str::to_owned),
    };
    if declared_type != existing.addon_type {
        return Err(IngestError::TypeMismatch {
            found: declared_type,
            expected: existing.addon_type,
        });
    }
    if let (Some(found), Some(expected)) = (target_locale, existing.target_locale.as_deref())
        && found != expected
    {
        return Err(IngestError::LocaleMismatch {
            found,
            expected: expected.to_owned(),
        });
    }
    Ok(guid)
}
