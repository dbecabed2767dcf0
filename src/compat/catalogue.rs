//! The caller-supplied table of known application versions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Application;

/// One known application version.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppVersionRef {
    /// Runtime the version belongs to.
    pub application: Application,
    /// Identifier of the record in the caller's store.
    pub id: u64,
    /// Version text exactly as the application reports it.
    pub version: String,
}

impl AppVersionRef {
    /// Build a reference.
    #[must_use]
    pub fn new(application: Application, id: u64, version: impl Into<String>) -> Self {
        Self {
            application,
            id,
            version: version.into(),
        }
    }
}

/// Errors raised while loading a catalogue document.
#[derive(Debug, Error)]
pub enum CatalogueError {
    /// The JSON document could not be decoded.
    #[error("failed to parse version catalogue JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The TOML document could not be decoded.
    #[error("failed to parse version catalogue TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Known versions for every runtime.
///
/// Lookups are exact string matches: `60.0` and `60` are different records.
///
/// ```
/// use addon_ingest::compat::{AppVersionCatalogue, Application};
///
/// let catalogue = AppVersionCatalogue::from_toml_str(r#"
///     [[versions]]
///     application = "desktop"
///     id = 1
///     version = "42.0"
/// "#).unwrap();
/// assert!(catalogue.find(Application::Desktop, "42.0").is_some());
/// assert!(catalogue.find(Application::Desktop, "42").is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppVersionCatalogue {
    versions: Vec<AppVersionRef>,
}

impl AppVersionCatalogue {
    /// Wrap a list of records.
    #[must_use]
    pub const fn new(versions: Vec<AppVersionRef>) -> Self {
        Self { versions }
    }

    /// Decode a `{"versions": [...]}` JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogueError::Json`] when the document is malformed.
    pub fn from_json_str(input: &str) -> Result<Self, CatalogueError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Decode a TOML document of `[[versions]]` tables.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogueError::Toml`] when the document is malformed.
    pub fn from_toml_str(input: &str) -> Result<Self, CatalogueError> {
        Ok(toml::from_str(input)?)
    }

    /// Record for `version` of `application`, if known.
    #[must_use]
    pub fn find(&self, application: Application, version: &str) -> Option<&AppVersionRef> {
        self.versions
            .iter()
            .find(|record| record.application == application && record.version == version)
    }

    /// All records.
    #[must_use]
    pub fn versions(&self) -> &[AppVersionRef] {
        &self.versions
    }
}

impl FromIterator<AppVersionRef> for AppVersionCatalogue {
    fn from_iter<I: IntoIterator<Item = AppVersionRef>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
