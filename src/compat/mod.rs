//! Per-runtime compatibility ranges derived from a manifest.
//!
//! Each runtime gets a default floor that depends on the package type, the
//! manifest generation, and which settings block the manifest uses. Declared
//! `strict_min_version` values may raise the floor but never lower it;
//! declared maxima are raised to the minimum rather than producing an
//! inverted range. Declared ends must name a version the caller's catalogue
//! knows about; a runtime resolved from defaults alone is dropped when the
//! catalogue lacks its versions.

mod catalogue;
mod defaults;

use std::cmp::Ordering;
use std::fmt;

use addon_ingest_common::compare_versions;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use catalogue::{AppVersionCatalogue, AppVersionRef, CatalogueError};
pub use defaults::CompatibilityDefaults;

use crate::manifest::{AddonType, ManifestDocument};

/// A runtime an add-on can be installed into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Application {
    /// The desktop browser.
    Desktop,
    /// The mobile browser.
    Mobile,
}

impl Application {
    /// Stable identifier, matching the serialised form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of a range a version was resolved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// The minimum version.
    Min,
    /// The maximum version.
    Max,
}

impl Bound {
    /// Stable identifier, matching the serialised form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved range came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The shared gecko block declared a bound.
    Manifest,
    /// A mobile-specific block was present.
    MobileManifestBlock,
    /// Defaults only.
    Automatic,
}

/// Resolved compatibility for one runtime. `min <= max` always holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppCompatibilityRange {
    /// Runtime the range applies to.
    pub application: Application,
    /// Lowest supported version.
    pub min: AppVersionRef,
    /// Highest supported version.
    pub max: AppVersionRef,
    /// Provenance, for the policy layer.
    pub originated_from: Origin,
}

/// Errors raised while resolving compatibility.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompatError {
    /// A resolved bound is missing from the catalogue.
    #[error("unknown {application} version {version:?} for {bound}")]
    UnknownVersion {
        /// Runtime being resolved.
        application: Application,
        /// Which end of the range.
        bound: Bound,
        /// Version text that was looked up.
        version: String,
    },

    /// An id-less extension declares a minimum that predates id-less installs.
    #[error("an add-on id is required for strict_min_version {version:?} (below {no_id})")]
    IdRequired {
        /// The lowest version that installs extensions without an id.
        no_id: String,
        /// The declared minimum.
        version: String,
    },

    /// The declared desktop minimum predates every supported runtime.
    #[error("strict_min_version {version:?} is below the oldest supported version {oldest}")]
    BelowOldestSupported {
        /// The oldest supported version.
        oldest: String,
        /// The declared minimum.
        version: String,
    },
}

/// Resolves compatibility ranges against configured floors and a catalogue.
#[derive(Clone, Copy, Debug)]
pub struct CompatibilityResolver<'a> {
    defaults: &'a CompatibilityDefaults,
    catalogue: &'a AppVersionCatalogue,
}

/// Unresolved inputs for one runtime.
#[derive(Debug)]
struct Plan<'a> {
    application: Application,
    floor: &'a str,
    declared_min: Option<String>,
    declared_max: Option<String>,
    origin: Origin,
}

impl<'a> CompatibilityResolver<'a> {
    /// Build a resolver.
    #[must_use]
    pub const fn new(
        defaults: &'a CompatibilityDefaults,
        catalogue: &'a AppVersionCatalogue,
    ) -> Self {
        Self { defaults, catalogue }
    }

    /// One range per runtime the package targets: desktop, plus mobile for
    /// extensions. A runtime whose bounds all come from defaults is left out
    /// when the catalogue does not list them.
    ///
    /// # Errors
    ///
    /// Returns [`CompatError::IdRequired`] when an extension without an id
    /// declares a minimum below [`CompatibilityDefaults::no_id`],
    /// [`CompatError::BelowOldestSupported`] when the desktop
    /// `strict_min_version` predates [`CompatibilityDefaults::oldest_supported`],
    /// and [`CompatError::UnknownVersion`] when a declared bound, or any bound
    /// of a `gecko_android` range, is missing from the catalogue.
    pub fn resolve(
        &self,
        manifest: &ManifestDocument,
    ) -> Result<Vec<AppCompatibilityRange>, CompatError> {
        let mut plans = vec![self.desktop_plan(manifest)?];
        if manifest.declared_type() == AddonType::Extension {
            plans.push(self.mobile_plan(manifest));
        }
        let mut ranges = Vec::with_capacity(plans.len());
        for plan in plans {
            let origin = plan.origin;
            match self.materialise(plan) {
                Ok(range) => ranges.push(range),
                Err(CompatError::UnknownVersion {
                    application,
                    version,
                    ..
                }) if origin == Origin::Automatic => {
                    info!(
                        target: "compat",
                        "{application} skipped; default version {version} is not in the catalogue"
                    );
                }
                Err(error) => return Err(error),
            }
        }
        for range in &ranges {
            info!(
                target: "compat",
                "{} compatible from {} to {} ({:?})",
                range.application,
                range.min.version,
                range.max.version,
                range.originated_from
            );
        }
        Ok(ranges)
    }

    fn desktop_plan(&self, manifest: &ManifestDocument) -> Result<Plan<'a>, CompatError> {
        let defaults = self.defaults;
        let gecko = manifest.gecko();
        let declared_min = gecko.and_then(|block| block.strict_min_version());
        let declared_max = gecko.and_then(|block| block.strict_max_version());
        let declared_type = manifest.declared_type();

        if let Some(version) = declared_min.as_deref().filter(|version| {
            declared_type == AddonType::Extension
                && manifest.guid().is_none()
                && compare_versions(version, &defaults.no_id) == Ordering::Less
        }) {
            return Err(CompatError::IdRequired {
                no_id: defaults.no_id.clone(),
                version: version.to_owned(),
            });
        }
        if let Some(version) = declared_min.as_deref().filter(|version| {
            compare_versions(version, &defaults.oldest_supported) == Ordering::Less
        }) {
            return Err(CompatError::BelowOldestSupported {
                oldest: defaults.oldest_supported.clone(),
                version: version.to_owned(),
            });
        }

        let type_floor = match declared_type {
            AddonType::Extension => &defaults.desktop_applications,
            AddonType::StaticTheme => &defaults.static_theme_desktop,
            AddonType::Dictionary => &defaults.dictionary_desktop,
            AddonType::LanguagePack => &defaults.language_pack_desktop,
        };
        let mut raised = Vec::new();
        if manifest.uses_browser_specific_settings() {
            raised.push(defaults.desktop_browser_specific.as_str());
        }
        if manifest.manifest_version() >= 3 {
            raised.push(defaults.manifest_v3_desktop.as_str());
        }
        if declared_type == AddonType::Extension
            && manifest.guid().is_none()
            && declared_min.is_none()
        {
            raised.push(defaults.no_id.as_str());
        }

        let origin = if declared_min.is_some() || declared_max.is_some() {
            Origin::Manifest
        } else {
            Origin::Automatic
        };
        Ok(Plan {
            application: Application::Desktop,
            floor: highest(type_floor, &raised),
            declared_min,
            declared_max,
            origin,
        })
    }

    fn mobile_plan(&self, manifest: &ManifestDocument) -> Plan<'a> {
        let defaults = self.defaults;
        let shared = manifest.gecko();
        let android = manifest.gecko_android();
        let shared_min = shared.and_then(|block| block.strict_min_version());
        let shared_max = shared.and_then(|block| block.strict_max_version());

        let mut raised = Vec::new();
        if manifest.manifest_version() >= 3 {
            raised.push(defaults.manifest_v3_mobile.as_str());
        }
        if android.is_some() {
            raised.push(defaults.mobile_gecko_android.as_str());
        }
        if manifest.guid().is_none() && shared_min.is_none() {
            raised.push(defaults.no_id.as_str());
        }

        let origin = if android.is_some() {
            Origin::MobileManifestBlock
        } else if shared_min.is_some() || shared_max.is_some() {
            Origin::Manifest
        } else {
            Origin::Automatic
        };
        Plan {
            application: Application::Mobile,
            floor: highest(&defaults.mobile, &raised),
            declared_min: android
                .and_then(|block| block.strict_min_version())
                .or(shared_min),
            declared_max: android
                .and_then(|block| block.strict_max_version())
                .or(shared_max),
            origin,
        }
    }

    fn materialise(&self, plan: Plan<'_>) -> Result<AppCompatibilityRange, CompatError> {
        let min = match plan.declared_min {
            Some(declared) if compare_versions(&declared, plan.floor) != Ordering::Less => {
                declared
            }
            Some(declared) => {
                debug!(
                    target: "compat",
                    "{} strict_min_version {declared} raised to {}",
                    plan.application,
                    plan.floor
                );
                plan.floor.to_owned()
            }
            None => plan.floor.to_owned(),
        };
        let declared_max = plan
            .declared_max
            .unwrap_or_else(|| self.defaults.default_max.clone());
        let max = if compare_versions(&declared_max, &min) == Ordering::Less {
            min.clone()
        } else {
            declared_max
        };

        Ok(AppCompatibilityRange {
            application: plan.application,
            min: self.lookup(plan.application, Bound::Min, &min)?,
            max: self.lookup(plan.application, Bound::Max, &max)?,
            originated_from: plan.origin,
        })
    }

    fn lookup(
        &self,
        application: Application,
        bound: Bound,
        version: &str,
    ) -> Result<AppVersionRef, CompatError> {
        self.catalogue
            .find(application, version)
            .cloned()
            .ok_or_else(|| CompatError::UnknownVersion {
                application,
                bound,
                version: version.to_owned(),
            })
    }
}

/// The greatest of `base` and `raised`.
fn highest<'v>(base: &'v str, raised: &[&'v str]) -> &'v str {
    raised.iter().copied().fold(base, |best, candidate| {
        if compare_versions(candidate, best) == Ordering::Greater {
            candidate
        } else {
            best
        }
    })
}
