//! Version floors applied when a manifest does not raise them itself.

use serde::{Deserialize, Serialize};

/// Minimum and maximum versions assumed for each kind of package.
///
/// Every field is configurable; the defaults track the oldest runtimes that
/// could load each package shape.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompatibilityDefaults {
    /// Oldest desktop version ever supported; a lower `strict_min_version`
    /// is rejected outright.
    pub oldest_supported: String,
    /// Extensions declaring the legacy `applications` block.
    pub desktop_applications: String,
    /// Packages declaring `browser_specific_settings`.
    pub desktop_browser_specific: String,
    /// Extensions on mobile.
    pub mobile: String,
    /// Extensions declaring a `gecko_android` block.
    pub mobile_gecko_android: String,
    /// Extensions without an id and without a declared minimum.
    pub no_id: String,
    /// Manifest v3 packages on desktop.
    pub manifest_v3_desktop: String,
    /// Manifest v3 packages on mobile.
    pub manifest_v3_mobile: String,
    /// Static themes.
    pub static_theme_desktop: String,
    /// Dictionaries.
    pub dictionary_desktop: String,
    /// Language packs.
    pub language_pack_desktop: String,
    /// Maximum used when the manifest declares none.
    pub default_max: String,
}

impl Default for CompatibilityDefaults {
    fn default() -> Self {
        Self {
            oldest_supported: "42.0".to_owned(),
            desktop_applications: "42.0".to_owned(),
            desktop_browser_specific: "48.0".to_owned(),
            mobile: "48.0".to_owned(),
            mobile_gecko_android: "120.0".to_owned(),
            no_id: "48.0".to_owned(),
            manifest_v3_desktop: "109.0a1".to_owned(),
            manifest_v3_mobile: "120.0a1".to_owned(),
            static_theme_desktop: "53.0".to_owned(),
            dictionary_desktop: "61.0".to_owned(),
            language_pack_desktop: "42.0".to_owned(),
            default_max: "*".to_owned(),
        }
    }
}
