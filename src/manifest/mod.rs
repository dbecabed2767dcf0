//! Parsing of `manifest.json` into a typed, read-only document.
//!
//! Manifests are untrusted JSON with comments. Parsing is strict about the
//! outer shape (the document must be a JSON object) and lenient about field
//! types: the accessors coerce or drop odd values instead of failing, because
//! a separate linter reports those problems to the developer.

mod comments;
pub mod messages;

use std::str::Utf8Error;

use addon_ingest_common::simple_version;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub use comments::strip_comments;
pub use messages::{is_placeholder, resolve_i18n_message};

/// Manifest schema generation assumed when `manifest_version` is absent.
pub const DEFAULT_MANIFEST_VERSION: u8 = 2;

/// Errors raised while parsing a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest bytes are not UTF-8.
    #[error("manifest is not valid UTF-8")]
    InvalidEncoding(#[source] Utf8Error),

    /// The manifest is not valid JSON once comments are removed.
    #[error("manifest is not valid JSON")]
    InvalidJson(#[source] serde_json::Error),

    /// The top-level JSON value is not an object.
    #[error("manifest must be a JSON object")]
    NotAnObject,
}

/// Kind of add-on a manifest describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonType {
    /// A regular WebExtension.
    Extension,
    /// A theme made of images and colours only.
    StaticTheme,
    /// A spell-checking dictionary.
    Dictionary,
    /// A language pack.
    LanguagePack,
}

impl AddonType {
    /// Stable identifier, matching the serialised form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extension => "extension",
            Self::StaticTheme => "static_theme",
            Self::Dictionary => "dictionary",
            Self::LanguagePack => "language_pack",
        }
    }
}

/// A `browser_specific_settings.gecko`-style block.
#[derive(Clone, Copy, Debug)]
pub struct GeckoBlock<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> GeckoBlock<'a> {
    /// The declared add-on id, coerced to a string.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.fields.get("id").and_then(scalar_text)
    }

    /// `strict_min_version` with comparison operators removed.
    #[must_use]
    pub fn strict_min_version(&self) -> Option<String> {
        self.version_field("strict_min_version")
    }

    /// `strict_max_version` with comparison operators removed.
    #[must_use]
    pub fn strict_max_version(&self) -> Option<String> {
        self.version_field("strict_max_version")
    }

    /// Whether either strict bound is declared.
    #[must_use]
    pub fn declares_bounds(&self) -> bool {
        self.strict_min_version().is_some() || self.strict_max_version().is_some()
    }

    /// Raw field lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key)
    }

    fn version_field(&self, key: &str) -> Option<String> {
        self.fields
            .get(key)
            .and_then(scalar_text)
            .map(|raw| simple_version(&raw))
            .filter(|version| !version.is_empty())
    }
}

/// A parsed manifest.
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestDocument {
    data: Map<String, Value>,
}

impl ManifestDocument {
    /// Parse manifest bytes, stripping comments first.
    ///
    /// ```
    /// use addon_ingest::manifest::{AddonType, ManifestDocument};
    ///
    /// let manifest = ManifestDocument::parse(br#"{
    ///     // comment
    ///     "manifest_version": 2,
    ///     "version": "1.0",
    ///     "applications": {"gecko": {"id": "@x"}}
    /// }"#).unwrap();
    /// assert_eq!(manifest.guid().as_deref(), Some("@x"));
    /// assert_eq!(manifest.declared_type(), AddonType::Extension);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] for non-UTF-8 input, invalid JSON, or a
    /// top-level value that is not an object.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let text = std::str::from_utf8(bytes).map_err(ManifestError::InvalidEncoding)?;
        let value: Value =
            serde_json::from_str(&strip_comments(text)).map_err(ManifestError::InvalidJson)?;
        match value {
            Value::Object(data) => Ok(Self { data }),
            _ => Err(ManifestError::NotAnObject),
        }
    }

    /// Raw top-level field lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Add-on type; `langpack_id` wins over `theme`, which wins over
    /// `dictionaries`.
    #[must_use]
    pub fn declared_type(&self) -> AddonType {
        if self.data.contains_key("langpack_id") {
            AddonType::LanguagePack
        } else if self.data.contains_key("theme") {
            AddonType::StaticTheme
        } else if self.data.contains_key("dictionaries") {
            AddonType::Dictionary
        } else {
            AddonType::Extension
        }
    }

    /// `manifest_version`, defaulting to 2 when absent or not a small
    /// integer.
    #[must_use]
    pub fn manifest_version(&self) -> u8 {
        self.data
            .get("manifest_version")
            .and_then(Value::as_u64)
            .and_then(|version| u8::try_from(version).ok())
            .unwrap_or(DEFAULT_MANIFEST_VERSION)
    }

    /// Whether a `browser_specific_settings` object is present.
    #[must_use]
    pub fn uses_browser_specific_settings(&self) -> bool {
        self.object("browser_specific_settings").is_some()
    }

    /// The shared gecko block: `browser_specific_settings.gecko`, else
    /// `applications.gecko`.
    #[must_use]
    pub fn gecko(&self) -> Option<GeckoBlock<'_>> {
        self.nested("browser_specific_settings", "gecko")
            .or_else(|| self.nested("applications", "gecko"))
            .map(|fields| GeckoBlock { fields })
    }

    /// The mobile-only `browser_specific_settings.gecko_android` block.
    #[must_use]
    pub fn gecko_android(&self) -> Option<GeckoBlock<'_>> {
        self.nested("browser_specific_settings", "gecko_android")
            .map(|fields| GeckoBlock { fields })
    }

    /// Add-on id from the shared gecko block.
    ///
    /// Numbers and booleans are stringified; `null` and `""` mean no id.
    #[must_use]
    pub fn guid(&self) -> Option<String> {
        self.gecko().and_then(|block| block.id())
    }

    /// `name`, stringified.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.data.get("name").and_then(scalar_text)
    }

    /// `version`, stringified whatever its JSON type; `null` means absent.
    #[must_use]
    pub fn version(&self) -> Option<String> {
        match self.data.get("version")? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }

    /// `description`.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        self.data.get("description").and_then(scalar_text)
    }

    /// `developer.url` if set, else `homepage_url`.
    #[must_use]
    pub fn homepage(&self) -> Option<String> {
        self.object("developer")
            .and_then(|developer| developer.get("url"))
            .and_then(scalar_text)
            .or_else(|| self.data.get("homepage_url").and_then(scalar_text))
    }

    /// `default_locale`.
    #[must_use]
    pub fn default_locale(&self) -> Option<String> {
        self.data.get("default_locale").and_then(scalar_text)
    }

    /// String entries of `permissions`.
    #[must_use]
    pub fn permissions(&self) -> Vec<String> {
        self.string_list("permissions")
    }

    /// String entries of `optional_permissions`.
    #[must_use]
    pub fn optional_permissions(&self) -> Vec<String> {
        self.string_list("optional_permissions")
    }

    /// String entries of `host_permissions`.
    #[must_use]
    pub fn host_permissions(&self) -> Vec<String> {
        self.string_list("host_permissions")
    }

    /// Every `matches` pattern of every content script, flattened.
    #[must_use]
    pub fn content_scripts(&self) -> Vec<String> {
        self.data
            .get("content_scripts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|script| script.get("matches").and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect()
    }

    /// String entries of `install_origins`; anything else is dropped.
    #[must_use]
    pub fn install_origins(&self) -> Vec<String> {
        self.string_list("install_origins")
    }

    /// Whether the manifest declares `experiment_apis`.
    #[must_use]
    pub fn is_experiment(&self) -> bool {
        self.data
            .get("experiment_apis")
            .is_some_and(|value| !value.is_null())
    }

    /// Locale targeted by a dictionary or language pack.
    ///
    /// Dictionaries use the first key of `dictionaries`; language packs use
    /// `langpack_id`. Other add-on types have none.
    #[must_use]
    pub fn target_locale(&self) -> Option<String> {
        match self.declared_type() {
            AddonType::Dictionary => self
                .object("dictionaries")
                .and_then(|dictionaries| dictionaries.keys().next().cloned()),
            AddonType::LanguagePack => self.data.get("langpack_id").and_then(scalar_text),
            AddonType::Extension | AddonType::StaticTheme => None,
        }
    }

    /// Language packs are locked to the versions they declare.
    #[must_use]
    pub fn is_strict_compatibility(&self) -> bool {
        self.declared_type() == AddonType::LanguagePack
    }

    fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.data.get(key).and_then(Value::as_object)
    }

    fn nested(&self, outer: &str, inner: &str) -> Option<&Map<String, Value>> {
        self.object(outer)
            .and_then(|block| block.get(inner))
            .and_then(Value::as_object)
    }

    fn string_list(&self, key: &str) -> Vec<String> {
        self.data
            .get(key)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect()
    }
}

/// Scalar JSON value as text; `null`, `""`, arrays and objects give `None`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn parse(value: &Value) -> ManifestDocument {
        ManifestDocument::parse(value.to_string().as_bytes()).expect("fixture should parse")
    }

    #[rstest]
    #[case::empty(json!({}), AddonType::Extension)]
    #[case::theme(json!({"theme": {}}), AddonType::StaticTheme)]
    #[case::dictionary(json!({"dictionaries": {"en-US": "en.dic"}}), AddonType::Dictionary)]
    #[case::langpack(json!({"langpack_id": "fr"}), AddonType::LanguagePack)]
    #[case::langpack_beats_theme(
        json!({"langpack_id": "fr", "theme": {}}),
        AddonType::LanguagePack
    )]
    #[case::theme_beats_dictionary(
        json!({"theme": {}, "dictionaries": {}}),
        AddonType::StaticTheme
    )]
    fn derives_declared_type(#[case] value: Value, #[case] expected: AddonType) {
        assert_eq!(parse(&value).declared_type(), expected);
    }

    #[rstest]
    #[case::legacy(json!({"applications": {"gecko": {"id": "some-id"}}}), Some("some-id"))]
    #[case::browser_specific(
        json!({"browser_specific_settings": {"gecko": {"id": "bss-id"}}}),
        Some("bss-id")
    )]
    #[case::prefers_browser_specific(
        json!({
            "applications": {"gecko": {"id": "old"}},
            "browser_specific_settings": {"gecko": {"id": "new"}}
        }),
        Some("new")
    )]
    #[case::numeric(json!({"browser_specific_settings": {"gecko": {"id": 12345}}}), Some("12345"))]
    #[case::null(json!({"browser_specific_settings": {"gecko": {"id": null}}}), None)]
    #[case::empty_string(json!({"applications": {"gecko": {"id": ""}}}), None)]
    #[case::name_is_not_an_id(json!({"name": "addon-name"}), None)]
    fn extracts_guid(#[case] value: Value, #[case] expected: Option<&str>) {
        assert_eq!(parse(&value).guid().as_deref(), expected);
    }

    #[rstest]
    #[case(json!({"version": "23.0.1"}), Some("23.0.1"))]
    #[case(json!({"version": 58}), Some("58"))]
    #[case(json!({"version": 58.0}), Some("58.0"))]
    #[case(json!({"version": {}}), Some("{}"))]
    #[case(json!({"version": []}), Some("[]"))]
    #[case(json!({"version": null}), None)]
    #[case(json!({}), None)]
    fn version_is_always_text(#[case] value: Value, #[case] expected: Option<&str>) {
        assert_eq!(parse(&value).version().as_deref(), expected);
    }

    #[rstest]
    #[case(json!({}), 2)]
    #[case(json!({"manifest_version": 3}), 3)]
    #[case(json!({"manifest_version": "3"}), 2)]
    #[case(json!({"manifest_version": 4096}), 2)]
    fn manifest_version_defaults_to_two(#[case] value: Value, #[case] expected: u8) {
        assert_eq!(parse(&value).manifest_version(), expected);
    }

    #[rstest]
    #[case(json!({}), Vec::<&str>::new())]
    #[case(json!({"install_origins": ["https://fôo.com"]}), vec!["https://fôo.com"])]
    #[case(json!({"install_origins": 42}), Vec::<&str>::new())]
    #[case(json!({"install_origins": null}), Vec::<&str>::new())]
    #[case(json!({"install_origins": [42, null, {}, ["x"]]}), Vec::<&str>::new())]
    #[case(json!({"install_origins": [42, "flop"]}), vec!["flop"])]
    fn install_origins_keep_strings_only(#[case] value: Value, #[case] expected: Vec<&str>) {
        assert_eq!(parse(&value).install_origins(), expected);
    }

    #[test]
    fn homepage_prefers_developer_url() {
        let manifest = parse(&json!({
            "homepage_url": "http://should-be-overridden",
            "developer": {"url": "http://my-addon.org"}
        }));
        assert_eq!(manifest.homepage().as_deref(), Some("http://my-addon.org"));

        let without_url = parse(&json!({
            "homepage_url": "http://my-addon.org",
            "developer": {"name": "some name"}
        }));
        assert_eq!(without_url.homepage().as_deref(), Some("http://my-addon.org"));
    }

    #[test]
    fn flattens_content_script_matches() {
        let manifest = parse(&json!({
            "content_scripts": [
                {"matches": ["https://a.example/*", 7], "js": ["a.js"]},
                {"js": ["b.js"]},
                {"matches": ["<all_urls>"]}
            ]
        }));
        assert_eq!(
            manifest.content_scripts(),
            vec!["https://a.example/*", "<all_urls>"]
        );
    }

    #[test]
    fn permission_lists_drop_non_strings() {
        let manifest = parse(&json!({
            "permissions": ["tabs", {"bad": true}, "storage"],
            "optional_permissions": ["bookmarks"],
            "host_permissions": ["*://*.example.com/*"]
        }));
        assert_eq!(manifest.permissions(), vec!["tabs", "storage"]);
        assert_eq!(manifest.optional_permissions(), vec!["bookmarks"]);
        assert_eq!(manifest.host_permissions(), vec!["*://*.example.com/*"]);
    }

    #[rstest]
    #[case(json!({"dictionaries": {"en-US": "/path/en-US.dic"}}), Some("en-US"))]
    #[case(json!({"dictionaries": {}}), None)]
    #[case(json!({"langpack_id": "foo"}), Some("foo"))]
    #[case(json!({"name": "plain"}), None)]
    fn resolves_target_locale(#[case] value: Value, #[case] expected: Option<&str>) {
        assert_eq!(parse(&value).target_locale().as_deref(), expected);
    }

    #[test]
    fn strict_bounds_drop_operators() {
        let manifest = parse(&json!({
            "applications": {"gecko": {
                "strict_min_version": ">=60.0",
                "strict_max_version": "=60.*"
            }}
        }));
        let gecko = manifest.gecko().expect("gecko block");
        assert_eq!(gecko.strict_min_version().as_deref(), Some("60.0"));
        assert_eq!(gecko.strict_max_version().as_deref(), Some("60.*"));
        assert!(gecko.declares_bounds());
    }

    #[test]
    fn reads_gecko_android_block_separately() {
        let manifest = parse(&json!({
            "browser_specific_settings": {
                "gecko": {"id": "@a"},
                "gecko_android": {"strict_min_version": "120.0"}
            }
        }));
        assert!(manifest.uses_browser_specific_settings());
        let android = manifest.gecko_android().expect("gecko_android block");
        assert_eq!(android.strict_min_version().as_deref(), Some("120.0"));
        assert!(manifest.gecko().is_some_and(|gecko| !gecko.declares_bounds()));
    }

    #[test]
    fn accepts_byte_order_mark_and_comments() {
        let manifest = ManifestDocument::parse(
            b"\xef\xbb\xbf{\"manifest_version\": 2, /* c */ \"name\": \"...\"} // end",
        )
        .expect("manifest should parse");
        assert_eq!(manifest.name().as_deref(), Some("..."));
    }

    #[rstest]
    #[case::array(b"[1, 2]".as_slice())]
    #[case::string(b"\"manifest\"".as_slice())]
    fn rejects_non_object_documents(#[case] bytes: &[u8]) {
        assert!(matches!(
            ManifestDocument::parse(bytes),
            Err(ManifestError::NotAnObject)
        ));
    }

    #[rstest]
    #[case::truncated(b"{\"name\": ".as_slice())]
    #[case::empty(b"".as_slice())]
    #[case::only_comment(b"// nothing here".as_slice())]
    fn rejects_invalid_json(#[case] bytes: &[u8]) {
        assert!(matches!(
            ManifestDocument::parse(bytes),
            Err(ManifestError::InvalidJson(_))
        ));
    }

    #[test]
    fn rejects_non_utf8_bytes() {
        assert!(matches!(
            ManifestDocument::parse(b"{\"name\": \"\xff\"}"),
            Err(ManifestError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn language_packs_are_strictly_compatible() {
        assert!(parse(&json!({"langpack_id": "de"})).is_strict_compatibility());
        assert!(!parse(&json!({"dictionaries": {"de": "de.dic"}})).is_strict_compatibility());
        assert!(parse(&json!({"experiment_apis": {}})).is_experiment());
        assert!(!parse(&json!({"experiment_apis": null})).is_experiment());
    }
}
