//! `__MSG_<id>__` placeholders in localised manifest fields.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^__MSG_(?P<msgid>[a-zA-Z0-9@_]+?)__").ok());

/// Per-locale message catalogues keyed by locale, then by message id.
pub type LocaleMessages = BTreeMap<String, BTreeMap<String, String>>;

/// Whether `message` starts with a `__MSG_<id>__` placeholder.
#[must_use]
pub fn is_placeholder(message: &str) -> bool {
    placeholder_id(message).is_some()
}

/// Resolve a placeholder against `messages` for `locale`, falling back to
/// `default_locale`.
///
/// Locale keys match case-insensitively with `_` and `-` treated alike.
/// Anything that is not a placeholder, or names a message found in neither
/// locale, is returned unchanged.
///
/// ```
/// use std::collections::BTreeMap;
/// use addon_ingest::manifest::resolve_i18n_message;
///
/// let mut messages = BTreeMap::new();
/// messages.insert(
///     "en_US".to_owned(),
///     BTreeMap::from([("title".to_owned(), "Tab Saver".to_owned())]),
/// );
/// assert_eq!(resolve_i18n_message("__MSG_title__", &messages, "en-US", None), "Tab Saver");
/// assert_eq!(resolve_i18n_message("Plain", &messages, "en-US", None), "Plain");
/// ```
#[must_use]
pub fn resolve_i18n_message(
    message: &str,
    messages: &LocaleMessages,
    locale: &str,
    default_locale: Option<&str>,
) -> String {
    let Some(id) = placeholder_id(message) else {
        return message.to_owned();
    };
    lookup(messages, locale, id)
        .or_else(|| default_locale.and_then(|fallback| lookup(messages, fallback, id)))
        .map_or_else(|| message.to_owned(), str::to_owned)
}

fn placeholder_id(message: &str) -> Option<&str> {
    PLACEHOLDER
        .as_ref()?
        .captures(message)?
        .name("msgid")
        .map(|id| id.as_str())
}

fn lookup<'a>(messages: &'a LocaleMessages, locale: &str, id: &str) -> Option<&'a str> {
    let wanted = locale_key(locale);
    messages
        .iter()
        .find(|(key, _)| locale_key(key) == wanted)
        .and_then(|(_, catalogue)| catalogue.get(id))
        .map(String::as_str)
}

fn locale_key(locale: &str) -> String {
    locale.replace('_', "-").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn messages() -> LocaleMessages {
        BTreeMap::from([
            (
                "en_US".to_owned(),
                BTreeMap::from([
                    ("foo".to_owned(), "bar".to_owned()),
                    ("abc".to_owned(), "eng".to_owned()),
                ]),
            ),
            (
                "de".to_owned(),
                BTreeMap::from([("foo".to_owned(), "bazinga".to_owned())]),
            ),
        ])
    }

    #[rstest]
    #[case::plain("foo", "en-US", None, "foo")]
    #[case::resolved("__MSG_foo__", "en-US", None, "bar")]
    #[case::other_locale("__MSG_foo__", "de", None, "bazinga")]
    #[case::missing_id("__MSG_missing__", "en-US", None, "__MSG_missing__")]
    #[case::default_locale("__MSG_abc__", "de", Some("en_US"), "eng")]
    #[case::unknown_locale_falls_back("__MSG_foo__", "fr", Some("en-us"), "bar")]
    #[case::no_fallback("__MSG_abc__", "de", None, "__MSG_abc__")]
    #[case::underscore_locale("__MSG_foo__", "en_US", None, "bar")]
    fn resolves_placeholders(
        messages: LocaleMessages,
        #[case] message: &str,
        #[case] locale: &str,
        #[case] default_locale: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(
            resolve_i18n_message(message, &messages, locale, default_locale),
            expected
        );
    }

    #[rstest]
    #[case("__MSG_extensionName__", true)]
    #[case("__MSG_a@b_c__ trailing", true)]
    #[case("__MSG___", false)]
    #[case("prefix __MSG_name__", false)]
    #[case("__MSG_bad-id__", false)]
    fn detects_placeholders(#[case] message: &str, #[case] expected: bool) {
        assert_eq!(is_placeholder(message), expected);
    }
}
