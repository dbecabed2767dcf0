use std::borrow::Cow;
use std::collections::HashMap;
use std::str::FromStr;

use fluent_templates::Loader;
use thiserror::Error;

use super::locales::supports_locale;
use super::{FALLBACK_LANGUAGE, FluentValue, LOADER, LanguageIdentifier};

/// HashMap wrapper used when passing Fluent arguments to lookups.
pub type Arguments = HashMap<Cow<'static, str>, FluentValue<'static>>;

/// Error raised when localisation data cannot satisfy a caller request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum I18nError {
    /// Raised when the requested message id is missing for the resolved locale.
    #[error("message `{key}` missing for locale `{locale}`")]
    MissingMessage {
        /// Message id that was requested.
        key: String,
        /// Locale the lookup ran against.
        locale: String,
    },
}

/// Resolve localisation messages for a specific locale.
///
/// The localiser falls back to `en-US` when the requested locale is not
/// bundled. Lookups against a bundled locale that lacks a message fall
/// through to the `en-US` bundle as well.
#[derive(Clone, Debug)]
pub struct Localiser {
    language: LanguageIdentifier,
    locale: String,
    fallback_used: bool,
}

impl Localiser {
    /// Create a localiser for `locale`, falling back to [`super::FALLBACK_LOCALE`].
    ///
    /// ```
    /// use addon_ingest_common::i18n::{available_locales, Localiser};
    ///
    /// let locale = Localiser::new(Some("fr"));
    /// assert!(available_locales().contains(&"fr".to_string()));
    /// assert_eq!(locale.locale(), "fr");
    /// assert!(!locale.used_fallback());
    ///
    /// let fallback = Localiser::new(Some("zz"));
    /// assert_eq!(fallback.locale(), "en-US");
    /// assert!(fallback.used_fallback());
    /// ```
    #[must_use]
    pub fn new(locale: Option<&str>) -> Self {
        match locale {
            Some(value) if supports_locale(value) => match LanguageIdentifier::from_str(value) {
                Ok(identifier) => Self {
                    locale: identifier.to_string(),
                    language: identifier,
                    fallback_used: false,
                },
                Err(_) => Self::fallback(),
            },
            _ => Self::fallback(),
        }
    }

    /// Return the resolved locale identifier.
    #[must_use]
    pub const fn language(&self) -> &LanguageIdentifier {
        &self.language
    }

    /// Return the resolved locale as a string slice.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Whether the fallback locale was used.
    #[must_use]
    pub const fn used_fallback(&self) -> bool {
        self.fallback_used
    }

    /// Fetch the translated message for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`I18nError::MissingMessage`] when no bundle defines `key`.
    pub fn message(&self, key: &str) -> Result<String, I18nError> {
        self.lookup(key, None)
    }

    /// Fetch the translated message with Fluent arguments.
    ///
    /// # Errors
    ///
    /// Returns [`I18nError::MissingMessage`] when no bundle defines `key`.
    pub fn message_with_args(&self, key: &str, args: &Arguments) -> Result<String, I18nError> {
        self.lookup(key, Some(args))
    }

    fn lookup(&self, key: &str, args: Option<&Arguments>) -> Result<String, I18nError> {
        let maybe_value = match args {
            Some(arguments) => LOADER.try_lookup_with_args(&self.language, key, arguments),
            None => LOADER.try_lookup(&self.language, key),
        };

        maybe_value.ok_or_else(|| I18nError::MissingMessage {
            key: key.to_owned(),
            locale: self.language.to_string(),
        })
    }

    fn fallback() -> Self {
        Self {
            language: FALLBACK_LANGUAGE.clone(),
            locale: FALLBACK_LANGUAGE.to_string(),
            fallback_used: true,
        }
    }
}

impl Default for Localiser {
    fn default() -> Self {
        Self::fallback()
    }
}
