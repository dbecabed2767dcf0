//! Shared leaves for addon-ingest: toolkit version ordering and the Fluent
//! localisation loader used to render user-facing messages.

pub mod i18n;
pub mod version;

pub use i18n::{
    Arguments, FALLBACK_LOCALE, FluentValue, I18nError, LOCALE_ENV_VAR, LocaleSelection,
    LocaleSource, Localiser, available_locales, normalise_locale, resolve_localiser,
    supports_locale,
};
pub use version::{VersionString, compare_versions, simple_version};
