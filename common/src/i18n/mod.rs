//! Localisation loader and helpers for user-facing ingestion messages.
//!
//! The loader embeds Fluent resources under `locales/` so that callers can
//! turn an error kind into translated text without touching the filesystem
//! at runtime. The API is a thin wrapper around `fluent-templates` that
//! tracks whether the fallback bundle was used and surfaces missing messages
//! as errors instead of silently printing message ids.
//!
//! Locale resolution is handled by [`resolve_localiser`], which evaluates an
//! explicit override, the `ADDON_INGEST_LOCALE` environment variable, and
//! configuration in priority order before falling back to `en-US`.

use fluent_templates::static_loader;
use unic_langid::langid;

/// Re-export the Fluent value type for constructing message arguments.
pub use fluent_templates::fluent_bundle::FluentValue;
pub(crate) use fluent_templates::loader::LanguageIdentifier;

const FALLBACK_LITERAL: &str = "en-US";

static_loader! {
    pub(crate) static LOADER = {
        locales: "../locales",
        fallback_language: "en-US",
        // Retain Fluent's default Unicode isolating marks for bidi safety.
    };
}

/// The fallback locale bundled with every build.
pub const FALLBACK_LOCALE: &str = FALLBACK_LITERAL;
pub(crate) const FALLBACK_LANGUAGE: LanguageIdentifier = langid!("en-US");

/// Environment variable consulted by [`resolve_localiser`].
pub const LOCALE_ENV_VAR: &str = "ADDON_INGEST_LOCALE";

mod loader;
mod locales;
mod selection;

pub use loader::{Arguments, I18nError, Localiser};
pub use locales::{available_locales, supports_locale};
pub use selection::{LocaleSelection, LocaleSource, normalise_locale, resolve_localiser};
