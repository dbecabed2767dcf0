//! Choosing the locale that rejection messages are rendered in.
//!
//! Candidates are tried in a fixed order and the first one with a bundled
//! translation wins. Unsupported candidates are logged and skipped rather
//! than treated as errors, because a misconfigured locale must never stop an
//! upload from being judged.

use std::fmt;

use log::{debug, warn};

use super::{FALLBACK_LOCALE, LOCALE_ENV_VAR, Localiser, supports_locale};

/// Where the message locale came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LocaleSource {
    /// The caller named a locale, for example with `--locale`.
    ExplicitArgument,
    /// The `ADDON_INGEST_LOCALE` environment variable.
    EnvironmentVariable,
    /// The `locale` key of the ingestion configuration.
    Configuration,
    /// No usable candidate; the bundled fallback applies.
    Fallback,
}

impl LocaleSource {
    /// Short identifier used in log lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExplicitArgument => "explicit",
            Self::EnvironmentVariable => "environment",
            Self::Configuration => "configuration",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for LocaleSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnvironmentVariable => formatter.write_str(LOCALE_ENV_VAR),
            other => formatter.write_str(other.as_str()),
        }
    }
}

/// The localiser for rejection messages and the source that chose it.
#[derive(Clone, Debug)]
pub struct LocaleSelection {
    localiser: Localiser,
    source: LocaleSource,
}

impl LocaleSelection {
    /// Which candidate supplied the locale.
    #[must_use]
    pub const fn source(&self) -> LocaleSource {
        self.source
    }

    /// The effective locale tag.
    #[must_use]
    pub fn locale(&self) -> &str {
        self.localiser.locale()
    }

    /// Whether messages fall back to [`FALLBACK_LOCALE`].
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.localiser.used_fallback()
    }

    /// Localiser to render messages with.
    #[must_use]
    pub const fn localiser(&self) -> &Localiser {
        &self.localiser
    }
}

/// Pick the message locale from, in order, the explicit argument, the
/// `ADDON_INGEST_LOCALE` value, and the configuration. Blank and unsupported
/// candidates are skipped; with none left the fallback applies.
#[must_use]
pub fn resolve_localiser(
    explicit: Option<&str>,
    environment: Option<String>,
    configuration: Option<&str>,
) -> LocaleSelection {
    let candidates = [
        (LocaleSource::ExplicitArgument, explicit),
        (LocaleSource::EnvironmentVariable, environment.as_deref()),
        (LocaleSource::Configuration, configuration),
    ];
    for (source, raw) in candidates {
        let Some(tag) = normalise_locale(raw) else {
            continue;
        };
        if supports_locale(tag) {
            debug!(target: "i18n", "rejection messages in `{tag}` from {source}");
            return LocaleSelection {
                localiser: Localiser::new(Some(tag)),
                source,
            };
        }
        warn!(target: "i18n", "no messages bundled for {source} locale `{tag}`; skipped");
    }

    debug!(target: "i18n", "rejection messages in {FALLBACK_LOCALE}");
    LocaleSelection {
        localiser: Localiser::new(None),
        source: LocaleSource::Fallback,
    }
}

/// Trim whitespace and discard empty locale candidates.
#[must_use]
pub fn normalise_locale(input: Option<&str>) -> Option<&str> {
    input.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::nothing(None, None, None, LocaleSource::Fallback, "en-US")]
    #[case::explicit(Some("fr"), Some("de"), None, LocaleSource::ExplicitArgument, "fr")]
    #[case::environment(None, Some("de"), Some("fr"), LocaleSource::EnvironmentVariable, "de")]
    #[case::configuration(None, None, Some("fr"), LocaleSource::Configuration, "fr")]
    #[case::unsupported_skipped(
        Some("zz"),
        Some("yy"),
        Some("de"),
        LocaleSource::Configuration,
        "de"
    )]
    #[case::blank_then_unknown(Some(" "), None, Some("xx"), LocaleSource::Fallback, "en-US")]
    fn picks_the_first_supported_candidate(
        #[case] explicit: Option<&str>,
        #[case] environment: Option<&str>,
        #[case] configuration: Option<&str>,
        #[case] expected_source: LocaleSource,
        #[case] expected_locale: &str,
    ) {
        let selection = resolve_localiser(explicit, environment.map(str::to_owned), configuration);

        assert_eq!(selection.source(), expected_source);
        assert_eq!(selection.locale(), expected_locale);
        assert_eq!(
            selection.used_fallback(),
            expected_source == LocaleSource::Fallback
        );
    }

    #[test]
    fn selected_localiser_renders_in_the_chosen_locale() {
        let selection = resolve_localiser(None, Some("fr".to_owned()), None);
        let message = selection
            .localiser()
            .message("ingest-no-manifest-found")
            .expect("message exists");

        assert!(message.contains("Aucun fichier manifest.json"));
    }

    #[rstest]
    #[case(LocaleSource::ExplicitArgument, "explicit")]
    #[case(LocaleSource::EnvironmentVariable, "ADDON_INGEST_LOCALE")]
    #[case(LocaleSource::Configuration, "configuration")]
    #[case(LocaleSource::Fallback, "fallback")]
    fn sources_name_themselves(#[case] source: LocaleSource, #[case] shown: &str) {
        assert_eq!(source.to_string(), shown);
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(""), None)]
    #[case(Some("  "), None)]
    #[case(Some("fr"), Some("fr"))]
    #[case(Some(" de "), Some("de"))]
    fn normalises_candidates(#[case] input: Option<&str>, #[case] expected: Option<&str>) {
        assert_eq!(normalise_locale(input), expected);
    }
}
