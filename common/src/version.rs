//! Toolkit version strings and their ordering.
//!
//! Add-on and application versions follow the toolkit format: dot separated
//! parts, each shaped `<number><string><number><string>`. Comparison walks the
//! parts pairwise and is numeric wherever the format is numeric, so `10.0`
//! sorts after `9.0` and a pre-release such as `1.0a1` sorts before `1.0`.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Numeric value of a `*` part; larger than any realistic release number.
const WILDCARD_MAJOR: i64 = 2_147_483_647;

/// A version string compared with toolkit semantics.
///
/// Equality follows the ordering rather than the raw text, so `1.0`, `1`
/// and `1.0.0` are all equal.
///
/// ```
/// use addon_ingest_common::VersionString;
///
/// assert!(VersionString::new("109.0a1") > VersionString::new("42.0"));
/// assert!(VersionString::new("1.0a1") < VersionString::new("1.0"));
/// assert_eq!(VersionString::new("1.0"), VersionString::new("1.0.0"));
/// ```
#[derive(Clone, Debug)]
pub struct VersionString {
    raw: String,
}

impl VersionString {
    /// Wrap `raw` without validation; every string has a defined ordering.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The original text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this is the bare `*` wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.raw == "*"
    }
}

/// Compare two raw version strings with toolkit semantics.
#[must_use]
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let mut left_parts = left.split('.');
    let mut right_parts = right.split('.');
    loop {
        match (left_parts.next(), right_parts.next()) {
            (None, None) => return Ordering::Equal,
            (lhs, rhs) => {
                let ordering = Part::parse(lhs.unwrap_or_default())
                    .cmp_part(&Part::parse(rhs.unwrap_or_default()));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// Strip comparison operators from a manifest version value.
///
/// Manifests occasionally carry requirement-style values such as `>=48.0`;
/// only the bare version is meaningful here.
///
/// ```
/// use addon_ingest_common::simple_version;
///
/// assert_eq!(simple_version(">=33.0a1"), "33.0a1");
/// ```
#[must_use]
pub fn simple_version(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, '<' | '=' | '>')).collect()
}

impl PartialEq for VersionString {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionString {}

impl PartialOrd for VersionString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionString {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_versions(&self.raw, &other.raw)
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionString {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for VersionString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One dot-separated part of a version string.
#[derive(Debug, Default, PartialEq, Eq)]
struct Part<'a> {
    major: i64,
    label: Option<&'a str>,
    minor: i64,
    extra: Option<&'a str>,
}

impl<'a> Part<'a> {
    fn parse(part: &'a str) -> Self {
        if part.is_empty() {
            return Self::default();
        }
        if part == "*" {
            return Self {
                major: WILDCARD_MAJOR,
                label: Some(""),
                ..Self::default()
            };
        }

        let (major, rest) = split_number(part);
        if rest.is_empty() {
            return Self {
                major,
                ..Self::default()
            };
        }
        // `N+` is shorthand for `(N+1)pre`.
        if rest.starts_with('+') {
            return Self {
                major: major.saturating_add(1),
                label: Some("pre"),
                ..Self::default()
            };
        }

        let label_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '+' || c == '-')
            .unwrap_or(rest.len());
        let (label, tail) = rest.split_at(label_end);
        let (minor, extra) = split_number(tail);
        Self {
            major,
            label: Some(label),
            minor,
            extra: (!extra.is_empty()).then_some(extra),
        }
    }

    fn cmp_part(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| cmp_label(self.label, other.label))
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| cmp_label(self.extra, other.extra))
    }
}

/// A missing label sorts after any present label: `1.0` > `1.0a`.
fn cmp_label(left: Option<&str>, right: Option<&str>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(lhs), Some(rhs)) => lhs.cmp(rhs),
    }
}

fn split_number(input: &str) -> (i64, &str) {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, rest) = input.split_at(end);
    let value = digits.bytes().fold(0_i64, |acc, digit| {
        acc.saturating_mul(10)
            .saturating_add(i64::from(digit.saturating_sub(b'0')))
    });
    (value, rest)
}
