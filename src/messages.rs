//! Turning ingestion errors into text that is safe to show an uploader.
//!
//! This is the only place errors become user-visible. Each error maps to a
//! Fluent message id plus arguments, and every argument that came from the
//! upload (member names, versions, ids) is sanitised first.

use std::borrow::Cow;

use addon_ingest_common::{Arguments, FluentValue, I18nError, Localiser};

use crate::archive::ArchiveError;
use crate::compat::CompatError;
use crate::crx::CrxError;
use crate::error::IngestError;
use crate::ingest::CheckError;

/// Longest attacker-controlled value quoted in a message, in characters.
pub const MAX_DISPLAY_CHARS: usize = 128;

const ELLIPSIS: char = '\u{2026}';

/// Make untrusted text safe to embed in logs and messages.
///
/// Control characters become U+FFFD and anything past
/// [`MAX_DISPLAY_CHARS`] is replaced by an ellipsis.
///
/// ```
/// use addon_ingest::messages::sanitise_for_display;
///
/// assert_eq!(sanitise_for_display("a\u{1b}[2Jb"), "a\u{fffd}[2Jb");
/// ```
#[must_use]
pub fn sanitise_for_display(raw: &str) -> String {
    let mut chars = raw.chars();
    let mut safe: String = chars
        .by_ref()
        .take(MAX_DISPLAY_CHARS)
        .map(|character| {
            if character.is_control() {
                char::REPLACEMENT_CHARACTER
            } else {
                character
            }
        })
        .collect();
    if chars.next().is_some() {
        safe.push(ELLIPSIS);
    }
    safe
}

/// Localised, sanitised text for `error`.
///
/// # Errors
///
/// Returns [`I18nError::MissingMessage`] when no bundle defines the message,
/// which only happens if the bundled resources are incomplete.
pub fn user_message(error: &IngestError, localiser: &Localiser) -> Result<String, I18nError> {
    let (key, args) = message_for(error);
    if args.is_empty() {
        localiser.message(key)
    } else {
        localiser.message_with_args(key, &args)
    }
}

/// Message id and arguments for `error`.
fn message_for(error: &IngestError) -> (&'static str, Arguments) {
    let mut args = Arguments::new();
    let key = match error {
        IngestError::UnsupportedFileType { .. } => "ingest-unsupported-file-type",
        IngestError::Archive(archive) => archive_message(archive, &mut args),
        IngestError::Crx(CrxError::CorruptCrx { .. }) => "ingest-corrupt-crx",
        IngestError::Crx(CrxError::UnsupportedCrxVersion { version }) => {
            args.insert(Cow::Borrowed("version"), FluentValue::from(*version));
            "ingest-unsupported-crx-version"
        }
        IngestError::Crx(CrxError::Io(_)) | IngestError::Io(_) => "ingest-io",
        IngestError::NoManifestFound => "ingest-no-manifest-found",
        IngestError::Manifest(_) => "ingest-invalid-manifest",
        IngestError::Check(check) => check_message(check, &mut args),
        IngestError::Compat(compat) => compat_message(compat, &mut args),
        IngestError::DuplicateAddonId { guid } => {
            insert_untrusted(&mut args, "guid", guid);
            "ingest-duplicate-addon-id"
        }
        IngestError::GuidMismatch { found, expected } => {
            insert_untrusted(&mut args, "found", found);
            insert_untrusted(&mut args, "expected", expected);
            "ingest-guid-mismatch"
        }
        IngestError::TypeMismatch { found, expected } => {
            insert_untrusted(&mut args, "found", found.as_str());
            insert_untrusted(&mut args, "expected", expected.as_str());
            "ingest-type-mismatch"
        }
        IngestError::LocaleMismatch { found, expected } => {
            insert_untrusted(&mut args, "found", found);
            insert_untrusted(&mut args, "expected", expected);
            "ingest-locale-mismatch"
        }
        IngestError::Lock(_) => "ingest-lock-failed",
    };
    (key, args)
}

fn archive_message(error: &ArchiveError, args: &mut Arguments) -> &'static str {
    match error {
        ArchiveError::UnsupportedCompression { .. } => "ingest-unsupported-compression",
        ArchiveError::InvalidFilenameEncoding => "ingest-invalid-filename-encoding",
        ArchiveError::InvalidFilename { name } => {
            insert_untrusted(args, "name", name);
            "ingest-invalid-filename"
        }
        ArchiveError::MemberTooLarge { name, .. } => {
            insert_untrusted(args, "name", name);
            "ingest-member-too-large"
        }
        ArchiveError::ArchiveTooLarge { .. } => "ingest-archive-too-large",
        ArchiveError::ForbiddenSpecialFile { name } => {
            insert_untrusted(args, "name", name);
            "ingest-forbidden-special-file"
        }
        ArchiveError::Cancelled => "ingest-cancelled",
        ArchiveError::Io(_) => "ingest-io",
        ArchiveError::Corrupt { .. }
        | ArchiveError::MissingMemberInfo
        | ArchiveError::UnsupportedMemberType { .. }
        | ArchiveError::SizeMismatch { .. }
        | ArchiveError::MemberNotFound { .. } => "ingest-invalid-archive-file",
    }
}

fn check_message(error: &CheckError, args: &mut Arguments) -> &'static str {
    match error {
        CheckError::MissingVersion => "ingest-missing-version",
        CheckError::InvalidVersion { version } => {
            insert_untrusted(args, "version", version);
            "ingest-invalid-version"
        }
        CheckError::InvalidGuid { guid } => {
            insert_untrusted(args, "guid", guid);
            "ingest-invalid-guid"
        }
        CheckError::GuidTooLong { .. } => "ingest-guid-too-long",
        CheckError::MissingTargetLocale => "ingest-missing-target-locale",
    }
}

fn compat_message(error: &CompatError, args: &mut Arguments) -> &'static str {
    match error {
        CompatError::UnknownVersion {
            application,
            bound,
            version,
        } => {
            insert_untrusted(args, "application", application.as_str());
            insert_untrusted(args, "bound", bound.as_str());
            insert_untrusted(args, "version", version);
            "ingest-compat-unknown-version"
        }
        CompatError::IdRequired { no_id, version } => {
            insert_untrusted(args, "no_id", no_id);
            insert_untrusted(args, "version", version);
            "ingest-compat-id-required"
        }
        CompatError::BelowOldestSupported { oldest, version } => {
            insert_untrusted(args, "oldest", oldest);
            insert_untrusted(args, "version", version);
            "ingest-compat-below-oldest"
        }
    }
}

fn insert_untrusted(args: &mut Arguments, name: &'static str, value: &str) {
    args.insert(
        Cow::Borrowed(name),
        FluentValue::from(sanitise_for_display(value)),
    );
}
