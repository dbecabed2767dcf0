//! The inspection flow behind the binary.
//!
//! Loading, ingestion and reporting take their inputs explicitly (including
//! the environment's locale) so the whole flow runs in tests without touching
//! process state.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;

use addon_ingest::{
    AppVersionCatalogue, IngestConfig, IngestError, PackageIngestor, PackageKind, PackageMetadata,
    PackageSource, user_message,
};
use addon_ingest_common::{LocaleSelection, Localiser, resolve_localiser};
use camino::Utf8Path;
use log::{info, warn};

use crate::cli::Cli;
use crate::error::{EXIT_ACCEPTED, InspectError};

/// Run an inspection, writing the report to `stdout` and diagnostics to
/// `stderr`. Returns the process exit status.
pub fn run(
    cli: &Cli,
    environment_locale: Option<String>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => return report_failure(&error, &Localiser::new(None), stderr),
    };
    let selection =
        resolve_localiser(cli.locale.as_deref(), environment_locale, config.locale());

    match inspect(cli, &config).and_then(|metadata| write_report(&metadata, cli.compact, stdout)) {
        Ok(()) => EXIT_ACCEPTED,
        Err(error) => {
            log_rejection(&error, &selection);
            report_failure(&error, selection.localiser(), stderr)
        }
    }
}

fn log_rejection(error: &InspectError, selection: &LocaleSelection) {
    if let InspectError::Ingest(ingest) = error {
        info!(
            target: "inspect",
            "{} rejected; message in {} ({} locale)",
            ingest.kind().as_str(),
            selection.locale(),
            selection.source().as_str()
        );
    }
}

/// Load the configuration file, or the defaults when none is given.
///
/// # Errors
///
/// Returns [`InspectError::Read`] or [`InspectError::Config`].
pub fn load_config(path: Option<&Utf8Path>) -> Result<IngestConfig, InspectError> {
    let Some(path) = path else {
        return Ok(IngestConfig::default());
    };
    let text = read_text(path)?;
    IngestConfig::from_toml_str(&text).map_err(|source| InspectError::Config {
        path: path.to_owned(),
        source,
    })
}

/// Load the version catalogue; `.toml` files are TOML, anything else JSON.
///
/// # Errors
///
/// Returns [`InspectError::Read`] or [`InspectError::Catalogue`].
pub fn load_catalogue(path: &Utf8Path) -> Result<AppVersionCatalogue, InspectError> {
    let text = read_text(path)?;
    let parsed = if path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("toml"))
    {
        AppVersionCatalogue::from_toml_str(&text)
    } else {
        AppVersionCatalogue::from_json_str(&text)
    };
    parsed.map_err(|source| InspectError::Catalogue {
        path: path.to_owned(),
        source,
    })
}

/// Parse the upload and, when asked, extract it.
///
/// # Errors
///
/// Returns the first loading, ingestion or lock failure.
pub fn inspect(cli: &Cli, config: &IngestConfig) -> Result<PackageMetadata, InspectError> {
    let catalogue = load_catalogue(&cli.catalogue)?;
    let taken: BTreeSet<String> = cli.taken_guid.iter().cloned().collect();
    let mut ingestor = PackageIngestor::new(config, &catalogue).with_registry(&taken);
    if cli.expand_nested {
        ingestor = ingestor.expanding_nested_archives();
    }

    let mut source = PackageSource::new(cli.package.as_std_path());
    if let Some(kind) = cli.kind {
        source = source.with_kind(kind.into());
    }

    let metadata = match ingestor.parse_package(&source) {
        Err(error) if error.allows_zip_fallback() && !cli.no_zip_fallback => {
            info!(target: "inspect", "retrying {} as a plain zip", cli.package);
            source = source.with_kind(PackageKind::Zip);
            ingestor.parse_package(&source).map_err(|_| error)?
        }
        outcome => outcome?,
    };

    if let Some(destination) = cli.extract_to.as_deref() {
        extract(cli, &ingestor, &source, destination)?;
    }
    Ok(metadata)
}

fn extract(
    cli: &Cli,
    ingestor: &PackageIngestor<'_>,
    source: &PackageSource,
    destination: &Utf8Path,
) -> Result<(), InspectError> {
    let Some((lock_dir, upload_id)) = cli.lock() else {
        ingestor.extract_package(source, destination.as_std_path())?;
        return Ok(());
    };
    fs::create_dir_all(lock_dir).map_err(|source_error| InspectError::Read {
        path: lock_dir.clone(),
        source: source_error,
    })?;
    let extracted = ingestor.extract_package_locked(
        source,
        destination.as_std_path(),
        lock_dir.as_std_path(),
        upload_id,
    )?;
    if extracted {
        Ok(())
    } else {
        Err(InspectError::LockBusy {
            upload_id: upload_id.to_owned(),
        })
    }
}

fn write_report(
    metadata: &PackageMetadata,
    compact: bool,
    stdout: &mut dyn Write,
) -> Result<(), InspectError> {
    let rendered = if compact {
        serde_json::to_string(metadata)?
    } else {
        serde_json::to_string_pretty(metadata)?
    };
    writeln!(stdout, "{rendered}")?;
    Ok(())
}

fn read_text(path: &Utf8Path) -> Result<String, InspectError> {
    fs::read_to_string(path).map_err(|source| InspectError::Read {
        path: path.to_owned(),
        source,
    })
}

/// Describe `error` on `stderr` and pick the exit status.
///
/// Ingestion errors go through the localised, sanitised messages; the raw
/// parser detail never reaches the terminal.
fn report_failure(error: &InspectError, localiser: &Localiser, stderr: &mut dyn Write) -> i32 {
    let line = match error {
        InspectError::Ingest(ingest) => rejection_line(ingest, localiser),
        other => format!("error: {other}"),
    };
    if let Err(write_error) = writeln!(stderr, "{line}") {
        warn!(target: "inspect", "could not write to stderr: {write_error}");
    }
    error.exit_code()
}

fn rejection_line(error: &IngestError, localiser: &Localiser) -> String {
    let kind = error.kind().as_str();
    match user_message(error, localiser) {
        Ok(message) => format!("rejected ({kind}): {message}"),
        Err(missing) => {
            warn!(target: "inspect", "no message for {kind}: {missing}");
            format!("rejected ({kind})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use crate::error::{EXIT_FAILURE, EXIT_REJECTED};

    const CATALOGUE: &str = r#"{"versions": [
        {"application": "desktop", "id": 1, "version": "42.0"},
        {"application": "desktop", "id": 2, "version": "*"},
        {"application": "mobile", "id": 3, "version": "48.0"},
        {"application": "mobile", "id": 4, "version": "*"}
    ]}"#;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().into_owned()
        }

        fn write(&self, name: &str, bytes: &[u8]) -> String {
            let path = self.path(name);
            fs::write(&path, bytes).expect("write fixture");
            path
        }

        fn write_xpi(&self, name: &str, manifest: &Value) -> String {
            let path = self.path(name);
            let file = fs::File::create(&path).expect("create xpi");
            let mut writer = ZipWriter::new(file);
            writer
                .start_file("manifest.json", SimpleFileOptions::default())
                .expect("start manifest");
            writer
                .write_all(manifest.to_string().as_bytes())
                .expect("write manifest");
            writer.finish().expect("finish xpi");
            path
        }
    }

    #[fixture]
    fn fixture() -> Fixture {
        let fixture = Fixture {
            dir: tempfile::tempdir().expect("temp dir"),
        };
        fixture.write("versions.json", CATALOGUE.as_bytes());
        fixture
    }

    fn manifest(guid: &str) -> Value {
        json!({
            "manifest_version": 2,
            "name": "x",
            "version": "1.0",
            "applications": {"gecko": {"id": guid}}
        })
    }

    fn run_with(args: &[&str], locale: Option<&str>) -> (i32, String, String) {
        let cli = Cli::parse_from(std::iter::once("addon-inspect").chain(args.iter().copied()));
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run(&cli, locale.map(str::to_owned), &mut stdout, &mut stderr);
        (
            code,
            String::from_utf8(stdout).expect("utf-8 stdout"),
            String::from_utf8(stderr).expect("utf-8 stderr"),
        )
    }

    #[rstest]
    fn accepted_uploads_print_metadata(fixture: Fixture) {
        let xpi = fixture.write_xpi("addon.xpi", &manifest("@x"));
        let catalogue = fixture.path("versions.json");

        let (code, stdout, stderr) = run_with(&["-c", &catalogue, "--compact", &xpi], None);

        assert_eq!(code, EXIT_ACCEPTED, "{stderr}");
        let metadata: Value = serde_json::from_str(stdout.trim()).expect("JSON report");
        assert_eq!(metadata["guid"], "@x");
        assert_eq!(metadata["declared_type"], "extension");
        assert_eq!(stdout.lines().count(), 1);
    }

    #[rstest]
    fn rejections_use_the_environment_locale(fixture: Fixture) {
        let xpi = fixture.write_xpi("addon.xpi", &manifest("@taken"));
        let catalogue = fixture.path("versions.json");
        let args = ["-c", catalogue.as_str(), "--taken-guid", "@taken", xpi.as_str()];

        let (code, stdout, english) = run_with(&args, None);
        let (_, _, french) = run_with(&args, Some("fr"));

        assert_eq!(code, EXIT_REJECTED);
        assert!(stdout.is_empty());
        assert!(english.starts_with("rejected (duplicate-addon-id)"));
        assert!(english.contains("@taken"));
        assert_ne!(english, french);
    }

    #[rstest]
    fn mislabelled_zips_fall_back_unless_disabled(fixture: Fixture) {
        let xpi = fixture.write_xpi("upload.crx", &manifest("@x"));
        let catalogue = fixture.path("versions.json");

        let (accepted, _, _) = run_with(&["-c", &catalogue, &xpi], None);
        let (rejected, _, stderr) = run_with(&["-c", &catalogue, "--no-zip-fallback", &xpi], None);

        assert_eq!(accepted, EXIT_ACCEPTED);
        assert_eq!(rejected, EXIT_REJECTED);
        assert!(stderr.contains("corrupt-crx"));
    }

    #[rstest]
    fn missing_catalogues_are_local_failures(fixture: Fixture) {
        let xpi = fixture.write_xpi("addon.xpi", &manifest("@x"));
        let missing = fixture.path("absent.json");

        let (code, _, stderr) = run_with(&["-c", &missing, &xpi], None);

        assert_eq!(code, EXIT_FAILURE);
        assert!(stderr.contains("failed to read"));
    }

    #[rstest]
    fn invalid_configuration_is_reported(fixture: Fixture) {
        let xpi = fixture.write_xpi("addon.xpi", &manifest("@x"));
        let catalogue = fixture.path("versions.json");
        let config = fixture.write("ingest.toml", b"bogus = 1\n");

        let (code, _, stderr) = run_with(&["-c", &catalogue, "--config", &config, &xpi], None);

        assert_eq!(code, EXIT_FAILURE);
        assert!(stderr.contains("invalid configuration"));
    }

    #[rstest]
    fn toml_catalogues_are_accepted(fixture: Fixture) {
        let xpi = fixture.write_xpi("addon.xpi", &manifest("@x"));
        let catalogue = fixture.write(
            "versions.toml",
            concat!(
                "[[versions]]\napplication = \"desktop\"\nid = 1\nversion = \"42.0\"\n",
                "[[versions]]\napplication = \"desktop\"\nid = 2\nversion = \"*\"\n",
                "[[versions]]\napplication = \"mobile\"\nid = 3\nversion = \"48.0\"\n",
                "[[versions]]\napplication = \"mobile\"\nid = 4\nversion = \"*\"\n",
            )
            .as_bytes(),
        );

        let (code, _, stderr) = run_with(&["-c", &catalogue, &xpi], None);

        assert_eq!(code, EXIT_ACCEPTED, "{stderr}");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[rstest]
    fn nested_jars_expand_on_request(fixture: Fixture) {
        let library = {
            let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            writer
                .start_file("a.js", SimpleFileOptions::default())
                .expect("start member");
            writer.write_all(b"a()").expect("write member");
            writer.finish().expect("finish jar").into_inner()
        };
        let xpi = fixture.path("addon.xpi");
        let mut writer = ZipWriter::new(fs::File::create(&xpi).expect("create xpi"));
        for (name, data) in [
            ("manifest.json", manifest("@x").to_string().into_bytes()),
            ("lib.jar", library),
        ] {
            writer
                .start_file(name, SimpleFileOptions::default())
                .expect("start member");
            writer.write_all(&data).expect("write member");
        }
        writer.finish().expect("finish xpi");
        let catalogue = fixture.path("versions.json");
        let out = fixture.path("out");

        let (code, _, stderr) =
            run_with(&["-c", &catalogue, "-x", &out, "--expand-nested", &xpi], None);

        assert_eq!(code, EXIT_ACCEPTED, "{stderr}");
        assert!(fixture.dir.path().join("out/lib.jar/a.js").is_file());
    }

    #[test]
    fn unwritable_stderr_keeps_the_exit_status() {
        let error = InspectError::Ingest(IngestError::NoManifestFound);

        let code = report_failure(&error, &Localiser::new(None), &mut ClosedPipe);

        assert_eq!(code, EXIT_REJECTED);
    }

    #[rstest]
    fn locked_extraction_writes_the_members(fixture: Fixture) {
        let xpi = fixture.write_xpi("addon.xpi", &manifest("@x"));
        let catalogue = fixture.path("versions.json");
        let out = fixture.path("out");
        let locks = fixture.path("locks");

        let (code, _, stderr) = run_with(
            &["-c", &catalogue, "-x", &out, "--lock-dir", &locks, "--upload-id", "9", &xpi],
            None,
        );

        assert_eq!(code, EXIT_ACCEPTED, "{stderr}");
        assert!(fixture.dir.path().join("out/manifest.json").is_file());
        assert!(!fixture.dir.path().join("locks/9.lock").exists());
    }
}
