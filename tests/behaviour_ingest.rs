//! Behaviour-driven tests for end-to-end package ingestion.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::path::PathBuf;
use std::str::FromStr;

mod support;

use addon_ingest::archive::TarCompression;
use addon_ingest::{
    AppVersionCatalogue, AppVersionRef, Application, IngestConfig, IngestError, PackageIngestor,
    PackageKind, PackageMetadata, PackageSource,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;
use support::packages::{
    TarMember, catalogue, crx_v2, manifest_bytes, simple_manifest, write_file, write_tar,
    write_zip, zip_bytes,
};
use tempfile::TempDir;

struct IngestWorld {
    workspace: TempDir,
    upload: RefCell<Option<PathBuf>>,
    taken: RefCell<BTreeSet<String>>,
    catalogue: RefCell<AppVersionCatalogue>,
    metadata: RefCell<Option<PackageMetadata>>,
    error: RefCell<Option<IngestError>>,
}

#[fixture]
fn world() -> IngestWorld {
    IngestWorld {
        workspace: tempfile::tempdir().expect("temp dir"),
        upload: RefCell::new(None),
        taken: RefCell::new(BTreeSet::new()),
        catalogue: RefCell::new(catalogue()),
        metadata: RefCell::new(None),
        error: RefCell::new(None),
    }
}

/// Step text with optional surrounding quotes removed.
#[derive(Clone, Debug)]
struct StepText(String);

impl FromStr for StepText {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let raw = input
            .trim()
            .trim_matches(|candidate| matches!(candidate, '"' | '\''))
            .to_owned();
        Ok(Self(raw))
    }
}

impl StepText {
    fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug)]
struct StepApplication(Application);

impl FromStr for StepApplication {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "desktop" => Ok(Self(Application::Desktop)),
            "mobile" => Ok(Self(Application::Mobile)),
            other => Err(format!("unknown application '{other}'")),
        }
    }
}

fn upload(world: &IngestWorld) -> PathBuf {
    world
        .upload
        .borrow()
        .clone()
        .unwrap_or_else(|| panic!("an upload should have been prepared"))
}

fn parsed(world: &IngestWorld) -> PackageMetadata {
    let borrow = world.metadata.borrow();
    borrow.clone().unwrap_or_else(|| {
        let error = world.error.borrow();
        panic!("expected the package to parse, got {:?}", error.as_ref())
    })
}

fn record<T>(world: &IngestWorld, outcome: Result<T, IngestError>) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(error) => {
            world.error.borrow_mut().replace(error);
            None
        }
    }
}

fn parse_with(world: &IngestWorld, source: &PackageSource) {
    let config = IngestConfig::default();
    let catalogue = world.catalogue.borrow();
    let taken = world.taken.borrow();
    let outcome = PackageIngestor::new(&config, &catalogue)
        .with_registry(&*taken)
        .parse_package(source);
    let metadata = record(world, outcome);
    *world.metadata.borrow_mut() = metadata;
}

#[given("an upload named {name} holding a simple manifest for {guid}")]
fn simple_upload(world: &IngestWorld, name: StepText, guid: StepText) {
    let manifest = manifest_bytes(&simple_manifest(&guid.into_inner()));
    let path = write_zip(
        world.workspace.path(),
        &name.into_inner(),
        &[("manifest.json", manifest.as_slice())],
    );
    world.upload.borrow_mut().replace(path);
}

#[given("an upload named {name} holding a theme manifest")]
fn theme_upload(world: &IngestWorld, name: StepText) {
    let manifest = manifest_bytes(&json!({
        "manifest_version": 2,
        "name": "Theme",
        "version": "2.1",
        "theme": {"colors": {"frame": "#000000"}},
        "applications": {"gecko": {"id": "@theme"}}
    }));
    let path = write_zip(
        world.workspace.path(),
        &name.into_inner(),
        &[("manifest.json", manifest.as_slice())],
    );
    world.upload.borrow_mut().replace(path);
}

#[given("an upload named {name} that also holds the member {member}")]
fn hostile_upload(world: &IngestWorld, name: StepText, member: StepText) {
    let manifest = manifest_bytes(&simple_manifest("@fixture"));
    let member = member.into_inner();
    let path = write_zip(
        world.workspace.path(),
        &name.into_inner(),
        &[
            ("manifest.json", manifest.as_slice()),
            (member.as_str(), b"root:x:0:0".as_slice()),
        ],
    );
    world.upload.borrow_mut().replace(path);
}

#[given("a CRX upload named {name} wrapping a simple manifest for {guid}")]
fn crx_upload(world: &IngestWorld, name: StepText, guid: StepText) {
    let manifest = manifest_bytes(&simple_manifest(&guid.into_inner()));
    let payload = zip_bytes(&[("manifest.json", manifest.as_slice())]);
    let path = write_file(
        world.workspace.path(),
        &name.into_inner(),
        &crx_v2(&[1; 16], &[2; 32], &payload),
    );
    world.upload.borrow_mut().replace(path);
}

#[given("a gzipped tar upload named {name} holding a simple manifest for {guid}")]
fn tar_upload(world: &IngestWorld, name: StepText, guid: StepText) {
    let manifest = manifest_bytes(&simple_manifest(&guid.into_inner()));
    let path = write_tar(
        world.workspace.path(),
        &name.into_inner(),
        TarCompression::Gzip,
        &[TarMember::File("manifest.json", manifest.as_slice())],
    );
    world.upload.borrow_mut().replace(path);
}

#[given("an upload named {name} holding the bytes {text}")]
fn raw_upload(world: &IngestWorld, name: StepText, text: StepText) {
    let path = write_file(
        world.workspace.path(),
        &name.into_inner(),
        text.into_inner().as_bytes(),
    );
    world.upload.borrow_mut().replace(path);
}

#[given("the add-on id {guid} is already taken")]
fn taken_guid(world: &IngestWorld, guid: StepText) {
    world.taken.borrow_mut().insert(guid.into_inner());
}

#[given("the catalogue lists only the desktop versions 42.0 and *")]
fn desktop_only_catalogue(world: &IngestWorld) {
    *world.catalogue.borrow_mut() = [(1, "42.0"), (2, "*")]
        .into_iter()
        .map(|(id, version)| AppVersionRef::new(Application::Desktop, id, version))
        .collect();
}

#[when("the package is parsed")]
fn parse(world: &IngestWorld) {
    parse_with(world, &PackageSource::new(upload(world)));
}

#[when("the upload is retried as a zip")]
fn parse_as_zip(world: &IngestWorld) {
    world.error.borrow_mut().take();
    parse_with(world, &PackageSource::new(upload(world)).with_kind(PackageKind::Zip));
}

#[when("the package is extracted")]
fn extract(world: &IngestWorld) {
    let config = IngestConfig::default();
    let catalogue = world.catalogue.borrow();
    let destination = world.workspace.path().join("out");
    let outcome = PackageIngestor::new(&config, &catalogue)
        .extract_package(&PackageSource::new(upload(world)), &destination);
    let _ = record(world, outcome);
}

#[then("the package type is {kind}")]
fn assert_type(world: &IngestWorld, kind: StepText) {
    assert_eq!(parsed(world).declared_type.as_str(), kind.into_inner());
}

#[then("the version is {version}")]
fn assert_version(world: &IngestWorld, version: StepText) {
    assert_eq!(parsed(world).version_string, version.into_inner());
}

#[then("the {application} range runs from {min} to {max}")]
fn assert_range(world: &IngestWorld, application: StepApplication, min: StepText, max: StepText) {
    let metadata = parsed(world);
    let range = metadata
        .compatibility
        .iter()
        .find(|range| range.application == application.0)
        .unwrap_or_else(|| panic!("expected a {} range", application.0));

    assert_eq!(range.min.version, min.into_inner());
    assert_eq!(range.max.version, max.into_inner());
}

#[then("there is no {application} range")]
fn assert_no_range(world: &IngestWorld, application: StepApplication) {
    let metadata = parsed(world);

    assert!(
        metadata
            .compatibility
            .iter()
            .all(|range| range.application != application.0)
    );
}

#[then("the CRX payload digest is recorded")]
fn assert_digest(world: &IngestWorld) {
    let digest = parsed(world).crx_sha256;

    assert!(digest.is_some_and(|digest| digest.as_str().len() == 64));
}

#[then("the package is rejected with {kind}")]
fn assert_rejected(world: &IngestWorld, kind: StepText) {
    let borrow = world.error.borrow();
    let error = borrow
        .as_ref()
        .unwrap_or_else(|| panic!("expected the package to be rejected"));

    assert_eq!(error.kind().as_str(), kind.into_inner(), "{error}");
}

#[then("nothing was written outside the extraction directory")]
fn assert_contained(world: &IngestWorld) {
    let root = world.workspace.path();

    assert!(!root.join("etc").exists());
    assert!(!root.join("out/etc").exists());
    if let Some(parent) = root.parent() {
        assert!(!parent.join("etc/passwd").exists());
    }
}

#[scenario("tests/features/ingest.feature", index = 0)]
fn scenario_plain_extension(world: IngestWorld) {
    let _ = world;
}

#[scenario("tests/features/ingest.feature", index = 1)]
fn scenario_theme(world: IngestWorld) {
    let _ = world;
}

#[scenario("tests/features/ingest.feature", index = 2)]
fn scenario_zip_slip(world: IngestWorld) {
    let _ = world;
}

#[scenario("tests/features/ingest.feature", index = 3)]
fn scenario_crx(world: IngestWorld) {
    let _ = world;
}

#[scenario("tests/features/ingest.feature", index = 4)]
fn scenario_corrupt_crx(world: IngestWorld) {
    let _ = world;
}

#[scenario("tests/features/ingest.feature", index = 5)]
fn scenario_mislabelled_zip(world: IngestWorld) {
    let _ = world;
}

#[scenario("tests/features/ingest.feature", index = 6)]
fn scenario_tar(world: IngestWorld) {
    let _ = world;
}

#[scenario("tests/features/ingest.feature", index = 7)]
fn scenario_duplicate(world: IngestWorld) {
    let _ = world;
}

#[scenario("tests/features/ingest.feature", index = 8)]
fn scenario_unsupported(world: IngestWorld) {
    let _ = world;
}

#[scenario("tests/features/ingest.feature", index = 9)]
fn scenario_desktop_only_catalogue(world: IngestWorld) {
    let _ = world;
}
