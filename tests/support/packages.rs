//! Builders for upload fixtures.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use addon_ingest::archive::TarCompression;
use addon_ingest::crx::CRX_MAGIC;
use addon_ingest::{AppVersionCatalogue, AppVersionRef, Application};
use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use serde_json::{Value, json};
use tar::{Builder, EntryType, Header};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// One tar member, including the kinds a safe archive must refuse.
#[derive(Clone, Copy, Debug)]
pub enum TarMember<'a> {
    /// A regular file.
    File(&'a str, &'a [u8]),
    /// A directory.
    Dir(&'a str),
    /// A regular file whose name is written into the header verbatim.
    RawName(&'a [u8], &'a [u8]),
    /// A symbolic link to the given target.
    Symlink(&'a str, &'a str),
    /// A named pipe.
    Fifo(&'a str),
}

/// Zip archive bytes holding `members` with default (deflate) options.
pub fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(io::Cursor::new(Vec::new()));
    for (name, data) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start member");
        writer.write_all(data).expect("write member");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Write a zip archive named `file_name` under `dir`.
pub fn write_zip(dir: &Path, file_name: &str, members: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, zip_bytes(members)).expect("write zip fixture");
    path
}

/// Tar archive bytes holding `members`, before any stream compression.
pub fn tar_bytes(members: &[TarMember<'_>]) -> Vec<u8> {
    let mut builder = Builder::new(Vec::new());
    for member in members {
        let mut header = Header::new_gnu();
        header.set_mode(0o644);
        match *member {
            TarMember::File(name, data) => {
                header.set_size(data.len() as u64);
                builder
                    .append_data(&mut header, name, data)
                    .expect("append file");
            }
            TarMember::Dir(name) => {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder
                    .append_data(&mut header, name, io::empty())
                    .expect("append directory");
            }
            TarMember::RawName(name, data) => {
                for (slot, byte) in header.as_old_mut().name.iter_mut().zip(name) {
                    *slot = *byte;
                }
                header.set_entry_type(EntryType::Regular);
                header.set_size(data.len() as u64);
                header.set_cksum();
                builder.append(&header, data).expect("append raw member");
            }
            TarMember::Symlink(name, target) => {
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                header.set_link_name(target).expect("link target");
                builder
                    .append_data(&mut header, name, io::empty())
                    .expect("append symlink");
            }
            TarMember::Fifo(name) => {
                header.set_entry_type(EntryType::Fifo);
                header.set_size(0);
                builder
                    .append_data(&mut header, name, io::empty())
                    .expect("append fifo");
            }
        }
    }
    builder.into_inner().expect("finish tar")
}

/// Write a tar archive with the given stream compression.
pub fn write_tar(
    dir: &Path,
    file_name: &str,
    compression: TarCompression,
    members: &[TarMember<'_>],
) -> PathBuf {
    let raw = tar_bytes(members);
    let bytes = match compression {
        TarCompression::None => raw,
        TarCompression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&raw).expect("gzip tar");
            encoder.finish().expect("finish gzip")
        }
        TarCompression::Bzip2 => {
            let mut encoder = BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(&raw).expect("bzip2 tar");
            encoder.finish().expect("finish bzip2")
        }
    };
    let path = dir.join(file_name);
    fs::write(&path, bytes).expect("write tar fixture");
    path
}

/// Version 2 CRX bytes wrapping `payload`.
#[expect(
    clippy::little_endian_bytes,
    reason = "fixtures mirror the CRX wire format"
)]
pub fn crx_v2(public_key: &[u8], signature: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut bytes = CRX_MAGIC.to_vec();
    bytes.extend_from_slice(&2_u32.to_le_bytes());
    bytes.extend_from_slice(&u32::try_from(public_key.len()).expect("small key").to_le_bytes());
    bytes.extend_from_slice(&u32::try_from(signature.len()).expect("small sig").to_le_bytes());
    bytes.extend_from_slice(public_key);
    bytes.extend_from_slice(signature);
    bytes.extend_from_slice(payload);
    bytes
}

/// Write `bytes` to `file_name` under `dir`.
pub fn write_file(dir: &Path, file_name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, bytes).expect("write fixture");
    path
}

/// A minimal valid WebExtension manifest.
pub fn simple_manifest(guid: &str) -> Value {
    json!({
        "manifest_version": 2,
        "name": "Fixture",
        "version": "1.0",
        "applications": {"gecko": {"id": guid}}
    })
}

/// Serialised manifest bytes.
pub fn manifest_bytes(value: &Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Catalogue with the versions the default floors refer to.
pub fn catalogue() -> AppVersionCatalogue {
    [
        (Application::Desktop, "42.0"),
        (Application::Desktop, "48.0"),
        (Application::Desktop, "53.0"),
        (Application::Desktop, "61.0"),
        (Application::Desktop, "109.0a1"),
        (Application::Desktop, "*"),
        (Application::Mobile, "48.0"),
        (Application::Mobile, "120.0"),
        (Application::Mobile, "120.0a1"),
        (Application::Mobile, "*"),
    ]
    .into_iter()
    .zip(1_u64..)
    .map(|((application, version), id)| AppVersionRef::new(application, id, version))
    .collect()
}
